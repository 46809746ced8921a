pub mod config;
pub mod core;
pub mod error;
pub mod logging;

pub use core::{SyncConfig, SyncEngine, SyncReport};
pub use error::{Result, SyncError};
