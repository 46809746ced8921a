pub mod cache;
pub mod comparator;
pub mod engine;
pub mod file_state;
pub mod filter;
pub mod path;
pub mod plan;
pub mod scanner;
pub mod transfer;

pub use cache::{HashCache, HASH_CACHE_FILE};
pub use comparator::{CompareConfig, CompareMode, FileComparator};
pub use engine::{PassStatus, SyncConfig, SyncEngine, SyncReport};
pub use file_state::{calculate_file_hash, FileIdentityKey, FileState};
pub use filter::{IgnoreRule, IgnoreRules};
pub use path::RelativePath;
pub use plan::{ReconciliationPlan, UpdateOracle};
pub use scanner::{FileScanner, TreeSnapshot};
pub use transfer::{Applier, ItemFailure, Operation, RetryPolicy};
