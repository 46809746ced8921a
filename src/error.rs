use std::path::PathBuf;
use thiserror::Error;

/// 同步过程中的错误分类
///
/// 单个条目的复制/删除失败不在这里，它们以 [`crate::core::ItemFailure`]
/// 的形式汇总到同步报告中，不会中断整轮同步。
#[derive(Debug, Error)]
pub enum SyncError {
    /// 配置不可用（路径、间隔等），在进入同步循环前发现，致命
    #[error("配置错误: {0}")]
    Config(String),

    /// 根目录不可读，本轮同步中止，下一个周期重试
    #[error("扫描目录失败 {path:?}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 哈希缓存文件读写失败，缓存降级为全部未命中
    #[error("哈希缓存文件错误 {path:?}: {message}")]
    Cache { path: PathBuf, message: String },

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;
