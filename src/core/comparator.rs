use crate::core::cache::HashCache;
use crate::core::file_state::{calculate_file_hash, FileState};
use crate::core::path::RelativePath;
use crate::core::plan::UpdateOracle;
use std::fs;
use std::io;
use std::path::Path;

/// 文件比较方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareMode {
    /// 比较大小和修改时间，不读文件内容
    #[default]
    Metadata,
    /// 比较完整内容哈希
    Hash,
}

/// 比较配置
#[derive(Debug, Clone)]
pub struct CompareConfig {
    pub mode: CompareMode,
    /// 修改时间容差（秒），吸收不同文件系统的时间精度差异
    pub time_tolerance_secs: f64,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            mode: CompareMode::Metadata,
            time_tolerance_secs: 1.0,
        }
    }
}

/// 文件比较器，判断源文件与副本文件是否需要更新
pub struct FileComparator<'a> {
    source_root: &'a Path,
    replica_root: &'a Path,
    config: CompareConfig,
    cache: Option<&'a mut HashCache>,
}

impl<'a> FileComparator<'a> {
    pub fn new(source_root: &'a Path, replica_root: &'a Path, config: CompareConfig) -> Self {
        Self {
            source_root,
            replica_root,
            config,
            cache: None,
        }
    }

    /// 哈希模式下使用缓存
    pub fn with_cache(mut self, cache: Option<&'a mut HashCache>) -> Self {
        self.cache = cache;
        self
    }

    /// 副本不存在或不是普通文件时视为不同
    pub fn files_differ(&mut self, source: &Path, replica: &Path) -> io::Result<bool> {
        let replica_meta = match fs::metadata(replica) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(e),
        };
        if !replica_meta.is_file() {
            return Ok(true);
        }

        let src = FileState::read(source)?;
        let dst = FileState::from_metadata(&replica_meta);

        if src.size != dst.size {
            tracing::debug!(
                "文件大小不同: {:?} (src={}, dst={})",
                source,
                src.size,
                dst.size
            );
            return Ok(true);
        }

        match self.config.mode {
            CompareMode::Metadata => {
                let time_diff = (src.mtime() - dst.mtime()).abs();
                if time_diff > self.config.time_tolerance_secs {
                    tracing::debug!("文件时间不同: {:?} (diff={:.3}s)", source, time_diff);
                    return Ok(true);
                }
                Ok(false)
            }
            CompareMode::Hash => {
                let src_hash = self.digest(source)?;
                let dst_hash = self.digest(replica)?;
                Ok(src_hash != dst_hash)
            }
        }
    }

    fn digest(&mut self, path: &Path) -> io::Result<String> {
        match self.cache.as_deref_mut() {
            Some(cache) => cache.digest_for(path),
            None => calculate_file_hash(path),
        }
    }
}

impl UpdateOracle for FileComparator<'_> {
    fn differs(&mut self, path: &RelativePath) -> io::Result<bool> {
        let source = path.join_to(self.source_root);
        let replica = path.join_to(self.replica_root);
        self.files_differ(&source, &replica)
    }
}
