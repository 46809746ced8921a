use crate::core::filter::IgnoreRules;
use crate::core::path::RelativePath;
use crate::error::{Result, SyncError};
use std::collections::BTreeSet;
use std::io;
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

/// 一次扫描得到的目录树快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeSnapshot {
    pub files: BTreeSet<RelativePath>,
    pub dirs: BTreeSet<RelativePath>,
}

impl TreeSnapshot {
    /// 文件与目录的并集
    pub fn all(&self) -> BTreeSet<RelativePath> {
        self.files.union(&self.dirs).cloned().collect()
    }

    pub fn is_file(&self, path: &RelativePath) -> bool {
        self.files.contains(path)
    }

    pub fn is_dir(&self, path: &RelativePath) -> bool {
        self.dirs.contains(path)
    }

    pub fn len(&self) -> usize {
        self.files.len() + self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.dirs.is_empty()
    }
}

/// 本地目录扫描器
pub struct FileScanner {
    rules: IgnoreRules,
    /// 不受规则影响、始终排除的路径（如副本中的哈希缓存文件）
    reserved: Vec<RelativePath>,
}

impl FileScanner {
    pub fn new(rules: IgnoreRules) -> Self {
        Self {
            rules,
            reserved: Vec::new(),
        }
    }

    pub fn with_reserved(mut self, reserved: Vec<RelativePath>) -> Self {
        self.reserved = reserved;
        self
    }

    /// 检查路径是否应该被排除
    fn should_exclude(&self, path: &RelativePath) -> bool {
        self.reserved.contains(path) || self.rules.should_ignore(path.as_str())
    }

    /// 递归扫描根目录，被忽略的目录不会进入
    pub fn scan(&self, root: &Path) -> Result<TreeSnapshot> {
        info!("开始扫描: {:?}", root);

        let scan_err = |source: io::Error| SyncError::Scan {
            path: root.to_path_buf(),
            source,
        };

        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 {
                    return true;
                }
                match entry.path().strip_prefix(root) {
                    Ok(rel) => {
                        let rel = RelativePath::from_relative(rel);
                        let excluded = self.should_exclude(&rel);
                        if excluded {
                            debug!("排除: {}", rel);
                        }
                        !excluded
                    }
                    Err(_) => false,
                }
            });

        let mut snapshot = TreeSnapshot::default();

        for entry in walker {
            let entry = entry.map_err(|e| scan_err(e.into()))?;

            if entry.depth() == 0 {
                if !entry.file_type().is_dir() {
                    return Err(scan_err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "根路径不是目录",
                    )));
                }
                continue;
            }

            let rel = match entry.path().strip_prefix(root) {
                Ok(rel) => RelativePath::from_relative(rel),
                Err(_) => continue,
            };

            // 符号链接不跟随；指向目录的链接整体跳过，其余按文件记录
            if entry.path_is_symlink() && entry.path().is_dir() {
                debug!("跳过目录链接: {}", rel);
                continue;
            }

            if entry.file_type().is_dir() {
                snapshot.dirs.insert(rel);
            } else {
                snapshot.files.insert(rel);
            }
        }

        info!(
            "扫描完成: {:?}, {} 个文件, {} 个目录",
            root,
            snapshot.files.len(),
            snapshot.dirs.len()
        );

        Ok(snapshot)
    }
}

impl Default for FileScanner {
    fn default() -> Self {
        Self::new(IgnoreRules::default())
    }
}
