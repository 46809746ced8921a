//! 哈希缓存
//!
//! 保存在副本根目录下的 `hash_cache.json`，记录 文件身份键 -> 内容哈希，
//! 文件大小或修改时间一旦变化，键就不同，不会命中过期的哈希。

use crate::core::file_state::{calculate_file_hash, FileIdentityKey, FileState};
use crate::error::{Result, SyncError};
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 缓存文件名（位于副本根目录）
pub const HASH_CACHE_FILE: &str = "hash_cache.json";

/// 哈希缓存，由同步会话持有
#[derive(Debug)]
pub struct HashCache {
    path: PathBuf,
    entries: BTreeMap<String, String>,
    /// 自上次落盘以来被查询或写入过的键
    touched: HashSet<String>,
    hits: u64,
    misses: u64,
}

impl HashCache {
    /// 创建空缓存
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            entries: BTreeMap::new(),
            touched: HashSet::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// 副本根目录下的缓存文件路径
    pub fn default_path(replica_root: &Path) -> PathBuf {
        replica_root.join(HASH_CACHE_FILE)
    }

    /// 从磁盘加载，文件不存在时返回空缓存，损坏时返回错误
    pub fn load(path: PathBuf) -> Result<Self> {
        let data = match std::fs::read(&path) {
            Ok(d) => d,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("哈希缓存文件不存在，使用空缓存: {:?}", path);
                return Ok(Self::new(path));
            }
            Err(e) => {
                return Err(SyncError::Cache {
                    path,
                    message: e.to_string(),
                })
            }
        };

        let entries: BTreeMap<String, String> = match serde_json::from_slice(&data) {
            Ok(e) => e,
            Err(e) => {
                return Err(SyncError::Cache {
                    path,
                    message: format!("缓存文件损坏: {}", e),
                })
            }
        };

        info!("从缓存加载 {} 条哈希记录", entries.len());

        Ok(Self {
            path,
            entries,
            touched: HashSet::new(),
            hits: 0,
            misses: 0,
        })
    }

    pub fn get(&mut self, key: &FileIdentityKey) -> Option<&str> {
        let key = key.to_string();
        if self.entries.contains_key(&key) {
            self.touched.insert(key.clone());
        }
        self.entries.get(&key).map(String::as_str)
    }

    pub fn insert(&mut self, key: &FileIdentityKey, digest: String) {
        let key = key.to_string();
        self.touched.insert(key.clone());
        self.entries.insert(key, digest);
    }

    /// 取文件内容哈希：命中时不读文件，未命中时计算并记录
    pub fn digest_for(&mut self, path: &Path) -> io::Result<String> {
        let key = FileState::read(path)?.identity_key(path);

        if let Some(digest) = self.get(&key).map(str::to_string) {
            self.hits += 1;
            return Ok(digest);
        }

        self.misses += 1;
        let digest = calculate_file_hash(path)?;
        self.insert(&key, digest.clone());
        Ok(digest)
    }

    /// 写回磁盘，只保留本轮用到的记录
    pub fn save(&mut self) -> Result<()> {
        let touched = std::mem::take(&mut self.touched);
        self.entries.retain(|k, _| touched.contains(k));

        let cache_err = |e: String| SyncError::Cache {
            path: self.path.clone(),
            message: e,
        };

        let data = serde_json::to_vec(&self.entries).map_err(|e| cache_err(e.to_string()))?;

        // 先写临时文件再重命名
        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, data).map_err(|e| cache_err(e.to_string()))?;
        std::fs::rename(&temp_path, &self.path).map_err(|e| cache_err(e.to_string()))?;

        debug!(
            "已保存 {} 条哈希记录到 {:?} (命中 {}, 未命中 {})",
            self.entries.len(),
            self.path,
            self.hits,
            self.misses
        );
        self.hits = 0;
        self.misses = 0;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 自上次保存以来的 (命中, 未命中) 次数
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}
