use crate::core::cache::{HashCache, HASH_CACHE_FILE};
use crate::core::comparator::{CompareConfig, CompareMode, FileComparator};
use crate::core::filter::IgnoreRules;
use crate::core::path::RelativePath;
use crate::core::plan::ReconciliationPlan;
use crate::core::scanner::{FileScanner, TreeSnapshot};
use crate::core::transfer::{Applier, ItemFailure, RetryPolicy};
use crate::error::Result;
use std::path::PathBuf;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// 同步配置
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub source_root: PathBuf,
    pub replica_root: PathBuf,
    /// 忽略规则，同时作用于源和副本
    pub ignore_rules: IgnoreRules,
    pub compare: CompareConfig,
    /// 哈希模式下是否持久化哈希缓存
    pub use_hash_cache: bool,
    /// 演练模式，不修改副本
    pub dry_run: bool,
    pub retry: RetryPolicy,
}

impl SyncConfig {
    pub fn new(source_root: impl Into<PathBuf>, replica_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            replica_root: replica_root.into(),
            ignore_rules: IgnoreRules::default(),
            compare: CompareConfig::default(),
            use_hash_cache: false,
            dry_run: false,
            retry: RetryPolicy::default(),
        }
    }
}

/// 一轮同步的结束状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassStatus {
    Completed,
    Cancelled,
}

/// 同步报告
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub status: PassStatus,
    pub start_time: i64,
    pub end_time: i64,
    pub source_entries: usize,
    pub replica_entries: usize,
    /// 成功复制（新增或更新）的路径
    pub copied: Vec<RelativePath>,
    /// 成功删除的路径
    pub removed: Vec<RelativePath>,
    pub failures: Vec<ItemFailure>,
    pub duration_ms: u64,
    pub dry_run: bool,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// 本轮是否对副本有任何改动（演练模式下为计划中的改动）
    pub fn has_changes(&self) -> bool {
        !self.copied.is_empty() || !self.removed.is_empty()
    }
}

/// 同步引擎，持有哈希缓存，跨轮次复用
pub struct SyncEngine {
    config: SyncConfig,
    cache: Option<HashCache>,
    cancel: CancellationToken,
}

impl SyncEngine {
    /// 创建引擎；启用缓存时立即加载缓存文件
    pub fn new(config: SyncConfig) -> Self {
        let cache = if config.use_hash_cache && config.compare.mode == CompareMode::Hash {
            let path = HashCache::default_path(&config.replica_root);
            match HashCache::load(path) {
                Ok(cache) => Some(cache),
                Err(e) => {
                    error!("加载哈希缓存失败，本次运行不使用缓存: {}", e);
                    None
                }
            }
        } else {
            if config.use_hash_cache {
                warn!("哈希缓存只在内容哈希比较模式下生效");
            }
            None
        };

        Self {
            config,
            cache,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&HashCache> {
        self.cache.as_ref()
    }

    /// 取消同步（当前条目完成后停止）
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 启用缓存时，缓存文件名在两侧都不参与比较
    fn scanner(&self) -> FileScanner {
        let scanner = FileScanner::new(self.config.ignore_rules.clone());
        if self.cache.is_some() {
            scanner.with_reserved(vec![RelativePath::new(HASH_CACHE_FILE)])
        } else {
            scanner
        }
    }

    /// 扫描源目录
    pub fn scan_source(&self) -> Result<TreeSnapshot> {
        if self.cache.is_some() && self.config.source_root.join(HASH_CACHE_FILE).exists() {
            warn!(
                "源目录中的 {} 与哈希缓存文件同名，不会同步到副本",
                HASH_CACHE_FILE
            );
        }
        self.scanner().scan(&self.config.source_root)
    }

    /// 扫描副本目录
    pub fn scan_replica(&self) -> Result<TreeSnapshot> {
        if self.config.dry_run && !self.config.replica_root.exists() {
            info!("副本目录不存在（演练模式），按空目录处理: {:?}", self.config.replica_root);
            return Ok(TreeSnapshot::default());
        }
        self.scanner().scan(&self.config.replica_root)
    }

    /// 扫描两侧并计算同步计划，不做任何修改
    pub fn plan(&mut self) -> Result<ReconciliationPlan> {
        let source = self.scan_source()?;
        let replica = self.scan_replica()?;
        Ok(self.plan_snapshots(&source, &replica))
    }

    fn plan_snapshots(
        &mut self,
        source: &TreeSnapshot,
        replica: &TreeSnapshot,
    ) -> ReconciliationPlan {
        let mut comparator = FileComparator::new(
            &self.config.source_root,
            &self.config.replica_root,
            self.config.compare.clone(),
        )
        .with_cache(self.cache.as_mut());

        ReconciliationPlan::compute(source, replica, &mut comparator)
    }

    /// 执行一轮同步：扫描 -> 计划 -> 复制/更新 -> 删除 -> 保存缓存
    ///
    /// 只有扫描失败会返回错误；单个条目的失败记录在报告里。
    pub fn run_pass(&mut self) -> Result<SyncReport> {
        let start_time = chrono::Utc::now().timestamp();
        let started = Instant::now();

        let source = self.scan_source()?;
        let replica = self.scan_replica()?;

        let plan = self.plan_snapshots(&source, &replica);

        let applier = Applier::new(
            self.config.source_root.clone(),
            self.config.replica_root.clone(),
            self.config.retry.clone(),
        )
        .with_dry_run(self.config.dry_run);

        let mut copied = Vec::new();
        let mut removed = Vec::new();
        let mut failures = Vec::new();
        let mut status = PassStatus::Completed;

        // 先复制/更新，再删除
        for path in plan.copies() {
            if self.is_cancelled() {
                status = PassStatus::Cancelled;
                break;
            }
            match applier.copy(path) {
                Ok(()) => copied.push(path.clone()),
                Err(failure) => failures.push(failure),
            }
        }

        if status == PassStatus::Completed {
            for path in plan.removals() {
                if self.is_cancelled() {
                    status = PassStatus::Cancelled;
                    break;
                }
                match applier.remove(path) {
                    Ok(()) => removed.push(path.clone()),
                    Err(failure) => failures.push(failure),
                }
            }
        }

        if status == PassStatus::Completed && !self.config.dry_run {
            if let Some(cache) = self.cache.as_mut() {
                if let Err(e) = cache.save() {
                    warn!("保存哈希缓存失败: {}", e);
                }
            }
        }

        let report = SyncReport {
            status,
            start_time,
            end_time: chrono::Utc::now().timestamp(),
            source_entries: source.len(),
            replica_entries: replica.len(),
            copied,
            removed,
            failures,
            duration_ms: started.elapsed().as_millis() as u64,
            dry_run: self.config.dry_run,
        };

        match report.status {
            PassStatus::Completed => info!(
                "同步完成: 复制 {}, 删除 {}, 失败 {}, 耗时 {}ms",
                report.copied.len(),
                report.removed.len(),
                report.failures.len(),
                report.duration_ms
            ),
            PassStatus::Cancelled => warn!(
                "同步已取消: 复制 {}, 删除 {}, 失败 {}",
                report.copied.len(),
                report.removed.len(),
                report.failures.len()
            ),
        }

        Ok(report)
    }
}
