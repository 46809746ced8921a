//! 执行同步动作 - 复制、删除与有限次重试

use crate::core::path::RelativePath;
use filetime::FileTime;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

/// 动作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Copy,
    Remove,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Copy => write!(f, "复制"),
            Operation::Remove => write!(f, "删除"),
        }
    }
}

/// 单个条目在重试用尽后的失败记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub operation: Operation,
    pub path: RelativePath,
    pub attempts: u32,
    pub message: String,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} 失败 (已尝试{}次): {}",
            self.operation, self.path, self.attempts, self.message
        )
    }
}

/// 重试策略：固定间隔，不做指数退避
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最多尝试次数（含第一次）
    pub max_attempts: u32,
    /// 两次尝试之间的等待
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// 执行操作，失败时按策略重试；全部失败后返回 ItemFailure
    pub fn run<F>(
        &self,
        operation: Operation,
        path: &RelativePath,
        mut op: F,
    ) -> Result<(), ItemFailure>
    where
        F: FnMut() -> io::Result<()>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match op() {
                Ok(()) => return Ok(()),
                Err(e) => {
                    last_error = e.to_string();
                    warn!(
                        "{}失败: {} ({}/{}): {}",
                        operation, path, attempt, max_attempts, last_error
                    );
                    if attempt < max_attempts && !self.delay.is_zero() {
                        std::thread::sleep(self.delay);
                    }
                }
            }
        }

        error!(
            "{}最终失败 (已尝试{}次): {}: {}",
            operation, max_attempts, path, last_error
        );

        Err(ItemFailure {
            operation,
            path: path.clone(),
            attempts: max_attempts,
            message: last_error,
        })
    }
}

/// 把动作落到副本目录上
pub struct Applier {
    source_root: PathBuf,
    replica_root: PathBuf,
    dry_run: bool,
    retry: RetryPolicy,
}

impl Applier {
    pub fn new(source_root: PathBuf, replica_root: PathBuf, retry: RetryPolicy) -> Self {
        Self {
            source_root,
            replica_root,
            dry_run: false,
            retry,
        }
    }

    /// 演练模式：只记录日志，不修改副本
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// 复制或更新一个条目（目录则确保存在）
    pub fn copy(&self, path: &RelativePath) -> Result<(), ItemFailure> {
        let src = path.join_to(&self.source_root);
        let dst = path.join_to(&self.replica_root);

        if !self.dry_run {
            self.retry
                .run(Operation::Copy, path, || copy_entry(&src, &dst))?;
        }

        info!(dry_run = self.dry_run, "已复制/更新: {:?}", dst);
        Ok(())
    }

    /// 删除副本中的一个条目，目录递归删除
    pub fn remove(&self, path: &RelativePath) -> Result<(), ItemFailure> {
        let dst = path.join_to(&self.replica_root);

        if !self.dry_run {
            self.retry
                .run(Operation::Remove, path, || remove_entry(&dst))?;
        }

        info!(dry_run = self.dry_run, "已删除: {:?}", dst);
        Ok(())
    }
}

fn copy_entry(src: &Path, dst: &Path) -> io::Result<()> {
    let meta = fs::metadata(src)?;

    if meta.is_dir() {
        // 副本中同名的是文件时先删掉
        if let Ok(existing) = fs::symlink_metadata(dst) {
            if !existing.is_dir() {
                fs::remove_file(dst)?;
            }
        }
        fs::create_dir_all(dst)?;
        return Ok(());
    }

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    if let Ok(existing) = fs::symlink_metadata(dst) {
        if existing.is_dir() {
            fs::remove_dir_all(dst)?;
        }
    }

    fs::copy(src, dst)?;

    let atime = FileTime::from_last_access_time(&meta);
    let mtime = FileTime::from_last_modification_time(&meta);
    filetime::set_file_times(dst, atime, mtime)?;

    Ok(())
}

fn remove_entry(dst: &Path) -> io::Result<()> {
    let meta = match fs::symlink_metadata(dst) {
        Ok(m) => m,
        // 已经不存在，目标达成
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    if meta.is_dir() {
        fs::remove_dir_all(dst)
    } else {
        fs::remove_file(dst)
    }
}
