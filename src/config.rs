//! 应用配置模块
//!
//! 命令行参数优先，其次是 JSON 配置文件，最后是默认值。

use crate::core::{CompareConfig, CompareMode, IgnoreRules, RetryPolicy, SyncConfig};
use crate::error::{Result, SyncError};
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// 命令行参数
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about = "单向定时目录镜像工具", long_about = None)]
#[command(allow_negative_numbers = true)]
pub struct Args {
    /// 源目录
    #[arg(value_name = "SOURCE")]
    pub source: Option<PathBuf>,

    /// 副本目录（不存在时自动创建）
    #[arg(value_name = "REPLICA")]
    pub replica: Option<PathBuf>,

    /// 同步间隔（秒）
    #[arg(value_name = "INTERVAL")]
    pub interval: Option<i64>,

    /// 日志文件路径
    #[arg(value_name = "LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// 使用内容哈希判断文件是否变化
    #[arg(long)]
    pub use_hash: bool,

    /// 在副本目录中持久化哈希缓存
    #[arg(long)]
    pub use_hash_cache: bool,

    /// 忽略规则文件，每行一条
    #[arg(long, value_name = "PATH")]
    pub ignore_file: Option<PathBuf>,

    /// 只记录将要执行的动作，不修改副本
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// 日志级别: error, warn, info, debug, trace
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// 每个条目的最多尝试次数
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,

    /// JSON 配置文件
    #[arg(long, value_name = "PATH")]
    pub config_file: Option<PathBuf>,
}

/// JSON 配置文件内容
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub source_folder: Option<PathBuf>,
    pub replica_folder: Option<PathBuf>,
    pub sync_interval: Option<i64>,
    pub log_file: Option<PathBuf>,
    pub use_hash: bool,
    pub use_hash_cache: bool,
    pub ignore_file: Option<PathBuf>,
    /// 直接写在配置文件里的忽略规则
    pub ignore_patterns: Vec<String>,
    pub dry_run: bool,
    pub log_level: Option<String>,
    pub max_retries: Option<u32>,
}

impl FileConfig {
    /// 加载配置文件，文件不存在时返回默认配置
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(SyncError::Config(format!(
                    "读取配置文件失败 {:?}: {}",
                    path, e
                )))
            }
        };

        serde_json::from_str(&content)
            .map_err(|e| SyncError::Config(format!("配置文件格式错误 {:?}: {}", path, e)))
    }
}

fn default_interval() -> i64 {
    30
}

fn default_log_file() -> PathBuf {
    PathBuf::from("sync.log")
}

fn default_log_level() -> String {
    "info".to_string()
}

/// 合并后的运行配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub source: Option<PathBuf>,
    pub replica: Option<PathBuf>,
    pub interval_secs: i64,
    pub log_file: PathBuf,
    pub log_level: String,
    pub use_hash: bool,
    pub use_hash_cache: bool,
    pub ignore_file: Option<PathBuf>,
    pub ignore_patterns: Vec<String>,
    pub dry_run: bool,
    pub max_retries: u32,
}

impl AppConfig {
    /// 命令行参数覆盖配置文件
    pub fn merge(args: Args, file: FileConfig) -> Self {
        Self {
            source: args.source.or(file.source_folder),
            replica: args.replica.or(file.replica_folder),
            interval_secs: args
                .interval
                .or(file.sync_interval)
                .unwrap_or_else(default_interval),
            log_file: args
                .log_file
                .or(file.log_file)
                .unwrap_or_else(default_log_file),
            log_level: args
                .log_level
                .or(file.log_level)
                .unwrap_or_else(default_log_level)
                .to_lowercase(),
            use_hash: args.use_hash || file.use_hash,
            use_hash_cache: args.use_hash_cache || file.use_hash_cache,
            ignore_file: args.ignore_file.or(file.ignore_file),
            ignore_patterns: file.ignore_patterns,
            dry_run: args.dry_run || file.dry_run,
            max_retries: args
                .max_retries
                .or(file.max_retries)
                .unwrap_or(RetryPolicy::default().max_attempts),
        }
    }

    /// 校验路径与间隔，失败时进程应以非零码退出
    pub fn validate(&self) -> Result<()> {
        let (source, replica) = match (&self.source, &self.replica) {
            (Some(s), Some(r)) => (s, r),
            _ => {
                return Err(SyncError::Config(
                    "必须指定源目录和副本目录（命令行或配置文件）".to_string(),
                ))
            }
        };

        if !source.exists() {
            return Err(SyncError::Config(format!("源目录不存在: {:?}", source)));
        }
        if !source.is_dir() {
            return Err(SyncError::Config(format!("源路径不是目录: {:?}", source)));
        }
        if replica.exists() && !replica.is_dir() {
            return Err(SyncError::Config(format!("副本路径不是目录: {:?}", replica)));
        }
        if self.interval_secs <= 0 {
            return Err(SyncError::Config("同步间隔必须是正整数".to_string()));
        }
        if self.max_retries == 0 {
            return Err(SyncError::Config("重试次数至少为 1".to_string()));
        }

        Ok(())
    }

    /// 副本目录不存在时创建（演练模式下不创建）
    pub fn prepare_replica(&self) -> Result<()> {
        let Some(replica) = &self.replica else {
            return Err(SyncError::Config("未指定副本目录".to_string()));
        };
        if self.dry_run || replica.exists() {
            return Ok(());
        }
        fs::create_dir_all(replica).map_err(|e| {
            SyncError::Config(format!("创建副本目录失败 {:?}: {}", replica, e))
        })?;
        info!("已创建副本目录: {:?}", replica);
        Ok(())
    }

    /// 读取忽略规则文件并合并配置文件中的规则
    pub fn load_ignore_rules(&self) -> IgnoreRules {
        let mut patterns = self.ignore_patterns.clone();

        if let Some(path) = &self.ignore_file {
            match fs::read_to_string(path) {
                Ok(content) => patterns.extend(content.lines().map(str::to_string)),
                Err(e) => warn!("忽略规则文件 {:?} 无法读取 ({}), 不使用其中的规则", path, e),
            }
        }

        IgnoreRules::from_patterns(patterns)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1) as u64)
    }

    /// 转换为同步引擎配置，路径转为绝对路径
    pub fn to_sync_config(&self, ignore_rules: IgnoreRules) -> Result<SyncConfig> {
        let (Some(source), Some(replica)) = (&self.source, &self.replica) else {
            return Err(SyncError::Config("未指定源目录或副本目录".to_string()));
        };

        let mut config = SyncConfig::new(std::path::absolute(source)?, std::path::absolute(replica)?);
        config.ignore_rules = ignore_rules;
        config.compare = CompareConfig {
            mode: if self.use_hash {
                CompareMode::Hash
            } else {
                CompareMode::Metadata
            },
            ..Default::default()
        };
        config.use_hash_cache = self.use_hash_cache;
        config.dry_run = self.dry_run;
        config.retry = RetryPolicy::new(self.max_retries);
        Ok(config)
    }

    /// 启动时打印配置摘要
    pub fn log_summary(&self, rules: &IgnoreRules) {
        let yes_no = |b: bool| if b { "是" } else { "否" };
        info!("开始目录同步...");
        info!("源目录: {:?}", self.source);
        info!("副本目录: {:?}", self.replica);
        info!("同步间隔: {} 秒", self.interval_secs);
        info!("日志文件: {:?}", self.log_file);
        info!("内容哈希比较: {}", yes_no(self.use_hash));
        info!("哈希缓存: {}", yes_no(self.use_hash_cache));
        info!(
            "忽略规则: {} 条 (文件: {:?})",
            rules.len(),
            self.ignore_file
        );
        info!("最多尝试次数: {}", self.max_retries);
        info!("演练模式: {}", yes_no(self.dry_run));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(source: &Path, replica: &Path) -> Args {
        Args {
            source: Some(source.to_path_buf()),
            replica: Some(replica.to_path_buf()),
            ..Default::default()
        }
    }

    #[test]
    fn parses_command_line() {
        let args = Args::try_parse_from([
            "mirrorsync",
            "src",
            "dst",
            "10",
            "out.log",
            "--use-hash",
            "--use-hash-cache",
            "--dry-run",
            "--max-retries",
            "5",
        ])
        .unwrap();

        assert_eq!(args.source, Some(PathBuf::from("src")));
        assert_eq!(args.interval, Some(10));
        assert_eq!(args.log_file, Some(PathBuf::from("out.log")));
        assert!(args.use_hash && args.use_hash_cache && args.dry_run);
        assert_eq!(args.max_retries, Some(5));
    }

    #[test]
    fn negative_interval_parses_then_fails_validation() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().to_str().unwrap();
        let args = Args::try_parse_from(["mirrorsync", src, src, "-5"]).unwrap();
        assert_eq!(args.interval, Some(-5));

        let config = AppConfig::merge(args, FileConfig::default());
        assert!(matches!(config.validate(), Err(SyncError::Config(_))));
    }

    #[test]
    fn defaults_apply() {
        let config = AppConfig::merge(Args::default(), FileConfig::default());
        assert_eq!(config.interval_secs, 30);
        assert_eq!(config.log_file, PathBuf::from("sync.log"));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.max_retries, 3);
        assert!(!config.use_hash && !config.dry_run);
    }

    #[test]
    fn args_override_file() {
        let file: FileConfig = serde_json::from_str(
            r#"{
                "source_folder": "/from/file",
                "replica_folder": "/replica/file",
                "sync_interval": 60,
                "log_level": "DEBUG",
                "use_hash": true,
                "ignore_patterns": ["*.tmp"]
            }"#,
        )
        .unwrap();
        let args = Args {
            source: Some(PathBuf::from("/from/args")),
            interval: Some(5),
            ..Default::default()
        };

        let config = AppConfig::merge(args, file);
        assert_eq!(config.source, Some(PathBuf::from("/from/args")));
        assert_eq!(config.replica, Some(PathBuf::from("/replica/file")));
        assert_eq!(config.interval_secs, 5);
        assert_eq!(config.log_level, "debug");
        assert!(config.use_hash);
        assert_eq!(config.ignore_patterns, vec!["*.tmp".to_string()]);
    }

    #[test]
    fn missing_config_file_is_default_and_bad_json_is_error() {
        let temp = TempDir::new().unwrap();
        let missing = FileConfig::load(&temp.path().join("none.json")).unwrap();
        assert!(missing.source_folder.is_none());

        let bad = temp.path().join("bad.json");
        fs::write(&bad, "{ oops").unwrap();
        assert!(matches!(FileConfig::load(&bad), Err(SyncError::Config(_))));
    }

    #[test]
    fn validation_rules() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");

        let config = AppConfig::merge(args(&src, &dst), FileConfig::default());
        assert!(config.validate().is_err(), "source must exist");

        fs::create_dir_all(&src).unwrap();
        assert!(config.validate().is_ok());

        let mut zero = config.clone();
        zero.interval_secs = 0;
        assert!(zero.validate().is_err());

        let mut no_retry = config.clone();
        no_retry.max_retries = 0;
        assert!(no_retry.validate().is_err());

        let none = AppConfig::merge(Args::default(), FileConfig::default());
        assert!(none.validate().is_err());
    }

    #[test]
    fn prepare_replica_respects_dry_run() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");
        fs::create_dir_all(&src).unwrap();

        let mut config = AppConfig::merge(args(&src, &dst), FileConfig::default());
        config.dry_run = true;
        config.prepare_replica().unwrap();
        assert!(!dst.exists());

        config.dry_run = false;
        config.prepare_replica().unwrap();
        assert!(dst.is_dir());
    }

    #[test]
    fn ignore_rules_from_file_and_config() {
        let temp = TempDir::new().unwrap();
        let ignore = temp.path().join(".syncignore");
        fs::write(&ignore, "*.log\n\ncache/\n").unwrap();

        let mut config = AppConfig::merge(Args::default(), FileConfig::default());
        config.ignore_patterns = vec!["Thumbs.db".into()];
        config.ignore_file = Some(ignore);

        let rules = config.load_ignore_rules();
        assert_eq!(rules.len(), 3);
        assert!(rules.should_ignore("a.log"));
        assert!(rules.should_ignore("cache/x"));
        assert!(rules.should_ignore("Thumbs.db"));

        config.ignore_file = Some(temp.path().join("missing"));
        assert_eq!(config.load_ignore_rules().len(), 1);
    }

    #[test]
    fn sync_config_uses_absolute_paths() {
        let config = AppConfig::merge(
            Args {
                source: Some(PathBuf::from("relative/src")),
                replica: Some(PathBuf::from("relative/dst")),
                use_hash: true,
                max_retries: Some(7),
                ..Default::default()
            },
            FileConfig::default(),
        );

        let sync = config.to_sync_config(IgnoreRules::default()).unwrap();
        assert!(sync.source_root.is_absolute());
        assert!(sync.replica_root.is_absolute());
        assert_eq!(sync.compare.mode, CompareMode::Hash);
        assert_eq!(sync.retry.max_attempts, 7);
    }
}
