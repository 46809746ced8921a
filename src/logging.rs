//! 日志模块 - 控制台输出与按大小轮转的文件日志

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;

/// 单个日志文件的默认大小上限
pub const DEFAULT_MAX_SIZE: u64 = 1024 * 1024;
/// 默认保留的备份数量（sync.log.1 ~ sync.log.5）
pub const DEFAULT_BACKUPS: u32 = 5;

/// 日志配置
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 日志级别: "error", "warn", "info", "debug", "trace"
    pub level: String,
    pub file: PathBuf,
    pub max_size: u64,
    pub backups: u32,
}

impl LogConfig {
    pub fn new(file: impl Into<PathBuf>, level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            file: file.into(),
            max_size: DEFAULT_MAX_SIZE,
            backups: DEFAULT_BACKUPS,
        }
    }

    /// 将配置的日志级别转换为 tracing Level
    pub fn tracing_level(&self) -> tracing::Level {
        match self.level.to_lowercase().as_str() {
            "error" => tracing::Level::ERROR,
            "warn" | "warning" => tracing::Level::WARN,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        }
    }
}

struct WriterState {
    writer: Option<BufWriter<File>>,
    size: u64,
}

/// 带大小限制的日志写入器，超过上限时轮转为编号备份
#[derive(Clone)]
pub struct SizeRotatingWriter {
    file_path: PathBuf,
    max_size: u64,
    backups: u32,
    state: Arc<Mutex<WriterState>>,
}

impl SizeRotatingWriter {
    pub fn new(file_path: &Path, max_size: u64, backups: u32) -> io::Result<Self> {
        if let Some(parent) = file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let existing = fs::metadata(file_path).map(|m| m.len()).unwrap_or(0);
        if existing > max_size {
            rotate_log(file_path, backups)?;
        }
        let (writer, size) = open_file(file_path)?;

        Ok(Self {
            file_path: file_path.to_path_buf(),
            max_size,
            backups,
            state: Arc::new(Mutex::new(WriterState {
                writer: Some(writer),
                size,
            })),
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn lock(&self) -> MutexGuard<'_, WriterState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn open_file(file_path: &Path) -> io::Result<(BufWriter<File>, u64)> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(file_path)?;
    let size = file.metadata()?.len();
    Ok((BufWriter::new(file), size))
}

fn backup_path(file_path: &Path, index: u32) -> PathBuf {
    let mut name = file_path.as_os_str().to_os_string();
    name.push(format!(".{}", index));
    PathBuf::from(name)
}

/// 轮转日志文件：sync.log.4 -> sync.log.5, ..., sync.log -> sync.log.1
fn rotate_log(file_path: &Path, backups: u32) -> io::Result<()> {
    if backups == 0 {
        return fs::remove_file(file_path);
    }

    let oldest = backup_path(file_path, backups);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for index in (1..backups).rev() {
        let from = backup_path(file_path, index);
        if from.exists() {
            fs::rename(&from, backup_path(file_path, index + 1))?;
        }
    }
    fs::rename(file_path, backup_path(file_path, 1))
}

/// 日志写入器包装
pub struct LogWriter {
    inner: SizeRotatingWriter,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.inner.lock();

        let Some(writer) = state.writer.as_mut() else {
            return Err(io::Error::other("日志文件不可用"));
        };
        let written = writer.write(buf)?;
        writer.flush()?;
        state.size += written as u64;

        if state.size > self.inner.max_size {
            if let Some(mut w) = state.writer.take() {
                let _ = w.flush();
            }
            let _ = rotate_log(&self.inner.file_path, self.inner.backups);
            if let Ok((writer, size)) = open_file(&self.inner.file_path) {
                state.writer = Some(writer);
                state.size = size;
            }
        }

        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner.lock().writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for SizeRotatingWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            inner: self.clone(),
        }
    }
}

/// 构建日志订阅者：控制台 + 文件
///
/// 日志文件打不开时只输出到控制台，同时返回打开失败的错误。
pub fn build_subscriber(
    config: &LogConfig,
) -> (impl tracing::Subscriber + Send + Sync + 'static, Option<io::Error>) {
    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(config.tracing_level().into())
        .from_env_lossy();

    let (file_layer, open_error) =
        match SizeRotatingWriter::new(&config.file, config.max_size, config.backups) {
            Ok(file_writer) => {
                let layer = tracing_subscriber::fmt::layer()
                    .with_writer(file_writer)
                    .with_ansi(false)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false);
                (Some(layer), None)
            }
            // 回退到控制台
            Err(e) => (None, Some(e)),
        };

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer);

    (subscriber, open_error)
}

/// 初始化全局日志系统，返回日志文件打开失败的错误供调用方提示
pub fn init_logging(config: &LogConfig) -> Option<io::Error> {
    let (subscriber, open_error) = build_subscriber(config);
    let _ = tracing::subscriber::set_global_default(subscriber);
    open_error
}
