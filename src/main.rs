use anyhow::Context;
use clap::Parser;
use mirrorsync_lib::config::{AppConfig, Args, FileConfig};
use mirrorsync_lib::core::PassStatus;
use mirrorsync_lib::logging::{init_logging, LogConfig};
use mirrorsync_lib::{SyncEngine, SyncError};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // 配置文件错误要等日志初始化后再报告
    let (file_config, file_error) = match args.config_file.as_deref() {
        Some(path) => match FileConfig::load(path) {
            Ok(c) => (c, None),
            Err(e) => (FileConfig::default(), Some(e)),
        },
        None => (FileConfig::default(), None),
    };
    let config = AppConfig::merge(args, file_config);

    if let Some(e) = init_logging(&LogConfig::new(&config.log_file, &config.log_level)) {
        warn!("无法打开日志文件 {:?}，只输出到控制台: {}", config.log_file, e);
    }

    if let Some(e) = file_error {
        error!("{}", e);
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    config.validate()?;
    config.prepare_replica()?;

    let rules = config.load_ignore_rules();
    config.log_summary(&rules);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("收到中断信号，当前条目完成后停止");
                cancel.cancel();
            }
        });
    }

    let interval = config.interval();
    let mut engine =
        SyncEngine::new(config.to_sync_config(rules)?).with_cancel(cancel.clone());

    loop {
        // 同步过程是阻塞 IO，放到阻塞线程池里执行
        engine = tokio::task::spawn_blocking(move || {
            match engine.run_pass() {
                Ok(report) => {
                    for failure in &report.failures {
                        warn!("{}", failure);
                    }
                    if report.status == PassStatus::Cancelled {
                        info!("本轮同步被中断");
                    }
                }
                Err(e @ SyncError::Scan { .. }) => error!("本轮同步中止，下个周期重试: {}", e),
                Err(e) => error!("同步过程中发生错误: {}", e),
            }
            engine
        })
        .await
        .context("同步任务异常退出")?;

        if cancel.is_cancelled() {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.cancelled() => break,
        }
    }

    info!("同步已停止");
    Ok(())
}
