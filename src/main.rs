use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use tokio::signal;
use tracing::{error, info, warn};

use provisioner::{app::Application, shutdown::ShutdownManager};
use provisioner_core::{
    config::ConfigLoader,
    logging::{init_logging, LogConfig, OutputFormat},
    ProvisionerConfig,
};

/// 等待轮询器退出的最长时间
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // .env 不存在时忽略
    dotenvy::dotenv().ok();

    let matches = cli().get_matches();

    let log_level = matches
        .get_one::<String>("log-level")
        .map(String::as_str)
        .unwrap_or("info");
    let log_format: OutputFormat = matches
        .get_one::<String>("log-format")
        .map(String::as_str)
        .unwrap_or("json")
        .parse()?;
    init_logging(&LogConfig::new(log_level, log_format)).context("初始化日志系统失败")?;

    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("retry-job", sub)) => retry_job(config, sub).await,
        _ => run_worker(config).await,
    }
}

fn cli() -> Command {
    Command::new("provisioner")
        .version(env!("CARGO_PKG_VERSION"))
        .about("云主机供应任务Worker")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("TOML配置文件路径（环境变量优先）")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .default_value("info")
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty"])
                .default_value("json")
                .global(true),
        )
        .subcommand(Command::new("run").about("持续轮询并处理供应任务（默认）"))
        .subcommand(
            Command::new("retry-job")
                .about("人工重试一个已失败的供应任务")
                .arg(
                    Arg::new("job-id")
                        .value_name("JOB_ID")
                        .help("任务ID")
                        .required(true),
                )
                .arg(
                    Arg::new("actor")
                        .long("actor")
                        .value_name("USER_ID")
                        .help("执行重试的管理员ID")
                        .default_value("cli"),
                ),
        )
}

fn load_config(matches: &ArgMatches) -> Result<ProvisionerConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = matches.get_one::<String>("config") {
        info!("配置文件: {path}");
        loader = loader.with_file(path);
    }
    loader.load().context("加载配置失败")
}

async fn run_worker(config: ProvisionerConfig) -> Result<()> {
    let app = Arc::new(Application::new(config)?);
    let shutdown_manager = ShutdownManager::new();

    let app_handle = {
        let shutdown_rx = shutdown_manager.subscribe().await;
        let app = Arc::clone(&app);

        tokio::spawn(async move {
            if let Err(e) = app.run(shutdown_rx).await {
                error!("应用运行失败: {e}");
            }
        })
    };

    wait_for_shutdown_signal().await;

    info!("正在关闭供应Worker");
    shutdown_manager.shutdown().await;

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, app_handle).await {
        Ok(Ok(())) => info!("应用已优雅关闭"),
        Ok(Err(e)) => error!("应用关闭时发生错误: {e}"),
        Err(_) => warn!("应用关闭超时，强制退出"),
    }

    Ok(())
}

async fn retry_job(config: ProvisionerConfig, matches: &ArgMatches) -> Result<()> {
    let job_id = matches
        .get_one::<String>("job-id")
        .context("缺少任务ID")?;
    let actor = matches
        .get_one::<String>("actor")
        .map(String::as_str)
        .unwrap_or("cli");

    let app = Application::new(config)?;
    app.retry_job(job_id, actor).await?;

    info!(job_id = %job_id, actor, "任务已重置为pending");
    Ok(())
}

/// 等待关闭信号
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("安装Ctrl+C信号处理器失败: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("安装SIGTERM信号处理器失败: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到Ctrl+C信号");
        },
        _ = terminate => {
            info!("收到SIGTERM信号");
        },
    }
}
