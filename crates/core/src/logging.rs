//! 日志初始化
//!
//! 默认每个事件输出一行结构化JSON到标准输出；`RUST_LOG` 优先于命令行级别。

use std::str::FromStr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{ProvisionerError, ProvisionerResult};

/// Output format for log entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Pretty,
}

impl FromStr for OutputFormat {
    type Err = ProvisionerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "pretty" => Ok(OutputFormat::Pretty),
            _ => Err(ProvisionerError::Configuration(format!(
                "不支持的日志格式: {s}"
            ))),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is not set
    pub level: String,
    pub format: OutputFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: OutputFormat::Json,
        }
    }
}

impl LogConfig {
    pub fn new(level: impl Into<String>, format: OutputFormat) -> Self {
        Self {
            level: level.into(),
            format,
        }
    }
}

/// 初始化全局tracing订阅者，进程内只能调用一次
pub fn init_logging(config: &LogConfig) -> ProvisionerResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.format {
        OutputFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false),
            )
            .try_init(),
        OutputFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    }
    .map_err(|e| ProvisionerError::Configuration(format!("初始化日志系统失败: {e}")))
}
