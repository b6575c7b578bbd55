use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::models::ProvisionOs;
use crate::{ProvisionerError, ProvisionerResult};

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_BATCH_SIZE: usize = 3;
pub const DEFAULT_REGION: &str = "ap-singapore";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BUNDLE_ID: &str = "bundle_lighthouse_small";
pub const DEFAULT_BLUEPRINT_ID: &str = "lhbp_ubuntu_2204";
pub const DEFAULT_ZONE: &str = "ap-singapore-1";
pub const DEFAULT_INSTANCE_TYPE: &str = "SML_2CORE_2G";

const MIN_SECRET_LEN: usize = 10;

/// 敏感字符串，Debug输出时脱敏
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(***)")
    }
}

/// 外部任务队列（PostgREST兼容接口）连接配置
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub url: String,
    pub service_role_key: SecretString,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub poll_interval_ms: u64,
    pub batch_size: usize,
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// 云API签名凭证与请求参数
#[derive(Debug, Clone)]
pub struct TencentCloudConfig {
    pub secret_id: String,
    pub secret_key: SecretString,
    pub region: String,
    pub request_timeout_secs: u64,
}

impl TencentCloudConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// 轻量应用服务器实例参数，各系统蓝图已按默认蓝图回填
#[derive(Debug, Clone)]
pub struct LighthouseConfig {
    pub bundle_id: String,
    pub blueprint_id_ubuntu: String,
    pub blueprint_id_debian: String,
    pub blueprint_id_kali: String,
    pub zone: String,
    pub instance_type: String,
}

impl LighthouseConfig {
    pub fn blueprint_for(&self, os: ProvisionOs) -> &str {
        match os {
            ProvisionOs::Ubuntu => &self.blueprint_id_ubuntu,
            ProvisionOs::Debian => &self.blueprint_id_debian,
            ProvisionOs::Kali => &self.blueprint_id_kali,
        }
    }
}

/// 供应厂商选择
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    #[default]
    Lighthouse,
}

impl FromStr for ProviderKind {
    type Err = ProvisionerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lighthouse" => Ok(ProviderKind::Lighthouse),
            _ => Err(ProvisionerError::Configuration(format!(
                "不支持的供应厂商: {s}"
            ))),
        }
    }
}

/// 完整的Worker配置
#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    pub queue: QueueConfig,
    pub worker: WorkerConfig,
    pub tencent: TencentCloudConfig,
    pub lighthouse: LighthouseConfig,
    pub provider: ProviderKind,
}

/// 扁平的原始配置项，键名与环境变量一一对应（小写）
#[derive(Debug, Deserialize)]
pub(crate) struct RawSettings {
    supabase_url: Option<String>,
    supabase_service_role_key: Option<String>,
    #[serde(default = "default_poll_interval_ms")]
    poll_interval_ms: u64,
    #[serde(default = "default_batch_size")]
    worker_batch_size: usize,

    tencent_secret_id: Option<String>,
    tencent_secret_key: Option<String>,
    #[serde(default = "default_region")]
    tencent_region: String,
    #[serde(default = "default_request_timeout_secs")]
    tencent_request_timeout_secs: u64,

    #[serde(default)]
    provision_provider: Option<String>,

    #[serde(default = "default_bundle_id")]
    lighthouse_bundle_id: String,
    #[serde(default = "default_blueprint_id")]
    lighthouse_blueprint_id: String,
    lighthouse_blueprint_id_ubuntu: Option<String>,
    lighthouse_blueprint_id_debian: Option<String>,
    lighthouse_blueprint_id_kali: Option<String>,
    #[serde(default = "default_zone")]
    lighthouse_zone: String,
    #[serde(default = "default_instance_type")]
    lighthouse_instance_type: String,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}
fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_region() -> String {
    DEFAULT_REGION.to_string()
}
fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}
fn default_bundle_id() -> String {
    DEFAULT_BUNDLE_ID.to_string()
}
fn default_blueprint_id() -> String {
    DEFAULT_BLUEPRINT_ID.to_string()
}
fn default_zone() -> String {
    DEFAULT_ZONE.to_string()
}
fn default_instance_type() -> String {
    DEFAULT_INSTANCE_TYPE.to_string()
}

impl RawSettings {
    /// 校验并构建最终配置，任一项不合法即整体失败
    pub(crate) fn into_config(self) -> ProvisionerResult<ProvisionerConfig> {
        let url = required("SUPABASE_URL", self.supabase_url)?;
        validate_url("SUPABASE_URL", &url)?;
        let service_role_key = required_secret(
            "SUPABASE_SERVICE_ROLE_KEY",
            self.supabase_service_role_key,
        )?;

        if self.poll_interval_ms == 0 {
            return Err(invalid("POLL_INTERVAL_MS", "轮询间隔必须大于0"));
        }
        if self.worker_batch_size == 0 {
            return Err(invalid("WORKER_BATCH_SIZE", "批量大小必须大于0"));
        }

        let secret_id = required_secret("TENCENT_SECRET_ID", self.tencent_secret_id)?;
        let secret_key = required_secret("TENCENT_SECRET_KEY", self.tencent_secret_key)?;
        let region = non_empty("TENCENT_REGION", self.tencent_region)?;
        if self.tencent_request_timeout_secs == 0 {
            return Err(invalid("TENCENT_REQUEST_TIMEOUT_SECS", "请求超时必须大于0"));
        }

        let provider = match self.provision_provider {
            Some(kind) => kind.parse()?,
            None => ProviderKind::default(),
        };

        let default_blueprint = non_empty("LIGHTHOUSE_BLUEPRINT_ID", self.lighthouse_blueprint_id)?;
        let blueprint_or_default = |value: Option<String>| {
            value
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default_blueprint.clone())
        };

        let lighthouse = LighthouseConfig {
            bundle_id: non_empty("LIGHTHOUSE_BUNDLE_ID", self.lighthouse_bundle_id)?,
            blueprint_id_ubuntu: blueprint_or_default(self.lighthouse_blueprint_id_ubuntu),
            blueprint_id_debian: blueprint_or_default(self.lighthouse_blueprint_id_debian),
            blueprint_id_kali: blueprint_or_default(self.lighthouse_blueprint_id_kali),
            zone: non_empty("LIGHTHOUSE_ZONE", self.lighthouse_zone)?,
            instance_type: non_empty("LIGHTHOUSE_INSTANCE_TYPE", self.lighthouse_instance_type)?,
        };

        Ok(ProvisionerConfig {
            queue: QueueConfig {
                url: url.trim_end_matches('/').to_string(),
                service_role_key: SecretString::new(service_role_key),
            },
            worker: WorkerConfig {
                poll_interval_ms: self.poll_interval_ms,
                batch_size: self.worker_batch_size,
            },
            tencent: TencentCloudConfig {
                secret_id,
                secret_key: SecretString::new(secret_key),
                region,
                request_timeout_secs: self.tencent_request_timeout_secs,
            },
            lighthouse,
            provider,
        })
    }
}

fn invalid(key: &str, message: &str) -> ProvisionerError {
    ProvisionerError::Configuration(format!("{key}: {message}"))
}

fn required(key: &str, value: Option<String>) -> ProvisionerResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(invalid(key, "缺少必填配置项")),
    }
}

fn required_secret(key: &str, value: Option<String>) -> ProvisionerResult<String> {
    let value = required(key, value)?;
    if value.chars().count() < MIN_SECRET_LEN {
        return Err(invalid(key, "长度不能少于10个字符"));
    }
    Ok(value)
}

fn non_empty(key: &str, value: String) -> ProvisionerResult<String> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(invalid(key, "不能为空"));
    }
    Ok(value)
}

fn validate_url(key: &str, value: &str) -> ProvisionerResult<()> {
    let parsed = url::Url::parse(value).map_err(|e| invalid(key, &format!("URL格式无效: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(key, "URL必须使用http或https"));
    }
    Ok(())
}
