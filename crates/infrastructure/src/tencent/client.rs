use std::time::Duration;

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, HOST};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use provisioner_core::{
    config::TencentCloudConfig, ProvisionerError, ProvisionerResult,
};

use super::signing::{self, SigningInput};

/// 单次云API调用的描述
#[derive(Debug, Clone, Copy)]
pub struct ApiRequest<'a> {
    pub service: &'a str,
    pub host: &'a str,
    pub action: &'a str,
    pub version: &'a str,
    /// 为 `None` 时使用客户端默认地域
    pub region: Option<&'a str>,
    pub payload: &'a Value,
}

/// 腾讯云API签名请求客户端
///
/// 每次调用都是 `POST https://{host}/`，JSON请求体，TC3-HMAC-SHA256签名。
/// 非2xx状态码或响应体中包含 `Response.Error` 都视为调用失败。
#[derive(Clone)]
pub struct TencentCloudClient {
    http: reqwest::Client,
    secret_id: String,
    secret_key: String,
    default_region: String,
    base_url: Option<String>,
}

impl std::fmt::Debug for TencentCloudClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TencentCloudClient")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"***")
            .field("default_region", &self.default_region)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl TencentCloudClient {
    pub fn new(config: &TencentCloudConfig) -> ProvisionerResult<Self> {
        let http = build_http_client(config.request_timeout())?;

        Ok(Self {
            http,
            secret_id: config.secret_id.clone(),
            secret_key: config.secret_key.expose().to_string(),
            default_region: config.region.clone(),
            base_url: None,
        })
    }

    /// 将所有请求发往指定地址（本地测试服务器）。签名中的Host仍使用服务域名。
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    pub async fn call<T: DeserializeOwned>(&self, request: ApiRequest<'_>) -> ProvisionerResult<T> {
        let body = serde_json::to_string(request.payload)?;
        let timestamp = Utc::now().timestamp();
        let region = request.region.unwrap_or(&self.default_region);

        let authorization = signing::authorization(&SigningInput {
            secret_id: &self.secret_id,
            secret_key: &self.secret_key,
            service: request.service,
            host: request.host,
            action: request.action,
            payload: &body,
            timestamp,
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, header_value(&authorization)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(signing::CONTENT_TYPE));
        headers.insert(HOST, header_value(request.host)?);
        headers.insert("X-TC-Action", header_value(request.action)?);
        headers.insert("X-TC-Version", header_value(request.version)?);
        headers.insert("X-TC-Region", header_value(region)?);
        headers.insert("X-TC-Timestamp", header_value(&timestamp.to_string())?);

        let url = match &self.base_url {
            Some(base) => format!("{base}/"),
            None => format!("https://{}/", request.host),
        };

        debug!(action = request.action, region, "调用云API");

        let response = self
            .http
            .post(url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| ProvisionerError::Network(format!("{} 请求失败: {e}", request.action)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProvisionerError::Network(format!("{} 读取响应失败: {e}", request.action)))?;

        let parsed: Option<Value> = serde_json::from_str(&text).ok();
        let has_error = parsed
            .as_ref()
            .and_then(|v| v.get("Response"))
            .and_then(|r| r.get("Error"))
            .is_some();

        if !status.is_success() || has_error {
            return Err(ProvisionerError::ProviderApi {
                action: request.action.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        let mut envelope = parsed.ok_or_else(|| {
            ProvisionerError::ProviderResponse(format!("{} 响应不是有效的JSON", request.action))
        })?;
        let inner = envelope
            .get_mut("Response")
            .map(Value::take)
            .ok_or_else(|| {
                ProvisionerError::ProviderResponse(format!("{} 响应缺少Response字段", request.action))
            })?;

        serde_json::from_value(inner).map_err(|e| {
            ProvisionerError::ProviderResponse(format!("{} 响应结构无效: {e}", request.action))
        })
    }
}

fn build_http_client(timeout: Duration) -> ProvisionerResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProvisionerError::Configuration(format!("HTTP客户端创建失败: {e}")))
}

fn header_value(value: &str) -> ProvisionerResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| ProvisionerError::Internal(format!("无效的请求头值 {value:?}: {e}")))
}
