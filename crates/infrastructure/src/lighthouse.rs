//! Lighthouse（轻量应用服务器）供应实现
//!
//! 实例创建走 Lighthouse API，引导脚本通过 TAT（自动化助手）下发执行。

use std::collections::HashMap;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use provisioner_core::{
    config::LighthouseConfig, ProvisionJob, ProvisionProvider, ProvisionResult,
    ProvisionerError, ProvisionerResult,
};

use crate::tencent::{ApiRequest, TencentCloudClient};

const LIGHTHOUSE_SERVICE: &str = "lighthouse";
const LIGHTHOUSE_HOST: &str = "lighthouse.tencentcloudapi.com";
const LIGHTHOUSE_VERSION: &str = "2020-03-24";

const TAT_SERVICE: &str = "tat";
const TAT_HOST: &str = "tat.tencentcloudapi.com";
const TAT_VERSION: &str = "2020-10-28";

const INSTANCE_CHARGE_TYPE: &str = "POSTPAID_BY_HOUR";
const RESOURCE_PREFIX: &str = "web3ho";
const COMMAND_DESCRIPTION: &str = "Web3 Home Office bootstrap command";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateInstancesResponse {
    #[serde(default)]
    instance_id_set: Vec<String>,
    request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstancesResponse {
    #[serde(default)]
    instance_set: Vec<InstanceInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstanceInfo {
    instance_id: String,
    #[serde(default)]
    public_addresses: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateCommandResponse {
    command_id: Option<String>,
}

/// `InvokeCommand` 的响应内容不被使用，只关心调用是否成功
#[derive(Debug, Deserialize)]
struct IgnoredResponse {}

pub struct LighthouseProvider {
    client: TencentCloudClient,
    config: LighthouseConfig,
}

impl LighthouseProvider {
    pub fn new(client: TencentCloudClient, config: LighthouseConfig) -> Self {
        Self { client, config }
    }

    async fn lighthouse_call<T: serde::de::DeserializeOwned>(
        &self,
        job: &ProvisionJob,
        action: &str,
        payload: &Value,
    ) -> ProvisionerResult<T> {
        self.client
            .call(ApiRequest {
                service: LIGHTHOUSE_SERVICE,
                host: LIGHTHOUSE_HOST,
                action,
                version: LIGHTHOUSE_VERSION,
                region: job.region_override(),
                payload,
            })
            .await
    }

    async fn tat_call<T: serde::de::DeserializeOwned>(
        &self,
        job: &ProvisionJob,
        action: &str,
        payload: &Value,
    ) -> ProvisionerResult<T> {
        self.client
            .call(ApiRequest {
                service: TAT_SERVICE,
                host: TAT_HOST,
                action,
                version: TAT_VERSION,
                region: job.region_override(),
                payload,
            })
            .await
    }

    /// 创建后立即查询一次公网IP。查询失败不影响已创建的实例。
    async fn lookup_public_ip(&self, job: &ProvisionJob, instance_id: &str) -> Option<String> {
        let payload = json!({ "InstanceIds": [instance_id] });
        let described: DescribeInstancesResponse =
            match self.lighthouse_call(job, "DescribeInstances", &payload).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(job_id = %job.id, instance_id, error = %e, "查询实例公网IP失败");
                    return None;
                }
            };

        described
            .instance_set
            .into_iter()
            .find(|instance| instance.instance_id == instance_id)
            .and_then(|instance| instance.public_addresses.into_iter().next())
    }
}

#[async_trait]
impl ProvisionProvider for LighthouseProvider {
    fn name(&self) -> &str {
        "lighthouse"
    }

    async fn create_instance(&self, job: &ProvisionJob) -> ProvisionerResult<ProvisionResult> {
        let payload = json!({
            "BundleId": self.config.bundle_id,
            "BlueprintId": self.config.blueprint_for(job.os),
            "InstanceChargeType": INSTANCE_CHARGE_TYPE,
            "InstanceCount": 1,
            "Zone": self.config.zone,
            "InstanceName": format!("{RESOURCE_PREFIX}-{}", job.short_id()),
        });

        let created: CreateInstancesResponse =
            self.lighthouse_call(job, "CreateInstances", &payload).await?;

        let instance_id = created.instance_id_set.into_iter().next().ok_or_else(|| {
            ProvisionerError::ProviderResponse(format!(
                "CreateInstances returned no instance ID for job {}",
                job.id
            ))
        })?;

        info!(job_id = %job.id, instance_id = %instance_id, "实例已创建");

        let public_ip = self.lookup_public_ip(job, &instance_id).await;

        let mut metadata = HashMap::new();
        if let Some(request_id) = created.request_id {
            metadata.insert("requestId".to_string(), Value::String(request_id));
        }

        Ok(ProvisionResult {
            instance_id,
            public_ip,
            metadata,
        })
    }

    async fn bootstrap_instance(
        &self,
        job: &ProvisionJob,
        instance_id: &str,
        script: &str,
    ) -> ProvisionerResult<()> {
        let content = general_purpose::STANDARD.encode(script.as_bytes());

        let create_payload = json!({
            "CommandName": format!("{RESOURCE_PREFIX}-bootstrap-{}", job.short_id()),
            "CommandType": "SHELL",
            "Content": content,
            "Description": COMMAND_DESCRIPTION,
        });
        let command: CreateCommandResponse =
            self.tat_call(job, "CreateCommand", &create_payload).await?;

        let command_id = command.command_id.filter(|id| !id.is_empty()).ok_or_else(|| {
            ProvisionerError::ProviderResponse(format!(
                "CreateCommand returned no command ID for job {}",
                job.id
            ))
        })?;

        let invoke_payload = json!({
            "CommandId": command_id,
            "InstanceIds": [instance_id],
            "Parameters": [],
        });
        let _: IgnoredResponse = self.tat_call(job, "InvokeCommand", &invoke_payload).await?;

        info!(job_id = %job.id, instance_id, command_id = %command_id, "引导命令已下发");
        Ok(())
    }
}
