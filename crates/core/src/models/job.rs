use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ProvisionResult, RetryOutcome, UpdateValue};

/// 供应任务
///
/// 外部Web应用创建任务（状态 `pending`，`retry_count = 0`），Worker出队后
/// 独占修改状态、实例信息、重试计数与日志，直到本轮处理结束。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionJob {
    pub id: String,
    pub user_id: String,
    pub plan_id: String,
    pub template: ProvisionTemplate,
    #[serde(default)]
    pub os: ProvisionOs,
    pub status: JobStatus,
    pub region: String,
    pub instance_id: Option<String>,
    pub ip: Option<String>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub next_retry_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub ssh_public_key: Option<String>,
    #[serde(default = "empty_logs")]
    pub logs: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn empty_logs() -> Value {
    Value::Array(Vec::new())
}

impl ProvisionJob {
    /// 用于资源命名的任务ID前缀（前8个字符）
    pub fn short_id(&self) -> &str {
        match self.id.char_indices().nth(8) {
            Some((idx, _)) => &self.id[..idx],
            None => &self.id,
        }
    }

    /// 任务指定的地域，空字符串视为未指定
    pub fn region_override(&self) -> Option<&str> {
        let region = self.region.trim();
        (!region.is_empty()).then_some(region)
    }

    pub fn is_failed(&self) -> bool {
        self.status == JobStatus::Failed
    }

    /// 将部分更新应用到本地副本，与外部存储的PATCH语义一致
    pub fn apply_update(&mut self, update: &JobUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        self.instance_id = update.instance_id.clone().apply_to(self.instance_id.take());
        self.ip = update.ip.clone().apply_to(self.ip.take());
        if let Some(retry_count) = update.retry_count {
            self.retry_count = retry_count;
        }
        if let Some(next_retry_at) = update.next_retry_at {
            self.next_retry_at = next_retry_at;
        }
        self.last_error = update.last_error.clone().apply_to(self.last_error.take());
    }
}

/// 任务状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Provisioned,
    Failed,
    Revoked,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Provisioned => "provisioned",
            JobStatus::Failed => "failed",
            JobStatus::Revoked => "revoked",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 引导脚本模板
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum ProvisionTemplate {
    #[default]
    #[serde(rename = "vps-base")]
    VpsBase,
    #[serde(rename = "rpc-placeholder")]
    RpcPlaceholder,
}

impl ProvisionTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisionTemplate::VpsBase => "vps-base",
            ProvisionTemplate::RpcPlaceholder => "rpc-placeholder",
        }
    }
}

impl fmt::Display for ProvisionTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 请求的操作系统，用于选择镜像蓝图
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProvisionOs {
    #[default]
    Ubuntu,
    Debian,
    Kali,
}

impl ProvisionOs {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisionOs::Ubuntu => "ubuntu",
            ProvisionOs::Debian => "debian",
            ProvisionOs::Kali => "kali",
        }
    }
}

/// 任务日志级别
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobLogLevel {
    Info,
    Warn,
    Error,
}

/// 追加到任务 `logs` 序列中的一条审计日志，写入后不可修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobLogEntry {
    pub ts: DateTime<Utc>,
    pub level: JobLogLevel,
    pub message: String,
    pub context: Option<Value>,
}

impl JobLogEntry {
    pub fn new(
        ts: DateTime<Utc>,
        level: JobLogLevel,
        message: impl Into<String>,
        context: Option<Value>,
    ) -> Self {
        Self {
            ts,
            level,
            message: message.into(),
            context,
        }
    }
}

/// 任务部分更新
///
/// 只包含Worker有权修改的字段；`None`/`NoChange` 的字段不会出现在请求体中。
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct JobUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(skip_serializing_if = "UpdateValue::is_no_change")]
    pub instance_id: UpdateValue<String>,
    #[serde(skip_serializing_if = "UpdateValue::is_no_change")]
    pub ip: UpdateValue<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_retry_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "UpdateValue::is_no_change")]
    pub last_error: UpdateValue<String>,
}

impl JobUpdate {
    /// 供应成功：`{status: provisioned, instance_id, ip, last_error: null}`
    pub fn provisioned(result: &ProvisionResult) -> Self {
        Self {
            status: Some(JobStatus::Provisioned),
            instance_id: UpdateValue::Set(result.instance_id.clone()),
            ip: UpdateValue::from_nullable(result.public_ip.clone()),
            last_error: UpdateValue::Unset,
            ..Self::default()
        }
    }

    /// 失败后的持久化状态：未达上限回到 `pending`，否则冻结为 `failed`
    pub fn after_failure(outcome: &RetryOutcome, error_message: impl Into<String>) -> Self {
        let status = if outcome.is_terminal_failure {
            JobStatus::Failed
        } else {
            JobStatus::Pending
        };

        Self {
            status: Some(status),
            retry_count: Some(outcome.retry_count),
            next_retry_at: Some(outcome.next_retry_at),
            last_error: UpdateValue::Set(error_message.into()),
            ..Self::default()
        }
    }

    /// 管理员手动重试：重置重试计数并立即重新入队
    pub fn manual_retry(now: DateTime<Utc>) -> Self {
        Self {
            status: Some(JobStatus::Pending),
            retry_count: Some(0),
            next_retry_at: Some(now),
            last_error: UpdateValue::Unset,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample_job_json() -> Value {
        json!({
            "id": "3f1c2a9b-7d4e-4c1a-9e2f-0a1b2c3d4e5f",
            "user_id": "user-1",
            "plan_id": "starter",
            "template": "rpc-placeholder",
            "status": "pending",
            "region": "ap-singapore",
            "instance_id": null,
            "ip": null,
            "retry_count": 0,
            "max_retries": 3,
            "next_retry_at": "2026-01-01T00:00:00+00:00",
            "last_error": null,
            "ssh_public_key": null,
            "logs": [],
            "created_at": "2026-01-01T00:00:00.123456+00:00",
            "updated_at": "2026-01-01T00:00:00+00:00"
        })
    }

    #[test]
    fn test_deserialize_row_defaults_os_to_ubuntu() {
        let job: ProvisionJob = serde_json::from_value(sample_job_json()).unwrap();
        assert_eq!(job.template, ProvisionTemplate::RpcPlaceholder);
        assert_eq!(job.os, ProvisionOs::Ubuntu);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.short_id(), "3f1c2a9b");
    }

    #[test]
    fn test_short_id_handles_short_ids() {
        let mut job: ProvisionJob = serde_json::from_value(sample_job_json()).unwrap();
        job.id = "abc".to_string();
        assert_eq!(job.short_id(), "abc");
    }

    #[test]
    fn test_provisioned_update_serializes_null_ip() {
        let update = JobUpdate::provisioned(&ProvisionResult {
            instance_id: "ins-1".to_string(),
            public_ip: None,
            metadata: Default::default(),
        });

        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({
                "status": "provisioned",
                "instance_id": "ins-1",
                "ip": null,
                "last_error": null
            })
        );
    }

    #[test]
    fn test_failure_update_omits_instance_fields() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 1, 0).unwrap();
        let outcome = RetryOutcome {
            retry_count: 1,
            is_terminal_failure: false,
            next_retry_at: now,
        };
        let value = serde_json::to_value(JobUpdate::after_failure(&outcome, "boom")).unwrap();

        assert_eq!(value["status"], "pending");
        assert_eq!(value["retry_count"], 1);
        assert_eq!(value["last_error"], "boom");
        assert!(value.get("instance_id").is_none());
        assert!(value.get("ip").is_none());
    }

    #[test]
    fn test_apply_update() {
        let mut job: ProvisionJob = serde_json::from_value(sample_job_json()).unwrap();
        job.last_error = Some("old".to_string());

        job.apply_update(&JobUpdate::provisioned(&ProvisionResult {
            instance_id: "ins-1".to_string(),
            public_ip: Some("203.0.113.7".to_string()),
            metadata: Default::default(),
        }));

        assert_eq!(job.status, JobStatus::Provisioned);
        assert_eq!(job.instance_id.as_deref(), Some("ins-1"));
        assert_eq!(job.ip.as_deref(), Some("203.0.113.7"));
        assert_eq!(job.last_error, None);
        assert_eq!(job.retry_count, 0);
    }
}
