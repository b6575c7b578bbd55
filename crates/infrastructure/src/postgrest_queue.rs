//! 基于 PostgREST（Supabase）的任务队列客户端
//!
//! 出队与追加日志通过数据库RPC完成，原子认领由 `dequeue_provision_jobs`
//! 在数据库侧保证；字段更新直接PATCH `provision_jobs` 表。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde_json::{json, Value};
use tracing::debug;

use provisioner_core::{
    config::QueueConfig, JobLogEntry, JobQueue, JobUpdate, ProvisionJob,
    ProvisionerError, ProvisionerResult,
};

const JOBS_TABLE: &str = "provision_jobs";
const DEQUEUE_RPC: &str = "dequeue_provision_jobs";
const APPEND_LOG_RPC: &str = "append_provision_job_log";

pub struct PostgrestJobQueue {
    http: reqwest::Client,
    rest_url: String,
    service_key: String,
}

impl std::fmt::Debug for PostgrestJobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgrestJobQueue")
            .field("rest_url", &self.rest_url)
            .field("service_key", &"***")
            .finish()
    }
}

impl PostgrestJobQueue {
    pub fn new(config: &QueueConfig, timeout: Duration) -> ProvisionerResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProvisionerError::Configuration(format!("HTTP客户端创建失败: {e}")))?;

        Ok(Self {
            http,
            rest_url: format!("{}/rest/v1", config.url.trim_end_matches('/')),
            service_key: config.service_role_key.expose().to_string(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/{path}", self.rest_url))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn send(&self, operation: &str, builder: RequestBuilder) -> ProvisionerResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| ProvisionerError::Queue(format!("{operation} 请求失败: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProvisionerError::Queue(format!(
                "{operation} 失败: {} {body}",
                status.as_u16()
            )));
        }

        Ok(response)
    }

    async fn read_json(operation: &str, response: Response) -> ProvisionerResult<Value> {
        let text = response
            .text()
            .await
            .map_err(|e| ProvisionerError::Queue(format!("{operation} 读取响应失败: {e}")))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| ProvisionerError::Queue(format!("{operation} 响应不是有效的JSON: {e}")))
    }
}

fn id_filter(job_id: &str) -> String {
    format!("eq.{job_id}")
}

#[async_trait]
impl JobQueue for PostgrestJobQueue {
    async fn dequeue_batch(&self, max_count: usize) -> ProvisionerResult<Vec<ProvisionJob>> {
        let builder = self
            .request(Method::POST, &format!("rpc/{DEQUEUE_RPC}"))
            .json(&json!({ "batch_size": max_count }));
        let response = self.send("dequeue", builder).await?;

        match Self::read_json("dequeue", response).await? {
            Value::Null => Ok(Vec::new()),
            value => serde_json::from_value(value)
                .map_err(|e| ProvisionerError::Queue(format!("dequeue 任务结构无效: {e}"))),
        }
    }

    async fn append_log(&self, job_id: &str, entry: &JobLogEntry) -> ProvisionerResult<()> {
        let builder = self
            .request(Method::POST, &format!("rpc/{APPEND_LOG_RPC}"))
            .json(&json!({ "job_id": job_id, "log_line": entry }));

        self.send("append_log", builder).await?;
        Ok(())
    }

    async fn update_job(&self, job_id: &str, update: &JobUpdate) -> ProvisionerResult<()> {
        debug!(job_id, ?update, "更新供应任务");

        let builder = self
            .request(Method::PATCH, JOBS_TABLE)
            .query(&[("id", id_filter(job_id))])
            .header("Prefer", "return=representation")
            .json(update);
        let response = self.send("update_job", builder).await?;

        let updated = match Self::read_json("update_job", response).await? {
            Value::Array(rows) => rows.len(),
            Value::Null => 0,
            _ => 1,
        };
        if updated == 0 {
            return Err(ProvisionerError::JobNotFound {
                id: job_id.to_string(),
            });
        }

        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> ProvisionerResult<Option<ProvisionJob>> {
        let builder = self
            .request(Method::GET, JOBS_TABLE)
            .query(&[("id", id_filter(job_id)), ("select", "*".to_string())]);
        let response = self.send("get_job", builder).await?;

        let mut jobs: Vec<ProvisionJob> = match Self::read_json("get_job", response).await? {
            Value::Null => Vec::new(),
            value => serde_json::from_value(value)
                .map_err(|e| ProvisionerError::Queue(format!("get_job 任务结构无效: {e}")))?,
        };

        Ok(if jobs.is_empty() { None } else { Some(jobs.swap_remove(0)) })
    }
}
