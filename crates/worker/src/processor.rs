use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{error, info, warn};

use provisioner_core::{
    Clock, JobLogEntry, JobLogLevel, JobQueue, JobUpdate, ProvisionJob, ProvisionProvider, ProvisionResult,
    ProvisionerError, ProvisionerResult,
};

use crate::bootstrap::build_bootstrap_script;
use crate::retry_policy::compute_retry_outcome;

/// 单个供应任务的处理器
///
/// 一次处理：记录开始 → 创建实例 → 生成并下发引导脚本 → 持久化结果。
/// 工作流中任何一步失败都会按重试策略持久化为 `pending` 或 `failed`，
/// 然后把原始错误返回给调用方。每次处理最多写一次任务记录。
///
/// 审计日志尽力而为：追加失败只记录进程日志，不影响任务状态流转。
pub struct JobProcessor {
    queue: Arc<dyn JobQueue>,
    provider: Arc<dyn ProvisionProvider>,
    clock: Arc<dyn Clock>,
}

impl JobProcessor {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        provider: Arc<dyn ProvisionProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            queue,
            provider,
            clock,
        }
    }

    pub async fn process(&self, job: &ProvisionJob) -> ProvisionerResult<()> {
        self.audit(
            job,
            JobLogLevel::Info,
            "Starting provisioning workflow",
            Some(json!({
                "plan": job.plan_id,
                "template": job.template,
                "region": job.region,
            })),
        )
        .await;

        let provisioned = match self.run_workflow(job).await {
            Ok(result) => result,
            Err(err) => {
                self.handle_failure(job, &err).await;
                return Err(err);
            }
        };

        // 实例已存在，这里失败不能再走重试路径，否则会重复创建实例
        self.queue
            .update_job(&job.id, &JobUpdate::provisioned(&provisioned))
            .await?;

        info!(
            job_id = %job.id,
            provider = self.provider.name(),
            instance_id = %provisioned.instance_id,
            "供应任务完成"
        );
        Ok(())
    }

    async fn run_workflow(&self, job: &ProvisionJob) -> ProvisionerResult<ProvisionResult> {
        let provisioned = self.provider.create_instance(job).await?;

        self.audit(
            job,
            JobLogLevel::Info,
            "Instance created",
            Some(json!({
                "instanceId": provisioned.instance_id,
                "publicIp": provisioned.public_ip,
            })),
        )
        .await;

        let script = build_bootstrap_script(job.template, job.ssh_public_key.as_deref());
        self.provider
            .bootstrap_instance(job, &provisioned.instance_id, &script)
            .await?;

        self.audit(job, JobLogLevel::Info, "Bootstrap command submitted", None)
            .await;

        Ok(provisioned)
    }

    async fn handle_failure(&self, job: &ProvisionJob, err: &ProvisionerError) {
        let message = err.to_string();
        let outcome = compute_retry_outcome(job.retry_count, job.max_retries, self.clock.now());

        self.audit(
            job,
            JobLogLevel::Error,
            "Provision workflow failed",
            Some(json!({
                "message": message,
                "retryCount": outcome.retry_count,
                "maxRetries": job.max_retries,
            })),
        )
        .await;

        if outcome.is_terminal_failure {
            self.audit(
                job,
                JobLogLevel::Error,
                "Retry limit reached, job marked failed",
                Some(json!({
                    "retryCount": outcome.retry_count,
                    "maxRetries": job.max_retries,
                })),
            )
            .await;
        } else {
            self.audit(
                job,
                JobLogLevel::Warn,
                "Scheduling retry",
                Some(json!({
                    "retryCount": outcome.retry_count,
                    "maxRetries": job.max_retries,
                    "nextRetryAt": outcome.next_retry_at,
                })),
            )
            .await;
        }

        let update = JobUpdate::after_failure(&outcome, message);
        if let Err(persist_err) = self.queue.update_job(&job.id, &update).await {
            error!(
                job_id = %job.id,
                error = %persist_err,
                "持久化失败状态出错"
            );
        }
    }

    async fn audit(&self, job: &ProvisionJob, level: JobLogLevel, message: &str, context: Option<Value>) {
        let entry = JobLogEntry::new(self.clock.now(), level, message, context);
        if let Err(e) = self.queue.append_log(&job.id, &entry).await {
            warn!(job_id = %job.id, log_message = message, error = %e, "追加任务日志失败");
        }
    }
}
