//! 管理操作：人工重试已终态失败的任务

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::info;

use provisioner_core::{JobLogEntry, JobLogLevel, JobQueue, JobUpdate, ProvisionerError, ProvisionerResult};

/// 把 `failed` 任务重置为 `pending`，重试计数清零并立即可被出队
///
/// 只有 `failed` 状态的任务允许人工重试，其他状态不做任何写入。
pub async fn retry_failed_job(
    queue: &dyn JobQueue,
    job_id: &str,
    actor_user_id: &str,
    now: DateTime<Utc>,
) -> ProvisionerResult<()> {
    let job = queue
        .get_job(job_id)
        .await?
        .ok_or_else(|| ProvisionerError::JobNotFound {
            id: job_id.to_string(),
        })?;

    if !job.is_failed() {
        return Err(ProvisionerError::InvalidJobState {
            id: job.id,
            status: job.status.to_string(),
        });
    }

    queue.update_job(job_id, &JobUpdate::manual_retry(now)).await?;
    queue
        .append_log(
            job_id,
            &JobLogEntry::new(
                now,
                JobLogLevel::Warn,
                "Provision job manually retried by admin",
                Some(json!({ "actor_user_id": actor_user_id })),
            ),
        )
        .await?;

    info!(job_id, actor_user_id, "供应任务已人工重试");
    Ok(())
}
