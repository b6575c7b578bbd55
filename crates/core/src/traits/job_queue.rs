use async_trait::async_trait;

use crate::{
    models::{JobLogEntry, JobUpdate, ProvisionJob},
    ProvisionerResult,
};

/// 外部任务队列/存储抽象接口
///
/// Worker只是队列的消费者。多实例部署时，"同一任务不会被两个Worker同时处理"
/// 由 `dequeue_batch` 的原子认领语义保证，而不是由Worker自身保证。
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// 原子认领最多 `max_count` 个到期任务，按返回顺序处理
    async fn dequeue_batch(&self, max_count: usize) -> ProvisionerResult<Vec<ProvisionJob>>;

    /// 追加一条任务审计日志，时间戳由调用方的时钟决定
    async fn append_log(&self, job_id: &str, entry: &JobLogEntry) -> ProvisionerResult<()>;

    /// 部分更新任务字段；任务不存在或更新被拒绝时返回错误
    async fn update_job(&self, job_id: &str, update: &JobUpdate) -> ProvisionerResult<()>;

    /// 按ID读取任务（管理操作使用）
    async fn get_job(&self, job_id: &str) -> ProvisionerResult<Option<ProvisionJob>>;
}
