use async_trait::async_trait;

use crate::{
    models::{ProvisionJob, ProvisionResult},
    ProvisionerResult,
};

/// 云厂商供应能力接口
///
/// 当前厂商是其中一个实现；新增厂商只需新增实现并通过配置选择，
/// 任务处理器无需改动。
#[async_trait]
pub trait ProvisionProvider: Send + Sync {
    /// 厂商名称，用于日志
    fn name(&self) -> &str;

    /// 创建计算实例。公网IP缺失不是错误。
    async fn create_instance(&self, job: &ProvisionJob) -> ProvisionerResult<ProvisionResult>;

    /// 在实例上注册并执行引导脚本
    async fn bootstrap_instance(
        &self,
        job: &ProvisionJob,
        instance_id: &str,
        script: &str,
    ) -> ProvisionerResult<()>;
}
