use std::sync::Arc;

use tracing::{debug, info};

use provisioner_core::{
    config::{ProviderKind, ProvisionerConfig},
    JobQueue, ProvisionProvider, ProvisionerResult,
};

use crate::{tencent::TencentCloudClient, LighthouseProvider, PostgrestJobQueue};

/// 按配置构建云厂商实现，任务处理器只依赖 `dyn ProvisionProvider`
pub struct ProviderFactory;

impl ProviderFactory {
    pub fn create(config: &ProvisionerConfig) -> ProvisionerResult<Arc<dyn ProvisionProvider>> {
        debug!("创建供应提供者，类型: {:?}", config.provider);

        match config.provider {
            ProviderKind::Lighthouse => {
                info!(region = %config.tencent.region, "初始化Lighthouse供应提供者");
                let client = TencentCloudClient::new(&config.tencent)?;
                Ok(Arc::new(LighthouseProvider::new(
                    client,
                    config.lighthouse.clone(),
                )))
            }
        }
    }
}

pub struct JobQueueFactory;

impl JobQueueFactory {
    pub fn create(config: &ProvisionerConfig) -> ProvisionerResult<Arc<dyn JobQueue>> {
        info!(url = %config.queue.url, "初始化PostgREST任务队列");
        let queue = PostgrestJobQueue::new(&config.queue, config.tencent.request_timeout())?;
        Ok(Arc::new(queue))
    }
}
