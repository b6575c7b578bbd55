use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::info;

use provisioner_core::{
    Clock, JobQueue, ProvisionProvider, ProvisionerConfig, SystemClock,
};
use provisioner_infrastructure::{JobQueueFactory, ProviderFactory};
use provisioner_worker::{retry_failed_job, JobProcessor, Poller};

/// 主应用程序：持有配置与外部协作方，负责组装轮询器
pub struct Application {
    config: ProvisionerConfig,
    queue: Arc<dyn JobQueue>,
    provider: Arc<dyn ProvisionProvider>,
    clock: Arc<dyn Clock>,
}

impl Application {
    /// 按配置创建任务队列与云厂商实现
    pub fn new(config: ProvisionerConfig) -> Result<Self> {
        let queue = JobQueueFactory::create(&config).context("创建任务队列客户端失败")?;
        let provider = ProviderFactory::create(&config).context("创建供应厂商失败")?;

        Ok(Self::with_components(
            config,
            queue,
            provider,
            Arc::new(SystemClock),
        ))
    }

    pub fn with_components(
        config: ProvisionerConfig,
        queue: Arc<dyn JobQueue>,
        provider: Arc<dyn ProvisionProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            queue,
            provider,
            clock,
        }
    }

    /// 运行轮询循环直到收到关闭信号
    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!(
            region = %self.config.tencent.region,
            interval_ms = self.config.worker.poll_interval_ms,
            batch_size = self.config.worker.batch_size,
            provider = self.provider.name(),
            "供应Worker已启动"
        );

        let processor = JobProcessor::new(
            Arc::clone(&self.queue),
            Arc::clone(&self.provider),
            Arc::clone(&self.clock),
        );
        let poller = Poller::new(Arc::clone(&self.queue), processor, &self.config.worker);
        poller.run(shutdown_rx).await;

        info!("供应Worker已停止");
        Ok(())
    }

    /// 人工重试一个已失败的任务
    pub async fn retry_job(&self, job_id: &str, actor_user_id: &str) -> Result<()> {
        retry_failed_job(self.queue.as_ref(), job_id, actor_user_id, self.clock.now())
            .await
            .with_context(|| format!("重试任务失败: {job_id}"))
    }
}
