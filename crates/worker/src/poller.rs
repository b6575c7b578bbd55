use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use provisioner_core::{config::WorkerConfig, JobQueue, ProvisionerResult};

use crate::processor::JobProcessor;

/// 一轮轮询的统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub dequeued: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// 定时轮询任务队列并逐个处理任务
///
/// 启动后立即执行第一轮，之后按固定间隔执行。轮次之间不重叠：
/// 一轮超时时下一轮顺延，而不是并发启动。
pub struct Poller {
    queue: Arc<dyn JobQueue>,
    processor: JobProcessor,
    batch_size: usize,
    poll_interval: Duration,
}

impl Poller {
    pub fn new(queue: Arc<dyn JobQueue>, processor: JobProcessor, config: &WorkerConfig) -> Self {
        Self {
            queue,
            processor,
            batch_size: config.batch_size,
            poll_interval: config.poll_interval(),
        }
    }

    /// 运行轮询循环直到收到关闭信号
    ///
    /// 正在处理的一轮不会被中断，关闭信号在本轮结束后生效；
    /// 收到信号后不再开始新的一轮。
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            batch_size = self.batch_size,
            interval_ms = self.poll_interval.as_millis() as u64,
            "轮询器已启动"
        );

        loop {
            // 长耗时的一轮结束后，关闭信号与到期的tick可能同时就绪，关闭优先
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = ticker.tick() => {}
            }

            if shutdown_requested(&mut shutdown_rx) {
                break;
            }

            if let Err(e) = self.tick().await {
                error!(error = %e, "本轮轮询失败");
            }
        }

        info!("轮询器已停止");
    }

    /// 执行一轮：出队并按顺序处理。单个任务失败不影响同批其他任务。
    pub async fn tick(&self) -> ProvisionerResult<TickSummary> {
        let jobs = self.queue.dequeue_batch(self.batch_size).await?;

        let mut summary = TickSummary {
            dequeued: jobs.len(),
            ..TickSummary::default()
        };

        if jobs.is_empty() {
            info!("队列中没有待处理的任务");
            return Ok(summary);
        }

        info!(count = jobs.len(), "已出队供应任务");

        for job in &jobs {
            match self.processor.process(job).await {
                Ok(()) => {
                    summary.succeeded += 1;
                    info!(job_id = %job.id, "供应任务处理成功");
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(job_id = %job.id, error = %e, "供应任务处理失败");
                }
            }
        }

        Ok(summary)
    }
}

fn shutdown_requested(shutdown_rx: &mut broadcast::Receiver<()>) -> bool {
    matches!(
        shutdown_rx.try_recv(),
        Ok(()) | Err(TryRecvError::Closed)
    )
}
