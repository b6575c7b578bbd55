//! # provisioner-worker
//!
//! 供应任务的执行侧：引导脚本生成、重试策略、单任务处理器、
//! 定时轮询器，以及人工重试这一管理操作。

pub mod admin;
pub mod bootstrap;
pub mod poller;
pub mod processor;
pub mod retry_policy;

pub use admin::retry_failed_job;
pub use bootstrap::build_bootstrap_script;
pub use poller::{Poller, TickSummary};
pub use processor::JobProcessor;
pub use retry_policy::{compute_retry_outcome, retry_delay_minutes};
