//! # provisioner-core
//!
//! 供应Worker的核心抽象：错误类型、配置、数据模型、外部协作方接口
//! （任务队列与云厂商）、时钟以及日志初始化。

pub mod clock;
pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod traits;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::ProvisionerConfig;
pub use errors::*;
pub use models::{
    JobLogEntry, JobLogLevel, JobStatus, JobUpdate, ProvisionJob, ProvisionOs, ProvisionResult,
    ProvisionTemplate, RetryOutcome, UpdateValue,
};
pub use traits::{JobQueue, ProvisionProvider};
