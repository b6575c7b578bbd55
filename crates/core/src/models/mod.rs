//! # 数据模型
//!
//! 定义供应Worker的核心数据结构：供应任务、任务日志、部分字段更新以及
//! 工作流执行过程中产生的临时结果。
//!
//! ## 核心模型
//!
//! ### ProvisionJob - 供应任务
//! 由外部系统创建、由Worker出队处理的一次云主机供应请求。
//!
//! ### JobUpdate - 任务部分更新
//! Worker在一次处理过程中写回外部存储的唯一权威状态变更。
//!
//! ### ProvisionResult / RetryOutcome
//! 工作流内部的临时结果，不会单独持久化。
//!
//! ## 设计原则
//!
//! - 所有时间字段使用 `DateTime<Utc>` 确保时区一致性
//! - 状态字段使用枚举类型，线上格式与外部存储保持一致（小写/短横线）
//! - 可空字段与"不修改"字段通过 [`UpdateValue`] 明确区分

pub mod job;
pub mod provision;
pub mod update_value;

pub use job::{
    JobLogEntry, JobLogLevel, JobStatus, JobUpdate, ProvisionJob, ProvisionOs, ProvisionTemplate,
};
pub use provision::{ProvisionResult, RetryOutcome};
pub use update_value::UpdateValue;
