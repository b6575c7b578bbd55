//! # provisioner-infrastructure
//!
//! 外部协作方的具体实现：腾讯云签名请求客户端、Lighthouse供应实现、
//! PostgREST任务队列客户端，以及按配置组装它们的工厂。

pub mod lighthouse;
pub mod postgrest_queue;
pub mod provider_factory;
pub mod tencent;

pub use lighthouse::LighthouseProvider;
pub use postgrest_queue::PostgrestJobQueue;
pub use provider_factory::{JobQueueFactory, ProviderFactory};
pub use tencent::{ApiRequest, TencentCloudClient};
