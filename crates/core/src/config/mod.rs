//! 配置管理
//!
//! 进程启动时加载一次，校验失败立即退出，不允许部分配置进入后续组件。
//! 加载顺序：内置默认值 → 可选TOML文件 → 环境变量（最高优先级）。
//! 构建出的 [`ProvisionerConfig`] 通过参数显式传递给各组件，不存在全局缓存。

pub mod loader;
pub mod models;

pub use loader::ConfigLoader;
pub use models::{
    LighthouseConfig, ProviderKind, ProvisionerConfig, QueueConfig, SecretString,
    TencentCloudConfig, WorkerConfig,
};
