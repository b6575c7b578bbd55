use thiserror::Error;

/// 供应Worker错误类型定义
#[derive(Debug, Error)]
pub enum ProvisionerError {
    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("任务队列错误: {0}")]
    Queue(String),

    #[error("供应任务未找到: {id}")]
    JobNotFound { id: String },

    #[error("供应任务 {id} 当前状态 {status} 不允许此操作")]
    InvalidJobState { id: String, status: String },

    #[error("Tencent API {action} failed: {status} {body}")]
    ProviderApi {
        action: String,
        status: u16,
        body: String,
    },

    #[error("云厂商响应无效: {0}")]
    ProviderResponse(String),

    #[error("网络错误: {0}")]
    Network(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for ProvisionerError {
    fn from(err: serde_json::Error) -> Self {
        ProvisionerError::Serialization(err.to_string())
    }
}

/// 统一的Result类型
pub type ProvisionerResult<T> = std::result::Result<T, ProvisionerError>;
