use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 创建实例的结果，由Provider产生并立即被任务处理器消费
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionResult {
    pub instance_id: String,
    /// 实例创建初期公网IP可能尚未分配
    pub public_ip: Option<String>,
    pub metadata: HashMap<String, Value>,
}

/// 重试策略的计算结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryOutcome {
    pub retry_count: i32,
    pub is_terminal_failure: bool,
    pub next_retry_at: DateTime<Utc>,
}
