//! 重试策略
//!
//! 固定阶梯退避：第1次重试1分钟，第2次5分钟，之后保持15分钟。
//! 纯函数，`now` 由调用方注入。

use chrono::{DateTime, Duration, Utc};

use provisioner_core::RetryOutcome;

/// 退避阶梯（分钟）
const BACKOFF_LADDER_MINUTES: [i64; 3] = [1, 5, 15];

/// 第 `attempt` 次重试（从1开始）的等待分钟数，超出阶梯长度时取最后一级
pub fn retry_delay_minutes(attempt: i32) -> i64 {
    if attempt <= 0 {
        return BACKOFF_LADDER_MINUTES[0];
    }
    let index = (attempt as usize - 1).min(BACKOFF_LADDER_MINUTES.len() - 1);
    BACKOFF_LADDER_MINUTES[index]
}

/// 根据当前重试次数计算一次失败后的结果
///
/// 新的 `retry_count` 未达到 `max_retries` 时按阶梯安排下一次尝试；
/// 否则进入终态，`next_retry_at` 取 `now`，不再自动重试。
pub fn compute_retry_outcome(
    current_retry_count: i32,
    max_retries: i32,
    now: DateTime<Utc>,
) -> RetryOutcome {
    let retry_count = current_retry_count.saturating_add(1);

    if retry_count < max_retries {
        RetryOutcome {
            retry_count,
            is_terminal_failure: false,
            next_retry_at: now + Duration::minutes(retry_delay_minutes(retry_count)),
        }
    } else {
        RetryOutcome {
            retry_count,
            is_terminal_failure: true,
            next_retry_at: now,
        }
    }
}
