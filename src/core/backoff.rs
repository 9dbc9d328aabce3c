//! 指数退避与重试
//!
//! backoff_sleep 使用 full jitter：在 [0, min(cap, base * 2^attempt)) 内均匀取值。
//! retry_with_backoff 为每次尝试建立独立超时：退避睡眠与传输调用共享同一截止时间。

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::{timeout_at, Instant};

use crate::core::TransportError;
use crate::transport::RateLimitGate;

/// 计算第 attempt 次重试前的睡眠时长（attempt 从 0 开始计，0 时落在 [0, base)）
pub fn backoff_sleep(base: Duration, cap: Duration, attempt: u32) -> Duration {
    let pow: u128 = if attempt >= 63 {
        i64::MAX as u128
    } else {
        1u128 << attempt
    };
    let window = base
        .as_nanos()
        .checked_mul(pow)
        .map_or(cap.as_nanos(), |sleep| sleep.min(cap.as_nanos()));
    let window = u64::try_from(window).unwrap_or(u64::MAX);
    if window == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rand::thread_rng().gen_range(0..window))
}

/// 重试策略：最大尝试次数、单次超时、退避基数与上限
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl RetryPolicy {
    /// 交互调用默认策略：3 次、每次 45s、退避 100ms 起步封顶 2s
    pub fn interaction() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(45),
            backoff_base: Duration::from_millis(100),
            backoff_cap: Duration::from_secs(2),
        }
    }

    /// 归档调用默认策略：3 次、每次 120s、退避 500ms 起步封顶 5s
    pub fn archive() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(120),
            backoff_base: Duration::from_millis(500),
            backoff_cap: Duration::from_secs(5),
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        backoff_sleep(self.backoff_base, self.backoff_cap, attempt)
    }
}

/// 按策略重试 operation；全部失败时返回最后一次错误。
///
/// 第 2 次起先退避再调用；若退避期间本次尝试已超时，直接放弃剩余尝试。
/// 提供 rate_gate 时，每次失败都交给它观察，调用前等待其限流窗口结束。
pub async fn retry_with_backoff<T, F, Fut>(
    label: &str,
    policy: &RetryPolicy,
    rate_gate: Option<&RateLimitGate>,
    mut operation: F,
) -> Result<T, TransportError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let mut last_err = TransportError::Timeout(policy.attempt_timeout);
    for attempt in 0..policy.max_attempts.max(1) {
        let deadline = Instant::now() + policy.attempt_timeout;

        if attempt > 0 {
            let pause = policy.delay_for(attempt);
            if timeout_at(deadline, tokio::time::sleep(pause)).await.is_err() {
                last_err = TransportError::Timeout(policy.attempt_timeout);
                break;
            }
        }

        let call = async {
            if let Some(gate) = rate_gate {
                gate.wait().await;
            }
            operation(attempt).await
        };
        match timeout_at(deadline, call).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => {
                tracing::warn!(call = label, attempt = attempt + 1, error = %err, "transport attempt failed");
                if let Some(gate) = rate_gate {
                    gate.observe(&err);
                }
                last_err = err;
            }
            Err(_) => {
                tracing::warn!(call = label, attempt = attempt + 1, timeout = ?policy.attempt_timeout, "transport attempt timed out");
                last_err = TransportError::Timeout(policy.attempt_timeout);
            }
        }
    }
    Err(last_err)
}
