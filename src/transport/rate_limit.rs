//! 限流协调：解析 Retry-After，并让后续尝试等待到后端允许的时间点

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::core::TransportError;

/// 将 Retry-After 头转为时长：整数秒或形如 "3s" / "250ms" / "1m30s" 的时长；非法或非正数返回 0
pub fn retry_after_from_header(value: &str) -> Duration {
    let value = value.trim();
    if value.is_empty() {
        return Duration::ZERO;
    }
    if let Ok(secs) = value.parse::<i64>() {
        return u64::try_from(secs).map_or(Duration::ZERO, Duration::from_secs);
    }
    parse_duration(value).unwrap_or(Duration::ZERO)
}

/// 解析由「数字 + 单位」段拼接的时长（单位 ns / us / µs / ms / s / m / h）；负值视为无效
fn parse_duration(s: &str) -> Option<Duration> {
    if s.starts_with('-') {
        return None;
    }
    let mut rest = s.strip_prefix('+').unwrap_or(s);
    if rest.is_empty() {
        return None;
    }
    let mut total = 0f64;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_len == 0 {
            return None;
        }
        let number: f64 = rest[..num_len].parse().ok()?;
        rest = &rest[num_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return None,
        };
        rest = &rest[unit_len..];
        total += number * nanos_per_unit;
    }
    if !total.is_finite() || total <= 0.0 || total > u64::MAX as f64 {
        return None;
    }
    Some(Duration::from_nanos(total as u64))
}

/// 记录后端要求的最早下次尝试时间；多次观察保留更晚的截止点
#[derive(Debug, Default)]
pub struct RateLimitGate {
    next_allowed: Mutex<Option<Instant>>,
}

impl RateLimitGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// 观察传输错误；仅限流错误会推迟下次尝试
    pub fn observe(&self, err: &TransportError) {
        let Some(retry_after) = err.retry_after() else {
            return;
        };
        let retry_at = Instant::now() + retry_after;
        let mut next = self.next_allowed.lock().unwrap_or_else(PoisonError::into_inner);
        if next.map_or(true, |current| retry_at > current) {
            *next = Some(retry_at);
        }
    }

    /// 若处于限流窗口内则等待到窗口结束
    pub async fn wait(&self) {
        let deadline = self.next_allowed();
        if let Some(deadline) = deadline {
            if deadline > Instant::now() {
                tracing::debug!(wait = ?deadline.saturating_duration_since(Instant::now()), "waiting for rate limit window");
                tokio::time::sleep_until(deadline).await;
            }
        }
    }

    pub fn next_allowed(&self) -> Option<Instant> {
        *self.next_allowed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
