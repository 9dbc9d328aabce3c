//! 交互闸门：每个 Player 同一时刻只允许一个交互序列
//!
//! 单许可 Semaphore；等待无超时、不可取消。许可随 guard 释放，唤醒一个等待者。

use tokio::sync::{Semaphore, SemaphorePermit};

use crate::core::AiError;

#[derive(Debug)]
pub struct SequenceGate {
    permits: Semaphore,
}

impl SequenceGate {
    pub fn new() -> Self {
        Self {
            permits: Semaphore::new(1),
        }
    }

    /// 等待并占用闸门；返回的 guard 被 drop 时释放
    pub async fn enter(&self) -> Result<SemaphorePermit<'_>, AiError> {
        self.permits.acquire().await.map_err(|_| AiError::GateClosed)
    }

    /// 当前是否有交互序列在运行
    pub fn is_active(&self) -> bool {
        self.permits.available_permits() == 0
    }
}

impl Default for SequenceGate {
    fn default() -> Self {
        Self::new()
    }
}
