//! 后台归档：把最旧的完整交互序列交给后端压缩为摘要
//!
//! 准备阶段在写锁内完成（置 archive_in_progress），传输调用在引擎的 TaskTracker 上后台执行，
//! 不受调用方生命周期影响；重试耗尽只记日志并撤销标记。

use std::sync::{Arc, PoisonError, RwLock};

use uuid::Uuid;

use crate::core::{retry_with_backoff, EngineContext};
use crate::memory::{ArchiveBatch, ConversationHistory};

/// 若历史满足归档条件则启动后台归档，返回是否已启动
pub fn spawn_archive<S>(engine: &Arc<EngineContext>, state: &Arc<RwLock<S>>, player_id: Uuid) -> bool
where
    S: AsMut<ConversationHistory> + Send + Sync + 'static,
{
    let batch = state
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .as_mut()
        .prepare_archive(&engine.archive().policy);
    let Some(batch) = batch else {
        return false;
    };

    tracing::debug!(player_id = %player_id, turns = batch.turns.len(), "starting history archive");
    let engine_bg = Arc::clone(engine);
    let state = Arc::clone(state);
    engine
        .background()
        .spawn(async move { run_archive(engine_bg, state, batch, player_id).await });
    true
}

async fn run_archive<S>(engine: Arc<EngineContext>, state: Arc<RwLock<S>>, batch: ArchiveBatch, player_id: Uuid)
where
    S: AsMut<ConversationHistory> + Send + Sync + 'static,
{
    let transport = engine.transport();
    let count = batch.turns.len();
    let outcome = retry_with_backoff("archive", &engine.archive().retry, None, |_| {
        transport.archive(&batch.turns, &batch.existing_archive)
    })
    .await;

    let mut guard = state.write().unwrap_or_else(PoisonError::into_inner);
    match outcome {
        Ok(archived) => {
            guard.as_mut().apply_archive(archived.content, count);
            tracing::info!(player_id = %player_id, archived_turns = count, "history archived");
        }
        Err(err) => {
            guard.as_mut().cancel_archive();
            tracing::warn!(player_id = %player_id, error = %err, "failed to archive history after retries");
        }
    }
}
