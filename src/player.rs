//! Player：一个由后端驱动的智能体
//!
//! 对外提供角色设置、命令注册、错误处理器与 think；内部状态由一把读写锁保护，
//! 同一 Player 的交互序列经 SequenceGate 串行执行。Clone 得到的是同一个 Player 的句柄。

use std::sync::{Arc, PoisonError, RwLock};

use uuid::Uuid;

use crate::commands::{Command, CommandRegistry, CommandResult};
use crate::core::{AiError, EngineContext, SequenceGate};
use crate::memory::{spawn_archive, ConversationHistory};
use crate::react::{SequenceOutcome, ThinkSession};
use crate::transport::{ContextMap, RateLimitGate, Turn};

type ErrorHandler = Arc<dyn Fn(&AiError) + Send + Sync>;

/// Player 的可变状态（单锁保护）
#[derive(Default)]
pub struct PlayerState {
    pub role: String,
    pub role_context: Option<ContextMap>,
    pub commands: CommandRegistry,
    pub error_handler: Option<ErrorHandler>,
    pub history: ConversationHistory,
    pub previous_command_result: Option<CommandResult>,
}

impl AsMut<ConversationHistory> for PlayerState {
    fn as_mut(&mut self) -> &mut ConversationHistory {
        &mut self.history
    }
}

#[derive(Clone)]
pub struct Player {
    id: Uuid,
    engine: Arc<EngineContext>,
    state: Arc<RwLock<PlayerState>>,
    gate: Arc<SequenceGate>,
    rate_gate: Arc<RateLimitGate>,
}

impl Player {
    pub fn new(engine: Arc<EngineContext>) -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(player_id = %id, "player created");
        Self {
            id,
            engine,
            state: Arc::new(RwLock::new(PlayerState::default())),
            gate: Arc::new(SequenceGate::new()),
            rate_gate: Arc::new(RateLimitGate::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn engine(&self) -> &Arc<EngineContext> {
        &self.engine
    }

    /// 设置角色与可选的角色上下文，下一轮请求起生效
    pub fn set_role(&self, role: impl Into<String>, context: Option<ContextMap>) {
        let mut state = self.write_state();
        state.role = role.into();
        state.role_context = context;
    }

    /// 注册命令处理器；同名命令覆盖旧处理器。
    ///
    /// T::NAME 为空或字段重名时 panic。处理器返回 [`crate::core::Break`] 表示成功并结束序列，
    /// 其它错误记入 CommandResult 后继续。
    pub fn on_cmd<T, F>(&self, handler: F)
    where
        T: Command,
        F: Fn(T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.write_state().commands.register::<T, F>(handler);
    }

    /// 注册错误处理器；未注册时以 tracing::error! 记录
    pub fn on_err<F>(&self, handler: F)
    where
        F: Fn(&AiError) + Send + Sync + 'static,
    {
        self.write_state().error_handler = Some(Arc::new(handler));
    }

    /// 不关心错误内容的错误处理器
    pub fn on_err_simple<F>(&self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_err(move |_| handler());
    }

    /// 以 msg 开始一个交互序列并等待其结束。
    ///
    /// 同一 Player 上的并发调用依次执行；错误交给错误处理器，不向调用方返回。
    /// 仅在用完轮数上限时触发后台归档。
    pub async fn think(&self, msg: impl Into<String>, context: Option<ContextMap>) -> SequenceOutcome {
        let permit = match self.gate.enter().await {
            Ok(permit) => permit,
            Err(err) => {
                self.handle_error(err);
                return SequenceOutcome::Failed;
            }
        };

        let session = ThinkSession {
            player_id: self.id,
            engine: &self.engine,
            state: &self.state,
            rate_gate: &self.rate_gate,
        };
        let report = |err: AiError| self.handle_error(err);
        let outcome = session.run(msg.into(), context, &report).await;
        drop(permit);

        tracing::debug!(player_id = %self.id, outcome = ?outcome, "interaction sequence finished");
        if outcome == SequenceOutcome::TurnsExhausted {
            spawn_archive(&self.engine, &self.state, self.id);
        }
        outcome
    }

    fn handle_error(&self, err: AiError) {
        let handler = self
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .error_handler
            .clone();
        match handler {
            Some(handler) => handler(&err),
            None => tracing::error!(player_id = %self.id, error = %err, "ai interaction error"),
        }
    }

    /// 当前历史的独立副本
    pub fn history(&self) -> Vec<Turn> {
        self.read_state().history.snapshot()
    }

    pub fn archived_history(&self) -> String {
        self.read_state().history.archived().to_string()
    }

    pub fn is_archive_in_progress(&self) -> bool {
        self.read_state().history.is_archive_in_progress()
    }

    pub fn previous_command_result(&self) -> Option<CommandResult> {
        self.read_state().previous_command_result.clone()
    }

    /// 是否有交互序列正在执行
    pub fn is_thinking(&self) -> bool {
        self.gate.is_active()
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, PlayerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, PlayerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new(Arc::new(EngineContext::default()))
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read_state();
        f.debug_struct("Player")
            .field("id", &self.id)
            .field("role", &state.role)
            .field("commands", &state.commands.names())
            .field("history_len", &state.history.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TransportError;
    use serde_json::json;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_default_player_reports_transport_not_set() {
        let player = Player::default();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = errors.clone();
        player.on_err(move |err| sink.lock().unwrap().push(err.to_string()));

        let outcome = player.think("hello", None).await;
        assert_eq!(outcome, SequenceOutcome::Failed);
        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains(&TransportError::NotSet.to_string()));
        assert!(player.history().is_empty());
    }

    #[tokio::test]
    async fn test_on_err_simple_and_role() {
        let player = Player::default();
        let count = Arc::new(Mutex::new(0));
        let sink = count.clone();
        player.on_err_simple(move || *sink.lock().unwrap() += 1);
        player.set_role("merchant", json!({"gold": 10}).as_object().cloned());

        player.think("hi", None).await;
        assert_eq!(*count.lock().unwrap(), 1);
        assert!(!player.is_thinking());

        let state = player.read_state();
        assert_eq!(state.role, "merchant");
        assert_eq!(state.role_context.as_ref().unwrap()["gold"], json!(10));
    }

    #[test]
    fn test_clones_share_state() {
        let player = Player::default();
        let other = player.clone();
        other.set_role("guard", None);
        assert_eq!(player.id(), other.id());
        assert_eq!(player.read_state().role, "guard");
    }
}
