//! 交互主循环
//!
//! 构建请求 -> interact（带退避重试与限流）-> 查找 / 绑定 / 执行命令 -> 记录 Turn -> 继续或结束；
//! 后端不再给出命令、处理器返回 Break、或发生终止性错误时结束，最多 max_turns 轮。

use std::sync::{PoisonError, RwLock};

use uuid::Uuid;

use crate::commands::{CommandResult, CommandSpec};
use crate::core::{retry_with_backoff, AiError, EngineContext};
use crate::player::PlayerState;
use crate::transport::{ContextMap, RateLimitGate, Request, Turn};

/// 一次交互序列的结束方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceOutcome {
    /// 后端未再给出命令
    Completed,
    /// 命令处理器返回 Break
    Broke,
    /// 传输重试耗尽或命令执行失败，错误已交给错误处理器
    Failed,
    /// 用完 max_turns 轮
    TurnsExhausted,
}

/// 交互序列所需的 Player 内部状态与引擎依赖
pub struct ThinkSession<'a> {
    pub player_id: Uuid,
    pub engine: &'a EngineContext,
    pub state: &'a RwLock<PlayerState>,
    pub rate_gate: &'a RateLimitGate,
}

/// 每轮请求前取得的状态快照
struct RequestSnapshot {
    role: String,
    role_context: Option<ContextMap>,
    history: Vec<Turn>,
    archived_history: String,
    command_specs: Vec<CommandSpec>,
    previous_command_result: Option<CommandResult>,
}

impl ThinkSession<'_> {
    fn snapshot(&self) -> RequestSnapshot {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        RequestSnapshot {
            role: state.role.clone(),
            role_context: state.role_context.clone(),
            history: state.history.snapshot(),
            archived_history: state.history.archived().to_string(),
            command_specs: state.commands.specs(),
            previous_command_result: state.previous_command_result.clone(),
        }
    }

    fn record(&self, turn: Turn) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(result) = &turn.executed_command_result {
            state.previous_command_result = Some(result.clone());
        }
        state.history.push(turn);
    }

    /// 执行一个完整交互序列；终止性错误交给 report 后返回 Failed
    pub async fn run(
        &self,
        msg: String,
        context: Option<ContextMap>,
        report: &(dyn Fn(AiError) + Send + Sync),
    ) -> SequenceOutcome {
        let settings = self.engine.interaction();
        let transport = self.engine.transport();
        let mut current_msg = msg;
        let mut current_context = context;
        let mut executed_any = false;

        for turn_index in 0..settings.max_turns {
            let snapshot = self.snapshot();
            let request = Request {
                content: std::mem::take(&mut current_msg),
                context: current_context.take(),
                role: snapshot.role,
                role_context: snapshot.role_context,
                knowledge_base: self.engine.knowledge_base().snapshot(),
                command_specs: snapshot.command_specs,
                previous_command_result: snapshot.previous_command_result,
                history: snapshot.history,
                archived_history: snapshot.archived_history,
                continuation_turn: turn_index,
            };

            tracing::debug!(player_id = %self.player_id, turn = turn_index, "sending interaction request");
            let response = match retry_with_backoff("interact", &settings.retry, Some(self.rate_gate), |_| {
                transport.interact(&request)
            })
            .await
            {
                Ok(response) => response,
                Err(source) => {
                    report(AiError::InteractionFailed {
                        retries: settings.retry.max_attempts,
                        source,
                    });
                    return SequenceOutcome::Failed;
                }
            };

            let mut turn = Turn {
                request_content: request.content,
                request_context: request.context,
                response_text: response.text,
                is_initial: turn_index == 0,
                ..Turn::default()
            };

            if response.command_name.is_empty() {
                self.record(turn);
                if !executed_any {
                    report(AiError::NoInitialCommand);
                }
                return SequenceOutcome::Completed;
            }
            executed_any = true;

            let name = response.command_name;
            let registered = self
                .state
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .commands
                .get(&name);
            let result = match registered {
                Some(command) => {
                    match command
                        .invoke(self.engine.task_runner().as_ref(), response.command_args.as_ref())
                        .await
                    {
                        Ok(result) => result,
                        Err(source) => {
                            report(AiError::CommandFailed { name, source });
                            return SequenceOutcome::Failed;
                        }
                    }
                }
                None => {
                    tracing::warn!(player_id = %self.player_id, command = %name, "ai requested unknown command");
                    CommandResult::failure(format!("ai requested unknown command: {name}"))
                }
            };

            let is_break = result.is_break;
            turn.response_command_name = name;
            turn.response_command_args = response.command_args;
            turn.executed_command_result = Some(result);
            self.record(turn);

            if is_break {
                return SequenceOutcome::Broke;
            }
        }

        tracing::info!(player_id = %self.player_id, max_turns = settings.max_turns, "interaction reached max turns");
        SequenceOutcome::TurnsExhausted
    }
}
