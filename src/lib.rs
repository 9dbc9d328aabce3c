//! ai-player - 由后端驱动的游戏智能体交互引擎
//!
//! 模块划分：
//! - **commands**: 命令描述、参数绑定（JSON → 强类型字段）与注册表
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、退避重试、交互闸门、任务执行器、引擎上下文
//! - **knowledge**: 共享知识库
//! - **memory**: 交互历史与后台归档
//! - **observability**: tracing 初始化
//! - **player**: Player 对外接口（角色、命令、错误处理、think）
//! - **react**: 单次 think 的交互主循环
//! - **transport**: Transport 抽象、交互数据结构、限流协调与 Mock

pub mod commands;
pub mod config;
pub mod core;
pub mod knowledge;
pub mod memory;
pub mod observability;
pub mod player;
pub mod react;
pub mod transport;

pub use crate::commands::{BoundArgs, Command, CommandResult, CommandSpec, FieldSpec};
pub use crate::core::{abort_current_task, AiError, Break, EngineContext, TransportError};
pub use crate::knowledge::KnowledgeBase;
pub use crate::player::Player;
pub use crate::react::SequenceOutcome;
pub use crate::transport::{ArchivedHistory, ContextMap, Request, Response, Transport, Turn};
