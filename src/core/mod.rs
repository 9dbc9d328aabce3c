//! 核心层：错误类型、退避重试、交互闸门、任务执行器与引擎上下文

pub mod backoff;
pub mod engine;
pub mod error;
pub mod gate;
pub mod task_runner;

pub use backoff::{backoff_sleep, retry_with_backoff, RetryPolicy};
pub use engine::{ArchivePolicy, ArchiveSettings, EngineContext, EngineContextBuilder, InteractionSettings};
pub use error::{is_break, AiError, BindError, Break, CommandError, TransportError};
pub use gate::SequenceGate;
pub use task_runner::{
    abort_current_task, AbortSignal, InlineTaskRunner, Task, TaskRunner, ThreadTaskRunner,
};
