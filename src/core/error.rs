//! 错误类型：传输错误、参数绑定错误、命令执行错误与交互错误
//!
//! 所有终止性错误最终汇入 Player 的错误处理器（默认打日志），不会越过 think 边界向调用方传播。

use std::time::Duration;

use thiserror::Error;

/// 传输层错误（Interact / Archive 调用失败）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// 引擎未配置 Transport
    #[error("transport not set")]
    NotSet,

    /// 后端限流（429），携带建议的等待时长
    #[error("{}", rate_limited_message(*retry_after, message.as_deref()))]
    RateLimited {
        retry_after: Duration,
        message: Option<String>,
    },

    #[error("transport timeout after {0:?}")]
    Timeout(Duration),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("failed to decode backend response: {0}")]
    Decode(String),
}

fn rate_limited_message(retry_after: Duration, message: Option<&str>) -> String {
    match (retry_after.is_zero(), message) {
        (false, Some(msg)) => format!("rate limited (retry after {retry_after:?}): {msg}"),
        (false, None) => format!("rate limited (retry after {retry_after:?})"),
        (true, Some(msg)) => format!("rate limited: {msg}"),
        (true, None) => "rate limited".to_string(),
    }
}

impl TransportError {
    /// 若为限流错误，返回建议等待时长
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            TransportError::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}

/// 参数绑定错误：把后端传来的松散 JSON 转为命令字段时的溢出 / 空值 / 类型不匹配
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BindError {
    #[error("integer overflow converting {value} to {target}")]
    Overflow { value: String, target: String },

    #[error("cannot assign negative value {0} to unsigned integer")]
    NegativeToUnsigned(String),

    #[error("nil element at index {0}")]
    NilElement(usize),

    #[error("element at index {index}: {source}")]
    Element {
        index: usize,
        #[source]
        source: Box<BindError>,
    },

    #[error("cannot set field {0} to nil")]
    NilNotAllowed(String),

    #[error("type mismatch: got {got}, want {want}")]
    TypeMismatch { got: String, want: String },

    #[error("field {field}: {source}")]
    Field {
        field: String,
        #[source]
        source: Box<BindError>,
    },
}

impl BindError {
    /// 去掉 Field / Element 包装，返回最内层错误（便于测试与日志分类）
    pub fn root(&self) -> &BindError {
        match self {
            BindError::Field { source, .. } | BindError::Element { source, .. } => source.root(),
            other => other,
        }
    }
}

/// 命令执行失败（会中止本次 think）；与「未知命令」不同，后者只记录为失败的 CommandResult
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("failed to populate command fields for {command}: {source}")]
    Bind {
        command: String,
        #[source]
        source: BindError,
    },

    #[error("failed to call command handler for {command}: panic in command handler: {message}")]
    Panicked { command: String, message: String },

    #[error("task runner dropped command {0} before it completed")]
    Dropped(String),
}

/// 交互层错误：交给 Player 的错误处理器
#[derive(Error, Debug)]
pub enum AiError {
    #[error("ai interaction failed after {retries} transport retries: {source}")]
    InteractionFailed {
        retries: u32,
        #[source]
        source: TransportError,
    },

    #[error("ai did not provide an initial command or any command during the interaction")]
    NoInitialCommand,

    #[error("failed to execute command {name}: {source}")]
    CommandFailed {
        name: String,
        #[source]
        source: CommandError,
    },

    #[error("interaction gate closed")]
    GateClosed,
}

/// 命令处理器返回此错误表示「成功并结束本次交互序列」
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("break interaction")]
pub struct Break;

/// 判断处理器返回的错误链中是否包含 [`Break`]（兼容 anyhow context 包装）
pub fn is_break(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<Break>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_rate_limited_display() {
        let err = TransportError::RateLimited {
            retry_after: Duration::from_secs(5),
            message: Some("too many requests".to_string()),
        };
        assert_eq!(err.to_string(), "rate limited (retry after 5s): too many requests");
        assert_eq!(err.retry_after(), Some(Duration::from_secs(5)));

        let bare = TransportError::RateLimited {
            retry_after: Duration::ZERO,
            message: None,
        };
        assert_eq!(bare.to_string(), "rate limited");
        assert_eq!(TransportError::NotSet.retry_after(), None);
    }

    #[test]
    fn test_is_break_through_context() {
        let err: anyhow::Error = Break.into();
        assert!(is_break(&err));

        let wrapped = Err::<(), _>(Break).context("stop moving").unwrap_err();
        assert!(is_break(&wrapped));

        let other = anyhow::anyhow!("blocked by wall");
        assert!(!is_break(&other));
    }

    #[test]
    fn test_bind_error_root() {
        let err = BindError::Field {
            field: "Steps".to_string(),
            source: Box::new(BindError::Element {
                index: 2,
                source: Box::new(BindError::NilElement(2)),
            }),
        };
        assert_eq!(err.root(), &BindError::NilElement(2));
        assert!(err.to_string().starts_with("field Steps: element at index 2"));
    }

    #[test]
    fn test_interaction_failed_message() {
        let err = AiError::InteractionFailed {
            retries: 3,
            source: TransportError::Backend("boom".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "ai interaction failed after 3 transport retries: backend error: boom"
        );
    }
}
