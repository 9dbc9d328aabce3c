//! Transport 抽象
//!
//! 所有后端绑定（HTTP / 浏览器 fetch / Mock）实现 Transport：interact（单轮决策）、archive（历史压缩）。
//! 超时由调用方以 future 超时施加，实现方无需自行处理。

use async_trait::async_trait;

use crate::core::TransportError;
use crate::transport::{ArchivedHistory, Request, Response, Turn};

#[async_trait]
pub trait Transport: Send + Sync {
    /// 发送一次交互请求并返回后端决策
    async fn interact(&self, req: &Request) -> Result<Response, TransportError>;

    /// 提交待归档的若干轮历史，返回合并了 existing_archive 的新摘要
    async fn archive(
        &self,
        turns: &[Turn],
        existing_archive: &str,
    ) -> Result<ArchivedHistory, TransportError>;
}

/// 未配置时使用的 Transport：所有调用返回 [`TransportError::NotSet`]
#[derive(Debug, Default, Clone, Copy)]
pub struct NotSetTransport;

#[async_trait]
impl Transport for NotSetTransport {
    async fn interact(&self, _req: &Request) -> Result<Response, TransportError> {
        Err(TransportError::NotSet)
    }

    async fn archive(
        &self,
        _turns: &[Turn],
        _existing_archive: &str,
    ) -> Result<ArchivedHistory, TransportError> {
        Err(TransportError::NotSet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_not_set_transport() {
        let transport = NotSetTransport;
        let err = transport.interact(&Request::default()).await.unwrap_err();
        assert_eq!(err, TransportError::NotSet);

        let turns = vec![Turn {
            request_content: "test".to_string(),
            ..Turn::default()
        }];
        let err = transport.archive(&turns, "").await.unwrap_err();
        assert_eq!(err, TransportError::NotSet);
    }
}
