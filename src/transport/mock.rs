//! Mock Transport（用于测试，无需后端）
//!
//! 按脚本依次返回预置的交互 / 归档结果；脚本耗尽后 interact 回显一条无命令响应，archive 返回 "archived"。
//! 记录收到的每个请求，便于断言请求内容。

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::core::TransportError;
use crate::transport::{ArchivedHistory, Request, Response, Transport, Turn};

/// 单个 interact 脚本步骤
#[derive(Debug, Clone)]
pub enum MockReply {
    Respond(Response),
    Fail(TransportError),
    /// 先等待再返回（用于超时 / 并发测试）
    Delay(Duration, Response),
}

/// 一次 archive 调用的记录
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveCall {
    pub turns: Vec<Turn>,
    pub existing_archive: String,
}

#[derive(Debug, Default)]
struct MockState {
    replies: VecDeque<MockReply>,
    archive_replies: VecDeque<Result<ArchivedHistory, TransportError>>,
    requests: Vec<Request>,
    archive_calls: Vec<ArchiveCall>,
}

/// 脚本化 Transport
#[derive(Debug, Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies(replies: impl IntoIterator<Item = MockReply>) -> Self {
        let mock = Self::new();
        for reply in replies {
            mock.push_reply(reply);
        }
        mock
    }

    pub fn push_reply(&self, reply: MockReply) {
        self.lock().replies.push_back(reply);
    }

    pub fn push_archive_reply(&self, reply: Result<ArchivedHistory, TransportError>) {
        self.lock().archive_replies.push_back(reply);
    }

    /// 已收到的交互请求（含失败的尝试）
    pub fn requests(&self) -> Vec<Request> {
        self.lock().requests.clone()
    }

    pub fn archive_calls(&self) -> Vec<ArchiveCall> {
        self.lock().archive_calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn interact(&self, req: &Request) -> Result<Response, TransportError> {
        let reply = {
            let mut state = self.lock();
            state.requests.push(req.clone());
            state.replies.pop_front()
        };
        match reply {
            Some(MockReply::Respond(resp)) => Ok(resp),
            Some(MockReply::Fail(err)) => Err(err),
            Some(MockReply::Delay(pause, resp)) => {
                tokio::time::sleep(pause).await;
                Ok(resp)
            }
            None => Ok(Response::text("mock response")),
        }
    }

    async fn archive(
        &self,
        turns: &[Turn],
        existing_archive: &str,
    ) -> Result<ArchivedHistory, TransportError> {
        let mut state = self.lock();
        state.archive_calls.push(ArchiveCall {
            turns: turns.to_vec(),
            existing_archive: existing_archive.to_string(),
        });
        state.archive_replies.pop_front().unwrap_or_else(|| {
            Ok(ArchivedHistory {
                content: "archived".to_string(),
            })
        })
    }
}
