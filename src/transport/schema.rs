//! 交互协议 JSON Schema 生成（schemars）
//!
//! 供后端实现方校验 Request / Response 结构，与 serde 序列化形状一致。

use schemars::schema_for;

use crate::transport::{ArchivedHistory, Request, Response};

/// 交互请求的 JSON Schema
pub fn request_schema_json() -> String {
    let schema = schema_for!(Request);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

/// 交互响应的 JSON Schema
pub fn response_schema_json() -> String {
    let schema = schema_for!(Response);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

pub fn archived_history_schema_json() -> String {
    let schema = schema_for!(ArchivedHistory);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
