//! 与后端交换的数据结构（JSON 形状，字段 camelCase）

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::commands::{CommandResult, CommandSpec};

/// 松散类型的上下文 / 参数表
pub type ContextMap = Map<String, Value>;

/// 一次交互请求
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// 用户输入；续轮时为空
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextMap>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_context: Option<ContextMap>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub knowledge_base: ContextMap,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command_specs: Vec<CommandSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_command_result: Option<CommandResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<Turn>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub archived_history: String,
    /// 0 表示序列首轮（来自用户输入），>0 表示后端基于命令结果继续
    #[serde(default, skip_serializing_if = "is_zero")]
    pub continuation_turn: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

/// 后端响应；command_name 为空表示本序列结束
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_args: Option<ContextMap>,
}

impl Response {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn command(name: impl Into<String>, args: Value) -> Self {
        let command_args = match args {
            Value::Object(map) => Some(map),
            _ => None,
        };
        Self {
            text: String::new(),
            command_name: name.into(),
            command_args,
        }
    }
}

/// 历史中的一轮交换
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub request_content: String,
    #[serde(default, rename = "context", skip_serializing_if = "Option::is_none")]
    pub request_context: Option<ContextMap>,
    #[serde(default)]
    pub response_text: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub response_command_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_command_args: Option<ContextMap>,
    /// 本轮命令的执行结果；无命令时为 None
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_command_result: Option<CommandResult>,
    /// 是否为交互序列的首轮（continuation_turn == 0）
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_initial: bool,
}

/// 归档结果：压缩后的摘要
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ArchivedHistory {
    pub content: String,
}
