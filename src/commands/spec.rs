//! 命令描述与执行结果
//!
//! CommandSpec 在注册时由字段描述表一次性生成，随每个请求发给后端；
//! ParamKind 描述字段的目标类型，决定参数绑定时的转换规则与类型标签。

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// 可供后端调用的命令描述
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CommandSpec {
    /// 命令唯一名（如 "Move"）
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<CommandParamSpec>,
}

/// 命令参数描述
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CommandParamSpec {
    pub name: String,
    /// 类型标签，如 "string"、"int8"、"[]string"
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// 一次命令执行的结果
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_message: String,
    /// 处理器返回 Break，结束本次交互序列
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_break: bool,
}

impl CommandResult {
    pub fn success() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn broke() -> Self {
        Self {
            success: true,
            error_message: String::new(),
            is_break: true,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: message.into(),
            is_break: false,
        }
    }

    /// 将处理器返回值映射为结果：Ok → 成功；Break → 成功并结束；其它错误 → 失败并带消息
    pub fn from_handler(outcome: anyhow::Result<()>) -> Self {
        match outcome {
            Ok(()) => Self::success(),
            Err(err) if crate::core::is_break(&err) => Self::broke(),
            Err(err) => Self::failure(format!("{err:#}")),
        }
    }
}

/// 整数宽度（Size 对应平台 isize / usize）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
    Size,
}

impl IntWidth {
    fn suffix(self) -> &'static str {
        match self {
            IntWidth::W8 => "8",
            IntWidth::W16 => "16",
            IntWidth::W32 => "32",
            IntWidth::W64 => "64",
            IntWidth::Size => "",
        }
    }

    pub fn signed_range(self) -> (i64, i64) {
        match self {
            IntWidth::W8 => (i8::MIN.into(), i8::MAX.into()),
            IntWidth::W16 => (i16::MIN.into(), i16::MAX.into()),
            IntWidth::W32 => (i32::MIN.into(), i32::MAX.into()),
            IntWidth::W64 => (i64::MIN, i64::MAX),
            IntWidth::Size => (isize::MIN as i64, isize::MAX as i64),
        }
    }

    pub fn unsigned_max(self) -> u64 {
        match self {
            IntWidth::W8 => u8::MAX.into(),
            IntWidth::W16 => u16::MAX.into(),
            IntWidth::W32 => u32::MAX.into(),
            IntWidth::W64 => u64::MAX,
            IntWidth::Size => usize::MAX as u64,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FloatWidth {
    F32,
    F64,
}

/// 命令字段的目标类型
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamKind {
    Bool,
    Int(IntWidth),
    Uint(IntWidth),
    Float(FloatWidth),
    String,
    List(Box<ParamKind>),
    /// 可空字段（Option<T>）
    Optional(Box<ParamKind>),
    /// 任意 JSON 对象
    Map,
    /// 任意 JSON 值
    Any,
}

impl ParamKind {
    /// 发给后端的类型标签
    pub fn type_name(&self) -> String {
        match self {
            ParamKind::Bool => "bool".to_string(),
            ParamKind::Int(w) => format!("int{}", w.suffix()),
            ParamKind::Uint(w) => format!("uint{}", w.suffix()),
            ParamKind::Float(FloatWidth::F32) => "float32".to_string(),
            ParamKind::Float(FloatWidth::F64) => "float64".to_string(),
            ParamKind::String => "string".to_string(),
            ParamKind::List(elem) => format!("[]{}", elem.type_name()),
            ParamKind::Optional(inner) => format!("*{}", inner.type_name()),
            ParamKind::Map => "map[string]any".to_string(),
            ParamKind::Any => "any".to_string(),
        }
    }

    /// 是否接受 null
    pub fn is_nilable(&self) -> bool {
        matches!(
            self,
            ParamKind::Optional(_) | ParamKind::List(_) | ParamKind::Map | ParamKind::Any
        )
    }
}
