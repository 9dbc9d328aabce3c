//! 参数绑定：把后端传来的松散 JSON 参数转为命令字段的强类型值
//!
//! 每个命令在注册时给出字段描述表（FieldSpec：名称 + ParamKind + 说明），绑定时按表逐字段转换：
//! 1. 类型已一致则直接赋值（整数按目标宽度做范围检查）
//! 2. 浮点 → 整数：向零截断，超出范围报溢出，负数写入无符号报错
//! 3. 数组 → 列表：逐元素递归转换，null 元素报错并给出下标
//! 4. 其它可转换情形（整数 → 浮点、任意值 → Any）直接转换
//! 5. null 仅可写入可空字段（Option / 列表 / Map / Any）
//! 6. 以上皆不满足则报类型不匹配
//!
//! 缺失字段保持零值，未知键忽略，不在描述表中的字段永远不会被写入。

use std::collections::HashMap;

use serde_json::{Map, Number, Value};

use crate::commands::{FloatWidth, IntWidth, ParamKind};
use crate::core::BindError;

/// 转换后的参数值（已满足对应 ParamKind 的范围约束）
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    List(Vec<ParamValue>),
    Map(Map<String, Value>),
    Any(Value),
}

impl ParamValue {
    fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Null => "nil",
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int64",
            ParamValue::Uint(_) => "uint64",
            ParamValue::Float(_) => "float64",
            ParamValue::Str(_) => "string",
            ParamValue::List(_) => "[]any",
            ParamValue::Map(_) => "map[string]any",
            ParamValue::Any(_) => "any",
        }
    }
}

/// JSON 值的类型名（用于类型不匹配错误）
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "nil",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_i64() => "int64",
        Value::Number(n) if n.is_u64() => "uint64",
        Value::Number(_) => "float64",
        Value::String(_) => "string",
        Value::Array(_) => "[]any",
        Value::Object(_) => "map[string]any",
    }
}

fn mismatch(value: &Value, kind: &ParamKind) -> BindError {
    BindError::TypeMismatch {
        got: json_type_name(value).to_string(),
        want: kind.type_name(),
    }
}

/// 转换一个顶层字段；null 只允许写入可空字段
pub fn convert_field(name: &str, value: &Value, kind: &ParamKind) -> Result<ParamValue, BindError> {
    if value.is_null() {
        return if kind.is_nilable() {
            Ok(ParamValue::Null)
        } else {
            Err(BindError::NilNotAllowed(name.to_string()))
        };
    }
    convert_value(value, kind)
}

/// 按目标类型转换单个值
pub fn convert_value(value: &Value, kind: &ParamKind) -> Result<ParamValue, BindError> {
    match kind {
        ParamKind::Any => Ok(ParamValue::Any(value.clone())),
        ParamKind::Optional(inner) => match value {
            Value::Null => Ok(ParamValue::Null),
            other => convert_value(other, inner),
        },
        ParamKind::Bool => value.as_bool().map(ParamValue::Bool).ok_or_else(|| mismatch(value, kind)),
        ParamKind::String => value
            .as_str()
            .map(|s| ParamValue::Str(s.to_string()))
            .ok_or_else(|| mismatch(value, kind)),
        ParamKind::Int(width) => match value {
            Value::Number(n) => number_to_int(n, *width),
            _ => Err(mismatch(value, kind)),
        },
        ParamKind::Uint(width) => match value {
            Value::Number(n) => number_to_uint(n, *width),
            _ => Err(mismatch(value, kind)),
        },
        ParamKind::Float(width) => match value.as_f64() {
            Some(f) if *width == FloatWidth::F32 => Ok(ParamValue::Float(f64::from(f as f32))),
            Some(f) => Ok(ParamValue::Float(f)),
            None => Err(mismatch(value, kind)),
        },
        ParamKind::Map => match value {
            Value::Object(map) => Ok(ParamValue::Map(map.clone())),
            _ => Err(mismatch(value, kind)),
        },
        ParamKind::List(elem) => match value {
            Value::Array(items) => convert_list(items, elem),
            _ => Err(mismatch(value, kind)),
        },
    }
}

fn convert_list(items: &[Value], elem: &ParamKind) -> Result<ParamValue, BindError> {
    let mut out = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        if item.is_null() {
            return Err(BindError::NilElement(index));
        }
        let converted = convert_value(item, elem).map_err(|source| BindError::Element {
            index,
            source: Box::new(source),
        })?;
        out.push(converted);
    }
    Ok(ParamValue::List(out))
}

const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;

fn overflow(value: impl ToString, target: String) -> BindError {
    BindError::Overflow {
        value: value.to_string(),
        target,
    }
}

fn number_to_int(n: &Number, width: IntWidth) -> Result<ParamValue, BindError> {
    let target = ParamKind::Int(width).type_name();
    let (min, max) = width.signed_range();
    if let Some(i) = n.as_i64() {
        return if (min..=max).contains(&i) {
            Ok(ParamValue::Int(i))
        } else {
            Err(overflow(i, target))
        };
    }
    if let Some(u) = n.as_u64() {
        return Err(overflow(u, target));
    }
    let f = n.as_f64().unwrap_or(f64::NAN);
    let truncated = f.trunc();
    if !(-TWO_POW_63..TWO_POW_63).contains(&truncated) {
        return Err(overflow(f, target));
    }
    let i = truncated as i64;
    if !(min..=max).contains(&i) {
        return Err(overflow(f, target));
    }
    Ok(ParamValue::Int(i))
}

fn number_to_uint(n: &Number, width: IntWidth) -> Result<ParamValue, BindError> {
    let target = ParamKind::Uint(width).type_name();
    let max = width.unsigned_max();
    if let Some(u) = n.as_u64() {
        return if u <= max {
            Ok(ParamValue::Uint(u))
        } else {
            Err(overflow(u, target))
        };
    }
    if let Some(i) = n.as_i64() {
        return Err(BindError::NegativeToUnsigned(i.to_string()));
    }
    let f = n.as_f64().unwrap_or(f64::NAN);
    if f < 0.0 {
        return Err(BindError::NegativeToUnsigned(f.to_string()));
    }
    let truncated = f.trunc();
    if !(0.0..TWO_POW_64).contains(&truncated) {
        return Err(overflow(f, target));
    }
    let u = truncated as u64;
    if u > max {
        return Err(overflow(f, target));
    }
    Ok(ParamValue::Uint(u))
}

/// 可作为命令字段的 Rust 类型：声明自己的 ParamKind，并从转换后的 ParamValue 取值
pub trait ParamType: Default + Sized + Send + 'static {
    fn kind() -> ParamKind;

    fn from_param(value: ParamValue) -> Result<Self, BindError>;
}

fn unexpected<T: ParamType>(value: &ParamValue) -> BindError {
    BindError::TypeMismatch {
        got: value.type_name().to_string(),
        want: T::kind().type_name(),
    }
}

macro_rules! impl_int_param {
    ($($ty:ty => $kind:expr),* $(,)?) => {
        $(
            impl ParamType for $ty {
                fn kind() -> ParamKind {
                    $kind
                }

                fn from_param(value: ParamValue) -> Result<Self, BindError> {
                    match value {
                        ParamValue::Int(i) => <$ty>::try_from(i)
                            .map_err(|_| overflow(i, Self::kind().type_name())),
                        ParamValue::Uint(u) => <$ty>::try_from(u)
                            .map_err(|_| overflow(u, Self::kind().type_name())),
                        other => Err(unexpected::<Self>(&other)),
                    }
                }
            }
        )*
    };
}

impl_int_param! {
    i8 => ParamKind::Int(IntWidth::W8),
    i16 => ParamKind::Int(IntWidth::W16),
    i32 => ParamKind::Int(IntWidth::W32),
    i64 => ParamKind::Int(IntWidth::W64),
    isize => ParamKind::Int(IntWidth::Size),
    u8 => ParamKind::Uint(IntWidth::W8),
    u16 => ParamKind::Uint(IntWidth::W16),
    u32 => ParamKind::Uint(IntWidth::W32),
    u64 => ParamKind::Uint(IntWidth::W64),
    usize => ParamKind::Uint(IntWidth::Size),
}

impl ParamType for f64 {
    fn kind() -> ParamKind {
        ParamKind::Float(FloatWidth::F64)
    }

    fn from_param(value: ParamValue) -> Result<Self, BindError> {
        match value {
            ParamValue::Float(f) => Ok(f),
            other => Err(unexpected::<Self>(&other)),
        }
    }
}

impl ParamType for f32 {
    fn kind() -> ParamKind {
        ParamKind::Float(FloatWidth::F32)
    }

    fn from_param(value: ParamValue) -> Result<Self, BindError> {
        match value {
            ParamValue::Float(f) => Ok(f as f32),
            other => Err(unexpected::<Self>(&other)),
        }
    }
}

impl ParamType for bool {
    fn kind() -> ParamKind {
        ParamKind::Bool
    }

    fn from_param(value: ParamValue) -> Result<Self, BindError> {
        match value {
            ParamValue::Bool(b) => Ok(b),
            other => Err(unexpected::<Self>(&other)),
        }
    }
}

impl ParamType for String {
    fn kind() -> ParamKind {
        ParamKind::String
    }

    fn from_param(value: ParamValue) -> Result<Self, BindError> {
        match value {
            ParamValue::Str(s) => Ok(s),
            other => Err(unexpected::<Self>(&other)),
        }
    }
}

impl<T: ParamType> ParamType for Vec<T> {
    fn kind() -> ParamKind {
        ParamKind::List(Box::new(T::kind()))
    }

    fn from_param(value: ParamValue) -> Result<Self, BindError> {
        match value {
            ParamValue::Null => Ok(Vec::new()),
            ParamValue::List(items) => items.into_iter().map(T::from_param).collect(),
            other => Err(unexpected::<Self>(&other)),
        }
    }
}

impl<T: ParamType> ParamType for Option<T> {
    fn kind() -> ParamKind {
        ParamKind::Optional(Box::new(T::kind()))
    }

    fn from_param(value: ParamValue) -> Result<Self, BindError> {
        match value {
            ParamValue::Null => Ok(None),
            other => T::from_param(other).map(Some),
        }
    }
}

impl ParamType for Value {
    fn kind() -> ParamKind {
        ParamKind::Any
    }

    fn from_param(value: ParamValue) -> Result<Self, BindError> {
        match value {
            ParamValue::Null => Ok(Value::Null),
            ParamValue::Any(v) => Ok(v),
            other => Err(unexpected::<Self>(&other)),
        }
    }
}

impl ParamType for Map<String, Value> {
    fn kind() -> ParamKind {
        ParamKind::Map
    }

    fn from_param(value: ParamValue) -> Result<Self, BindError> {
        match value {
            ParamValue::Null => Ok(Map::new()),
            ParamValue::Map(m) => Ok(m),
            other => Err(unexpected::<Self>(&other)),
        }
    }
}

/// 字段描述：参数名、目标类型、可选说明
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub description: Option<&'static str>,
}

impl FieldSpec {
    pub fn of<T: ParamType>(name: &'static str) -> Self {
        Self {
            name,
            kind: T::kind(),
            description: None,
        }
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }
}

/// 按描述表转换后的参数集合，命令实现从中按名取值
#[derive(Debug, Default)]
pub struct BoundArgs {
    values: HashMap<&'static str, ParamValue>,
}

impl BoundArgs {
    /// 按字段描述表转换 args；缺失字段跳过，未知键忽略
    pub fn bind(fields: &[FieldSpec], args: Option<&Map<String, Value>>) -> Result<Self, BindError> {
        let mut values = HashMap::new();
        let Some(args) = args else {
            return Ok(Self { values });
        };
        for field in fields {
            let Some(raw) = args.get(field.name) else {
                continue;
            };
            let converted = convert_field(field.name, raw, &field.kind).map_err(|source| {
                BindError::Field {
                    field: field.name.to_string(),
                    source: Box::new(source),
                }
            })?;
            values.insert(field.name, converted);
        }
        Ok(Self { values })
    }

    /// 取出字段值；未提供时返回零值
    pub fn take<T: ParamType>(&mut self, name: &str) -> Result<T, BindError> {
        match self.values.remove(name) {
            None => Ok(T::default()),
            Some(value) => T::from_param(value).map_err(|source| BindError::Field {
                field: name.to_string(),
                source: Box::new(source),
            }),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}
