//! 命令层：命令描述、参数绑定与注册表

pub mod binding;
pub mod registry;
pub mod spec;

pub use binding::{convert_field, convert_value, BoundArgs, FieldSpec, ParamType, ParamValue};
pub use registry::{Command, CommandRegistry, RegisteredCommand};
pub use spec::{CommandParamSpec, CommandResult, CommandSpec, FloatWidth, IntWidth, ParamKind};
