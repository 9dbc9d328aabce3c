//! 命令注册表
//!
//! 所有命令参数结构实现 Command trait（名称 / 描述 / 字段描述表 / 从 BoundArgs 构造），
//! 由 CommandRegistry 按名注册与查找；调用时先按描述表绑定参数，再经 TaskRunner 在宿主上下文执行处理器，
//! 每次调用输出结构化审计日志（JSON）。

use std::collections::{BTreeMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};
use tokio::sync::oneshot;

use crate::commands::{BoundArgs, CommandParamSpec, CommandResult, CommandSpec, FieldSpec};
use crate::core::task_runner::{is_abort_signal, panic_message};
use crate::core::{BindError, CommandError, TaskRunner};

/// 命令参数结构：命令名即结构名，字段通过 fields() 显式声明
pub trait Command: Sized + Send + 'static {
    /// 命令名（必须非空）
    const NAME: &'static str;

    /// 命令说明；未提供时为 "Command <NAME>"
    fn description() -> Option<String> {
        None
    }

    /// 字段描述表（参数名、类型、说明），注册时读取一次
    fn fields() -> Vec<FieldSpec>;

    /// 从已转换的参数构造命令；未提供的字段取零值
    fn bind(args: &mut BoundArgs) -> Result<Self, BindError>;
}

type HandlerThunk = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;
type ErasedHandler = Arc<dyn Fn(BoundArgs) -> Result<HandlerThunk, BindError> + Send + Sync>;

/// 已注册的命令：描述、字段表与类型擦除后的处理器
#[derive(Clone)]
pub struct RegisteredCommand {
    spec: CommandSpec,
    fields: Arc<[FieldSpec]>,
    handler: ErasedHandler,
}

enum HandlerOutcome {
    Returned(anyhow::Result<()>),
    Aborted,
    Panicked(String),
}

impl RegisteredCommand {
    fn new<T, F>(handler: F) -> Self
    where
        T: Command,
        F: Fn(T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        assert!(!T::NAME.is_empty(), "AI command struct must have a name");
        let fields = T::fields();
        let mut seen = HashSet::new();
        for field in &fields {
            assert!(
                seen.insert(field.name),
                "AI command {} declares field {} twice",
                T::NAME,
                field.name
            );
        }

        let handler = Arc::new(handler);
        let erased: ErasedHandler = Arc::new(move |mut args: BoundArgs| {
            let cmd = T::bind(&mut args)?;
            let handler = Arc::clone(&handler);
            let thunk: HandlerThunk = Box::new(move || handler(cmd));
            Ok(thunk)
        });

        Self {
            spec: extract_command_spec::<T>(&fields),
            fields: fields.into(),
            handler: erased,
        }
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// 绑定参数并经 runner 执行处理器。
    ///
    /// 绑定失败、处理器 panic 或 runner 丢弃任务时返回 Err（中止本次 think）；
    /// 处理器自身返回的错误只体现在 CommandResult 中。
    pub async fn invoke(
        &self,
        runner: &dyn TaskRunner,
        args: Option<&Map<String, Value>>,
    ) -> Result<CommandResult, CommandError> {
        let start = Instant::now();
        let thunk = BoundArgs::bind(&self.fields, args)
            .and_then(|bound| (self.handler)(bound))
            .map_err(|source| CommandError::Bind {
                command: self.spec.name.clone(),
                source,
            })?;

        let (tx, rx) = oneshot::channel();
        runner.execute(Box::new(move || {
            let outcome = match panic::catch_unwind(AssertUnwindSafe(thunk)) {
                Ok(returned) => HandlerOutcome::Returned(returned),
                Err(payload) if is_abort_signal(payload.as_ref()) => HandlerOutcome::Aborted,
                Err(payload) => HandlerOutcome::Panicked(panic_message(payload.as_ref())),
            };
            let _ = tx.send(outcome);
        }));

        let (result, outcome_label) = match rx.await {
            Ok(HandlerOutcome::Returned(returned)) => {
                let result = CommandResult::from_handler(returned);
                let label = if result.is_break {
                    "break"
                } else if result.success {
                    "ok"
                } else {
                    "error"
                };
                (Ok(result), label)
            }
            Ok(HandlerOutcome::Aborted) => (Ok(CommandResult::success()), "aborted"),
            Ok(HandlerOutcome::Panicked(message)) => (
                Err(CommandError::Panicked {
                    command: self.spec.name.clone(),
                    message,
                }),
                "panic",
            ),
            Err(_) => (Err(CommandError::Dropped(self.spec.name.clone())), "dropped"),
        };

        let audit = serde_json::json!({
            "event": "command_audit",
            "command": self.spec.name,
            "outcome": outcome_label,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(args),
        });
        tracing::info!(audit = %audit, "command");

        result
    }
}

impl std::fmt::Debug for RegisteredCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredCommand")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

/// 由字段描述表生成 CommandSpec
fn extract_command_spec<T: Command>(fields: &[FieldSpec]) -> CommandSpec {
    CommandSpec {
        name: T::NAME.to_string(),
        description: T::description().unwrap_or_else(|| format!("Command {}", T::NAME)),
        parameters: fields
            .iter()
            .map(|field| CommandParamSpec {
                name: field.name.to_string(),
                type_name: field.kind.type_name(),
                description: field.description.unwrap_or_default().to_string(),
            })
            .collect(),
    }
}

fn args_preview(args: Option<&Map<String, Value>>) -> String {
    let s = args.map(|m| Value::Object(m.clone()).to_string()).unwrap_or_default();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

/// 命令注册表：按名称有序存储，同名注册覆盖旧值
#[derive(Clone, Debug, Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, RegisteredCommand>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册命令 T 的处理器；T::NAME 为空或字段重名时 panic
    pub fn register<T, F>(&mut self, handler: F)
    where
        T: Command,
        F: Fn(T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let command = RegisteredCommand::new::<T, F>(handler);
        tracing::debug!(command = T::NAME, params = command.spec.parameters.len(), "registered command");
        self.commands.insert(T::NAME.to_string(), command);
    }

    pub fn get(&self, name: &str) -> Option<RegisteredCommand> {
        self.commands.get(name).cloned()
    }

    pub fn specs(&self) -> Vec<CommandSpec> {
        self.commands.values().map(|c| c.spec.clone()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.commands.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Break, InlineTaskRunner};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Move {
        direction: String,
        steps: i8,
    }

    impl Command for Move {
        const NAME: &'static str = "Move";

        fn fields() -> Vec<FieldSpec> {
            vec![
                FieldSpec::of::<String>("Direction").describe("up, down, left or right"),
                FieldSpec::of::<i8>("Steps"),
            ]
        }

        fn bind(args: &mut BoundArgs) -> Result<Self, BindError> {
            Ok(Self {
                direction: args.take("Direction")?,
                steps: args.take("Steps")?,
            })
        }
    }

    struct Say {
        words: Vec<String>,
    }

    impl Command for Say {
        const NAME: &'static str = "Say";

        fn description() -> Option<String> {
            Some("Say something out loud".to_string())
        }

        fn fields() -> Vec<FieldSpec> {
            vec![FieldSpec::of::<Vec<String>>("Words")]
        }

        fn bind(args: &mut BoundArgs) -> Result<Self, BindError> {
            Ok(Self {
                words: args.take("Words")?,
            })
        }
    }

    struct Nameless;

    impl Command for Nameless {
        const NAME: &'static str = "";

        fn fields() -> Vec<FieldSpec> {
            Vec::new()
        }

        fn bind(_args: &mut BoundArgs) -> Result<Self, BindError> {
            Ok(Self)
        }
    }

    struct Twice;

    impl Command for Twice {
        const NAME: &'static str = "Twice";

        fn fields() -> Vec<FieldSpec> {
            vec![FieldSpec::of::<i32>("X"), FieldSpec::of::<String>("X")]
        }

        fn bind(_args: &mut BoundArgs) -> Result<Self, BindError> {
            Ok(Self)
        }
    }

    #[test]
    fn test_spec_extraction() {
        let mut registry = CommandRegistry::new();
        registry.register::<Move, _>(|_| Ok(()));
        registry.register::<Say, _>(|_| Ok(()));

        let specs = registry.specs();
        assert_eq!(specs.len(), 2);
        let mv = registry.get("Move").unwrap();
        assert_eq!(mv.spec().description, "Command Move");
        assert_eq!(mv.spec().parameters[0].name, "Direction");
        assert_eq!(mv.spec().parameters[0].type_name, "string");
        assert_eq!(mv.spec().parameters[0].description, "up, down, left or right");
        assert_eq!(mv.spec().parameters[1].type_name, "int8");

        let say = registry.get("Say").unwrap();
        assert_eq!(say.spec().description, "Say something out loud");
        assert_eq!(say.spec().parameters[0].type_name, "[]string");
    }

    #[test]
    #[should_panic(expected = "must have a name")]
    fn test_register_nameless_panics() {
        CommandRegistry::new().register::<Nameless, _>(|_| Ok(()));
    }

    #[test]
    #[should_panic(expected = "declares field X twice")]
    fn test_register_duplicate_field_panics() {
        CommandRegistry::new().register::<Twice, _>(|_| Ok(()));
    }

    #[test]
    fn test_reregister_replaces() {
        let mut registry = CommandRegistry::new();
        registry.register::<Move, _>(|_| Ok(()));
        registry.register::<Move, _>(|_| Err(anyhow::anyhow!("second")));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.names(), vec!["Move".to_string()]);
    }

    #[tokio::test]
    async fn test_invoke_binds_and_succeeds() {
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let mut registry = CommandRegistry::new();
        registry.register::<Move, _>(move |cmd| {
            *sink.lock().unwrap() = Some(cmd);
            Ok(())
        });

        let args = json!({"Direction": "up", "Steps": 5});
        let result = registry
            .get("Move")
            .unwrap()
            .invoke(&InlineTaskRunner, args.as_object())
            .await
            .unwrap();
        assert_eq!(result, CommandResult::success());
        assert_eq!(
            seen.lock().unwrap().clone(),
            Some(Move {
                direction: "up".to_string(),
                steps: 5
            })
        );
    }

    #[tokio::test]
    async fn test_invoke_without_args_uses_zero_values() {
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let mut registry = CommandRegistry::new();
        registry.register::<Move, _>(move |cmd| {
            *sink.lock().unwrap() = Some(cmd);
            Ok(())
        });
        registry.get("Move").unwrap().invoke(&InlineTaskRunner, None).await.unwrap();
        assert_eq!(seen.lock().unwrap().clone(), Some(Move::default()));
    }

    #[tokio::test]
    async fn test_invoke_outcome_mapping() {
        let mut registry = CommandRegistry::new();
        registry.register::<Say, _>(|cmd| match cmd.words.first().map(String::as_str) {
            Some("stop") => Err(Break.into()),
            Some("fail") => Err(anyhow::anyhow!("cannot say that")),
            _ => Ok(()),
        });
        let say = registry.get("Say").unwrap();

        let stop = json!({"Words": ["stop"]});
        let result = say.invoke(&InlineTaskRunner, stop.as_object()).await.unwrap();
        assert_eq!(result, CommandResult::broke());

        let fail = json!({"Words": ["fail"]});
        let result = say.invoke(&InlineTaskRunner, fail.as_object()).await.unwrap();
        assert_eq!(result, CommandResult::failure("cannot say that"));
    }

    #[tokio::test]
    async fn test_invoke_bind_error() {
        let mut registry = CommandRegistry::new();
        registry.register::<Move, _>(|_| Ok(()));
        let args = json!({"Steps": 300.0});
        let err = registry
            .get("Move")
            .unwrap()
            .invoke(&InlineTaskRunner, args.as_object())
            .await
            .unwrap_err();
        match err {
            CommandError::Bind { command, source } => {
                assert_eq!(command, "Move");
                assert!(matches!(source.root(), BindError::Overflow { .. }));
            }
            other => panic!("Expected Bind error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invoke_panic_recovered() {
        let mut registry = CommandRegistry::new();
        registry.register::<Move, _>(|_| panic!("wall collapsed"));
        let err = registry
            .get("Move")
            .unwrap()
            .invoke(&InlineTaskRunner, None)
            .await
            .unwrap_err();
        match err {
            CommandError::Panicked { message, .. } => assert_eq!(message, "wall collapsed"),
            other => panic!("Expected Panicked, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invoke_abort_signal_swallowed() {
        let mut registry = CommandRegistry::new();
        registry.register::<Move, _>(|_| crate::core::abort_current_task());
        let result = registry
            .get("Move")
            .unwrap()
            .invoke(&InlineTaskRunner, None)
            .await
            .unwrap();
        assert!(result.success);
    }

    struct DroppingRunner;

    impl TaskRunner for DroppingRunner {
        fn execute(&self, _task: crate::core::Task) {}
    }

    #[tokio::test]
    async fn test_invoke_dropped_by_runner() {
        let mut registry = CommandRegistry::new();
        registry.register::<Move, _>(|_| Ok(()));
        let err = registry
            .get("Move")
            .unwrap()
            .invoke(&DroppingRunner, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Dropped(_)));
    }
}
