//! 引擎上下文：Player 的全部外部依赖（传输、任务执行器、知识库、重试与归档参数、后台任务）
//!
//! 由 EngineContextBuilder 组装后以 Arc 注入每个 Player；未配置的项使用默认值
//! （NotSetTransport、InlineTaskRunner、空知识库、内置常量）。

use std::sync::Arc;

use tokio_util::task::TaskTracker;

use crate::config::AppConfig;
use crate::core::{InlineTaskRunner, RetryPolicy, TaskRunner};
use crate::knowledge::KnowledgeBase;
use crate::transport::{NotSetTransport, Transport};

/// 交互参数：轮数上限与传输重试策略
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionSettings {
    pub max_turns: usize,
    pub retry: RetryPolicy,
}

impl Default for InteractionSettings {
    fn default() -> Self {
        Self {
            max_turns: 20,
            retry: RetryPolicy::interaction(),
        }
    }
}

/// 归档触发条件：历史不少于 min_history 轮，且至少保留最近 retain_turns 轮
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchivePolicy {
    pub min_history: usize,
    pub retain_turns: usize,
}

impl Default for ArchivePolicy {
    fn default() -> Self {
        Self {
            min_history: 30,
            retain_turns: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSettings {
    pub policy: ArchivePolicy,
    pub retry: RetryPolicy,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            policy: ArchivePolicy::default(),
            retry: RetryPolicy::archive(),
        }
    }
}

pub struct EngineContext {
    transport: Arc<dyn Transport>,
    task_runner: Arc<dyn TaskRunner>,
    knowledge_base: KnowledgeBase,
    interaction: InteractionSettings,
    archive: ArchiveSettings,
    background: TaskTracker,
}

impl EngineContext {
    pub fn builder() -> EngineContextBuilder {
        EngineContextBuilder::default()
    }

    /// 按配置文件参数构建（传输与执行器仍为默认值）
    pub fn from_config(config: &AppConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn task_runner(&self) -> &Arc<dyn TaskRunner> {
        &self.task_runner
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.knowledge_base
    }

    pub fn interaction(&self) -> &InteractionSettings {
        &self.interaction
    }

    pub fn archive(&self) -> &ArchiveSettings {
        &self.archive
    }

    /// 后台任务（归档）跟踪器
    pub fn background(&self) -> &TaskTracker {
        &self.background
    }

    /// 等待当前所有后台任务结束；之后仍可继续提交新任务
    pub async fn wait_background(&self) {
        self.background.close();
        self.background.wait().await;
        self.background.reopen();
    }
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("interaction", &self.interaction)
            .field("archive", &self.archive)
            .field("background_tasks", &self.background.len())
            .finish_non_exhaustive()
    }
}

/// EngineContext 构建器
#[derive(Default)]
pub struct EngineContextBuilder {
    transport: Option<Arc<dyn Transport>>,
    task_runner: Option<Arc<dyn TaskRunner>>,
    knowledge_base: Option<KnowledgeBase>,
    interaction: InteractionSettings,
    archive: ArchiveSettings,
}

impl EngineContextBuilder {
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn task_runner(mut self, runner: Arc<dyn TaskRunner>) -> Self {
        self.task_runner = Some(runner);
        self
    }

    pub fn knowledge_base(mut self, kb: KnowledgeBase) -> Self {
        self.knowledge_base = Some(kb);
        self
    }

    pub fn interaction(mut self, settings: InteractionSettings) -> Self {
        self.interaction = settings;
        self
    }

    pub fn archive(mut self, settings: ArchiveSettings) -> Self {
        self.archive = settings;
        self
    }

    /// 从 [interaction] / [archive] 配置段覆盖全部参数
    pub fn config(mut self, config: &AppConfig) -> Self {
        self.interaction = InteractionSettings {
            max_turns: config.interaction.max_turns,
            retry: config.interaction.retry_policy(),
        };
        self.archive = ArchiveSettings {
            policy: ArchivePolicy {
                min_history: config.archive.min_history,
                retain_turns: config.archive.retain_turns,
            },
            retry: config.archive.retry_policy(),
        };
        self
    }

    pub fn build(self) -> EngineContext {
        EngineContext {
            transport: self.transport.unwrap_or_else(|| Arc::new(NotSetTransport)),
            task_runner: self.task_runner.unwrap_or_else(|| Arc::new(InlineTaskRunner)),
            knowledge_base: self.knowledge_base.unwrap_or_default(),
            interaction: self.interaction,
            archive: self.archive,
            background: TaskTracker::new(),
        }
    }
}
