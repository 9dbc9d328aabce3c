//! 共享知识库：随每个请求发给后端的键值表
//!
//! 由 EngineContext 持有，多个 Player 共享；每轮交互开始时读取一次快照。

use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

use crate::transport::ContextMap;

#[derive(Clone, Debug, Default)]
pub struct KnowledgeBase {
    inner: Arc<RwLock<ContextMap>>,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: ContextMap) -> Self {
        Self {
            inner: Arc::new(RwLock::new(map)),
        }
    }

    /// 整体替换
    pub fn set(&self, map: ContextMap) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = map;
    }

    pub fn insert(&self, key: impl Into<String>, value: Value) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value);
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    /// 当前内容的独立副本
    pub fn snapshot(&self) -> ContextMap {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
