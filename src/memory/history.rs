//! 交互历史：按序追加的 Turn 列表 + 归档摘要
//!
//! 归档只移除最旧的一段连续前缀，且前缀终点必须是某个交互序列的首轮（is_initial），
//! 保证序列不被拆开；archive_in_progress 期间拒绝新的归档准备。

use crate::core::ArchivePolicy;
use crate::transport::Turn;

/// 一次归档的输入：待压缩的前缀副本与当前摘要
#[derive(Clone, Debug, PartialEq)]
pub struct ArchiveBatch {
    pub turns: Vec<Turn>,
    pub existing_archive: String,
}

#[derive(Clone, Debug, Default)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
    archived: String,
    archive_in_progress: bool,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_turns(turns: Vec<Turn>, archived: impl Into<String>) -> Self {
        Self {
            turns,
            archived: archived.into(),
            archive_in_progress: false,
        }
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// 独立副本，之后对历史的修改不会影响它
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    pub fn archived(&self) -> &str {
        &self.archived
    }

    pub fn is_archive_in_progress(&self) -> bool {
        self.archive_in_progress
    }

    /// 判断是否需要归档；需要时置 archive_in_progress 并返回前缀副本。
    ///
    /// 从 len - retain_turns 处向前找最近的首轮（下标 > 0）作为边界，
    /// 找不到则不归档。
    pub fn prepare_archive(&mut self, policy: &ArchivePolicy) -> Option<ArchiveBatch> {
        let len = self.turns.len();
        if len < policy.min_history || self.archive_in_progress || len <= policy.retain_turns {
            return None;
        }

        // retain_turns 为 0 时从最后一轮开始找
        let start = (len - policy.retain_turns).min(len - 1);
        let boundary = (1..=start).rev().find(|&i| self.turns[i].is_initial)?;

        self.archive_in_progress = true;
        Some(ArchiveBatch {
            turns: self.turns[..boundary].to_vec(),
            existing_archive: self.archived.clone(),
        })
    }

    /// 写入新摘要并丢弃最旧的 count 轮
    pub fn apply_archive(&mut self, summary: String, count: usize) {
        self.archived = summary;
        let count = count.min(self.turns.len());
        self.turns.drain(..count);
        self.archive_in_progress = false;
    }

    /// 放弃本次归档（可重复调用）
    pub fn cancel_archive(&mut self) {
        self.archive_in_progress = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn make_history(count: usize, initial_at: &[usize]) -> Vec<Turn> {
        (0..count)
            .map(|i| Turn {
                request_content: char::from(b'a' + (i % 26) as u8).to_string(),
                is_initial: initial_at.contains(&i),
                ..Turn::default()
            })
            .collect()
    }

    fn prepare(count: usize, initial_at: &[usize], archived: &str) -> (Option<ArchiveBatch>, ConversationHistory) {
        let mut history = ConversationHistory::with_turns(make_history(count, initial_at), archived);
        let batch = history.prepare_archive(&ArchivePolicy::default());
        (batch, history)
    }

    #[test]
    fn test_below_threshold() {
        let (batch, history) = prepare(20, &[0, 10], "previous");
        assert!(batch.is_none());
        assert!(!history.is_archive_in_progress());
    }

    #[test]
    fn test_already_in_progress() {
        let mut history = ConversationHistory::with_turns(make_history(35, &[0, 10, 20, 30]), "");
        history.archive_in_progress = true;
        assert!(history.prepare_archive(&ArchivePolicy::default()).is_none());
        assert!(history.is_archive_in_progress());
    }

    #[test]
    fn test_zero_retention_scans_from_last_turn() {
        let mut history = ConversationHistory::with_turns(make_history(30, &[0, 10, 20, 29]), "");
        let policy = ArchivePolicy {
            min_history: 30,
            retain_turns: 0,
        };
        let batch = history.prepare_archive(&policy).unwrap();
        assert_eq!(batch.turns.len(), 29);
        assert!(history.is_archive_in_progress());

        let mut single = ConversationHistory::with_turns(make_history(30, &[0]), "");
        assert!(single.prepare_archive(&policy).is_none());
        assert!(!single.is_archive_in_progress());
    }

    #[test]
    fn test_not_enough_to_retain() {
        let mut history = ConversationHistory::with_turns(make_history(15, &[0]), "");
        let policy = ArchivePolicy {
            min_history: 10,
            retain_turns: 15,
        };
        assert!(history.prepare_archive(&policy).is_none());
        assert!(!history.is_archive_in_progress());
    }

    #[test]
    fn test_no_sequence_boundary() {
        let (batch, history) = prepare(35, &[0], "");
        assert!(batch.is_none());
        assert!(!history.is_archive_in_progress());
    }

    #[test]
    fn test_single_boundary() {
        let (batch, history) = prepare(35, &[0, 10], "existing");
        let batch = batch.unwrap();
        assert_eq!(batch.turns.len(), 10);
        assert_eq!(batch.existing_archive, "existing");
        assert!(history.is_archive_in_progress());
    }

    #[test]
    fn test_boundary_at_retention_edge() {
        let (batch, history) = prepare(35, &[0, 10, 20, 30], "");
        let batch = batch.unwrap();
        assert_eq!(batch.turns.len(), 20);
        assert!(history.turns()[20].is_initial);
        assert_eq!(history.len() - batch.turns.len(), 15);
    }

    #[test]
    fn test_batch_does_not_alias_history() {
        let (batch, history) = prepare(35, &[0, 10], "");
        let mut batch = batch.unwrap();
        batch.turns[0].request_content = "modified".to_string();
        assert_eq!(history.turns()[0].request_content, "a");
    }

    #[test]
    fn test_complete_workflow() {
        let mut history = ConversationHistory::new();
        for i in 0..35 {
            history.push(Turn {
                request_content: format!("turn-{i}"),
                is_initial: i % 10 == 0,
                ..Turn::default()
            });
        }
        let policy = ArchivePolicy::default();

        let batch = history.prepare_archive(&policy).unwrap();
        assert_eq!(batch.existing_archive, "");
        assert!(history.is_archive_in_progress());

        let count = batch.turns.len();
        history.apply_archive("archived_content".to_string(), count);
        assert_eq!(history.archived(), "archived_content");
        assert_eq!(history.len(), 35 - count);
        assert_eq!(history.turns()[0].request_content, "turn-20");
        assert!(!history.is_archive_in_progress());

        assert!(history.prepare_archive(&policy).is_none());
    }

    #[test]
    fn test_apply_archive_counts() {
        let mut history = ConversationHistory::with_turns(make_history(5, &[]), "old");
        history.archive_in_progress = true;
        history.apply_archive("new".to_string(), 3);
        assert_eq!(history.len(), 2);
        assert_eq!(history.turns()[0].request_content, "d");
        assert_eq!(history.archived(), "new");
        assert!(!history.is_archive_in_progress());

        history.apply_archive("all".to_string(), 10);
        assert!(history.is_empty());

        let mut keep = ConversationHistory::with_turns(make_history(2, &[]), "unchanged");
        keep.apply_archive("empty".to_string(), 0);
        assert_eq!(keep.len(), 2);
        assert_eq!(keep.archived(), "empty");
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let (_, mut history) = prepare(35, &[0, 10], "");
        assert!(history.is_archive_in_progress());
        history.cancel_archive();
        history.cancel_archive();
        assert!(!history.is_archive_in_progress());
        assert_eq!(history.len(), 35);
    }

    #[test]
    fn test_concurrent_operations_keep_state_valid() {
        let history = Arc::new(Mutex::new(ConversationHistory::with_turns(
            make_history(40, &[0, 10, 20, 30]),
            "",
        )));

        let handles: Vec<_> = (0..3)
            .map(|n| {
                let history = history.clone();
                std::thread::spawn(move || {
                    if n == 1 {
                        let batch = history.lock().unwrap().prepare_archive(&ArchivePolicy::default());
                        if let Some(batch) = batch {
                            history
                                .lock()
                                .unwrap()
                                .apply_archive("concurrent_archive".to_string(), batch.turns.len());
                        }
                    } else {
                        history.lock().unwrap().push(Turn {
                            request_content: format!("concurrent{n}"),
                            ..Turn::default()
                        });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut history = history.lock().unwrap();
        history.cancel_archive();
        assert!(!history.is_archive_in_progress());
        assert!(history.turns().iter().all(|t| !t.request_content.is_empty()));
        assert_eq!(history.archived(), "concurrent_archive");
        assert_eq!(history.len(), 42 - 20);
    }
}
