//! 记忆层：交互历史、归档准备与后台归档执行

pub mod archiver;
pub mod history;

pub use archiver::spawn_archive;
pub use history::{ArchiveBatch, ConversationHistory};
