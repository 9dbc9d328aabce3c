//! 交互层：单次 think 的主循环

pub mod loop_;

pub use loop_::{SequenceOutcome, ThinkSession};
