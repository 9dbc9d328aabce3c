//! 传输层：Transport 抽象、交互数据结构、限流协调与 Mock 实现

pub mod mock;
pub mod rate_limit;
pub mod schema;
pub mod traits;
pub mod wire;

pub use mock::{ArchiveCall, MockReply, MockTransport};
pub use rate_limit::{retry_after_from_header, RateLimitGate};
pub use schema::{archived_history_schema_json, request_schema_json, response_schema_json};
pub use traits::{NotSetTransport, Transport};
pub use wire::{ArchivedHistory, ContextMap, Request, Response, Turn};
