//! Long-running adaptive crawl sessions: fetch, observe, score, consult the
//! advisor, mutate DNA, and repeat, one session per target (spec §4.5).

pub mod challenge;
pub mod engine;
pub mod events;
pub mod goal;
pub mod http;
pub mod session;
pub mod types;

pub use engine::CrawlEngine;
pub use events::{CrawlEvent, CrawlEventType};
pub use session::CrawlSession;
pub use types::{CrawlMode, CrawlRequest, SessionStatus, StopReason};
