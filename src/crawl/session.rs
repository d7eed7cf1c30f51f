//! Session handles: the public handle returned from `start`, and the
//! registry entry `CrawlEngine` keeps internally to route `pause`/`resume`/
//! `stop` by session id (spec §5).

use tokio::sync::{mpsc, watch};

use crate::crawl::events::CrawlEvent;
use crate::crawl::types::{SessionControl, SessionStatus};
use crate::ids::{SessionId, TargetId};

/// Returned from [`crate::crawl::CrawlEngine::start`]. Consuming `events`
/// observes the session's trajectory; dropping it does not stop the
/// session — use `stop` for that.
pub struct CrawlSession {
    pub id: SessionId,
    pub target_id: TargetId,
    pub events: mpsc::UnboundedReceiver<CrawlEvent>,
}

/// What `CrawlEngine` keeps per running session to implement
/// `pause`/`resume`/`stop` and `status` queries.
pub(crate) struct SessionRegistryEntry {
    pub target_id: TargetId,
    pub control: watch::Sender<SessionControl>,
    pub status: watch::Receiver<SessionStatus>,
}
