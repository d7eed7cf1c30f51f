//! Short-lived in-memory cache for the latest [`GreenLightState`] per
//! target (spec §4.1: "typical TTL 30s — it is a cache, never
//! authoritative"). Grounded on `rlm-core::llm::cache`'s TTL-expiry shape,
//! generalized from prompt-cache entries to green-light snapshots.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::ids::TargetId;
use crate::store::types::GreenLightState;

struct CacheEntry {
    state: GreenLightState,
    cached_at: DateTime<Utc>,
}

/// Per-target TTL cache. Never the source of truth — a miss or a stale
/// entry always falls back to a store read.
pub struct GreenLightCache {
    ttl: Duration,
    entries: RwLock<HashMap<TargetId, CacheEntry>>,
}

impl GreenLightCache {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_secs),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Default 30s TTL per spec.
    pub fn with_default_ttl() -> Self {
        Self::new(30)
    }

    pub fn put(&self, state: GreenLightState) {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        entries.insert(
            state.target_id,
            CacheEntry {
                state,
                cached_at: Utc::now(),
            },
        );
    }

    /// Returns a fresh cached state, or `None` on a miss or expiry.
    pub fn get(&self, target_id: TargetId) -> Option<GreenLightState> {
        let entries = self.entries.read().expect("cache lock poisoned");
        let entry = entries.get(&target_id)?;
        if Utc::now() - entry.cached_at > self.ttl {
            return None;
        }
        Some(entry.state.clone())
    }

    pub fn invalidate(&self, target_id: TargetId) {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        entries.remove(&target_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::GreenLightStatus;
    use crate::ids::GreenLightStateId;
    use serde_json::json;

    fn sample_state(target_id: TargetId) -> GreenLightState {
        GreenLightState {
            id: GreenLightStateId::new(),
            target_id,
            status: GreenLightStatus::Yellow,
            trust_score: 40,
            signals: json!({}),
            established_at: None,
            maintained_for: 0,
            lost_at: None,
            reason_lost: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn hits_within_ttl() {
        let cache = GreenLightCache::new(30);
        let target_id = TargetId::new();
        cache.put(sample_state(target_id));
        assert!(cache.get(target_id).is_some());
    }

    #[test]
    fn misses_after_expiry() {
        let cache = GreenLightCache::new(-1);
        let target_id = TargetId::new();
        cache.put(sample_state(target_id));
        assert!(cache.get(target_id).is_none());
    }

    #[test]
    fn misses_unknown_target() {
        let cache = GreenLightCache::with_default_ttl();
        assert!(cache.get(TargetId::new()).is_none());
    }
}
