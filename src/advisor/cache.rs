//! Process-wide, context-digest-keyed cache for advisor responses (spec
//! §4.4: "an optional short-TTL (5 min) cache ... is permitted"). Stale
//! entries are harmless since they're never the only source of truth.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::advisor::types::{AdvisorResponse, Context};

struct Entry {
    response: AdvisorResponse,
    cached_at: DateTime<Utc>,
}

pub struct AdvisorCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, Entry>>,
}

impl AdvisorCache {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_secs),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Default 5 minute TTL per spec.
    pub fn with_default_ttl() -> Self {
        Self::new(300)
    }

    /// A stable digest of the context, used as the cache key. Field order
    /// in `Context`'s `Serialize` impl is stable, so equal contexts always
    /// hash equal.
    pub fn digest(context: &Context) -> String {
        let json = serde_json::to_vec(context).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&json);
        format!("{:x}", hasher.finalize())
    }

    pub fn get(&self, digest: &str) -> Option<AdvisorResponse> {
        let entries = self.entries.read().expect("cache lock poisoned");
        let entry = entries.get(digest)?;
        if Utc::now() - entry.cached_at > self.ttl {
            return None;
        }
        Some(entry.response.clone())
    }

    pub fn put(&self, digest: String, response: AdvisorResponse) {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        entries.insert(
            digest,
            Entry {
                response,
                cached_at: Utc::now(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_context() -> Context {
        Context {
            target_summary: "example.com, learning".to_string(),
            dna: crate::dna::Dna::default(),
            observations: vec![],
            learning_events: vec![],
            current_challenge: None,
            last_request: None,
        }
    }

    fn sample_response() -> AdvisorResponse {
        AdvisorResponse {
            mutations: vec![],
            trust_status: None,
            strategy: None,
            mock: true,
        }
    }

    #[test]
    fn identical_contexts_digest_identically() {
        let a = AdvisorCache::digest(&sample_context());
        let b = AdvisorCache::digest(&sample_context());
        assert_eq!(a, b);
    }

    #[test]
    fn hits_within_ttl() {
        let cache = AdvisorCache::new(300);
        let digest = AdvisorCache::digest(&sample_context());
        cache.put(digest.clone(), sample_response());
        assert!(cache.get(&digest).is_some());
    }

    #[test]
    fn misses_after_expiry() {
        let cache = AdvisorCache::new(-1);
        let digest = AdvisorCache::digest(&sample_context());
        cache.put(digest.clone(), sample_response());
        assert!(cache.get(&digest).is_none());
    }
}
