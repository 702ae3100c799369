//! TTL cache for idempotent REST reads.
//!
//! Entries are keyed by a request fingerprint (verb + path + sorted query). Expired entries are
//! dropped lazily on lookup; there is no background sweep.
//!
//! Every invalidation bumps a generation counter. A read captures the generation before it is
//! sent and stores its result with [`ResponseCache::put_if_current`], which refuses the store if
//! any write invalidated the cache in between.

use crate::gateway::encode_query_component;
use crate::semantics::Verb;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry {
    path: String,
    expires_at: Instant,
    value: Value,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    generation: u64,
}

#[derive(Clone)]
pub struct ResponseCache {
    ttl: Duration,
    inner: Arc<RwLock<CacheState>>,
}

impl ResponseCache {
    /// A zero `ttl` disables the cache: `put` becomes a no-op.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Arc::new(RwLock::new(CacheState::default())),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// Current invalidation generation; capture it before issuing a read.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        {
            let state = self.inner.read();
            let entry = state.entries.get(key)?;
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
        }
        let mut state = self.inner.write();
        // Re-check: a concurrent `put` may have refreshed the entry in between.
        if state.entries.get(key).is_some_and(|e| e.expires_at <= now) {
            state.entries.remove(key);
        }
        None
    }

    /// Store `value` under `key`; `path` is the request path used for prefix invalidation.
    pub fn put(&self, key: String, path: &str, value: Value) {
        if !self.is_enabled() {
            return;
        }
        let mut state = self.inner.write();
        self.insert(&mut state, key, path, value);
    }

    /// Like [`ResponseCache::put`], but only if no invalidation happened since `generation`
    /// was captured. Returns whether the value was stored.
    pub fn put_if_current(&self, key: String, path: &str, value: Value, generation: u64) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let mut state = self.inner.write();
        if state.generation != generation {
            return false;
        }
        self.insert(&mut state, key, path, value);
        true
    }

    fn insert(&self, state: &mut CacheState, key: String, path: &str, value: Value) {
        let expires_at = Instant::now() + self.ttl;
        state.entries.insert(
            key,
            CacheEntry {
                path: path.to_string(),
                expires_at,
                value,
            },
        );
    }

    /// Drop every entry whose path is `path_prefix` or lies beneath it (segment-aware:
    /// `/users/1` covers `/users/1/posts` but not `/users/10`).
    ///
    /// Returns the number of removed entries.
    pub fn invalidate_prefix(&self, path_prefix: &str) -> usize {
        let prefix = path_prefix.trim_end_matches('/');
        self.invalidate_where(|entry_path| path_is_under(entry_path, prefix))
    }

    /// Drop entries whose path is exactly `path` (any query).
    pub fn invalidate_exact(&self, path: &str) -> usize {
        let path = path.trim_end_matches('/');
        self.invalidate_where(|entry_path| entry_path.trim_end_matches('/') == path)
    }

    fn invalidate_where(&self, matches: impl Fn(&str) -> bool) -> usize {
        let mut state = self.inner.write();
        state.generation = state.generation.wrapping_add(1);
        let before = state.entries.len();
        state.entries.retain(|_, e| !matches(&e.path));
        before - state.entries.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }
}

fn path_is_under(path: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Normalized cache key for a request: `"<VERB> <path>?<k>=<v>&..."` with pairs sorted and
/// percent-encoded, so `&` or `=` inside a value cannot collide with another query.
#[must_use]
pub fn fingerprint(verb: Verb, path: &str, query: &[(String, String)]) -> String {
    let mut pairs: Vec<&(String, String)> = query.iter().collect();
    pairs.sort();
    let mut key = format!("{verb} {path}");
    for (i, (k, v)) in pairs.into_iter().enumerate() {
        key.push(if i == 0 { '?' } else { '&' });
        key.push_str(&encode_query_component(k));
        key.push('=');
        key.push_str(&encode_query_component(v));
    }
    key
}
