//! Short-lived cache of search results.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::document::SearchResult;

/// Caches ranked results keyed by query text and serialized search options.
///
/// Entries expire after `ttl`. Once more than `capacity` keys are held, the
/// oldest fifth are dropped in insertion order.
#[derive(Debug)]
pub struct SearchCache {
    capacity: usize,
    ttl: Duration,
    entries: HashMap<String, (Instant, Vec<SearchResult>)>,
    order: VecDeque<String>,
}

impl SearchCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self { capacity: capacity.max(1), ttl, entries: HashMap::new(), order: VecDeque::new() }
    }

    /// Build the cache key for `query` under `options`.
    pub fn key<O: Serialize>(query: &str, options: &O) -> String {
        let options = serde_json::to_string(options).unwrap_or_default();
        format!("{query}\u{1f}{options}")
    }

    /// Fresh results for `key`, if any.
    pub fn get(&mut self, key: &str) -> Option<Vec<SearchResult>> {
        let (stored_at, results) = self.entries.get(key)?;
        if stored_at.elapsed() <= self.ttl {
            return Some(results.clone());
        }
        self.entries.remove(key);
        self.order.retain(|k| k != key);
        None
    }

    pub fn insert(&mut self, key: String, results: Vec<SearchResult>) {
        if self.entries.insert(key.clone(), (Instant::now(), results)).is_none() {
            self.order.push_back(key);
        }
        if self.entries.len() > self.capacity {
            let excess = (self.capacity / 5).max(1);
            for key in self.order.drain(..excess.min(self.order.len())) {
                self.entries.remove(&key);
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
