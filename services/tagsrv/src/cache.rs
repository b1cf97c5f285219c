//! Last-known tag values
//!
//! Written only by the scanner and the write service; read by any consumer
//! without blocking. The timestamp makes staleness observable: a tag whose
//! slave is unreachable simply stops updating.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tagcodec::Value;

/// One cached sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CachedValue {
    pub value: Value,
    pub timestamp: DateTime<Utc>,
}

/// Concurrent tag-name → last-value map
#[derive(Debug, Default)]
pub struct ValueCache {
    values: DashMap<String, CachedValue>,
}

impl ValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a fresh sample for a tag. Last writer wins.
    pub fn insert(&self, name: &str, value: Value) {
        self.values.insert(
            name.to_string(),
            CachedValue {
                value,
                timestamp: Utc::now(),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<CachedValue> {
        self.values.get(name).map(|entry| *entry.value())
    }

    /// Point-in-time copy of every cached value, sorted by tag name.
    pub fn snapshot(&self) -> Vec<(String, CachedValue)> {
        let mut out: Vec<(String, CachedValue)> = self
            .values
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Drop a tag's sample (used when the tag is removed).
    pub fn evict(&self, name: &str) {
        self.values.remove(name);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
