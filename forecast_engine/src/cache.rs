//! Render cache keyed by request fingerprint
//!
//! Avoids rebuilding presentation output for a request that was already
//! rendered. It never short-circuits model fitting.

use crate::data::Ticker;
use crate::models::ModelFamily;
use std::collections::{HashMap, VecDeque};

/// Fingerprint of one request: `recommendations-{ticker}-{model}-{horizon}-{target}`
pub fn fingerprint(ticker: Ticker, model: ModelFamily, horizon: usize, target_pct: f64) -> String {
    format!(
        "recommendations-{}-{}-{}-{}",
        ticker.symbol(),
        model.label(),
        horizon,
        target_pct
    )
}

/// Insertion-ordered cache; with a capacity the oldest entry is evicted first
#[derive(Debug, Clone)]
pub struct RenderCache<V> {
    capacity: Option<usize>,
    entries: HashMap<String, V>,
    order: VecDeque<String>,
}

impl<V> Default for RenderCache<V> {
    fn default() -> Self {
        Self::new(None)
    }
}

impl<V> RenderCache<V> {
    /// `None` keeps every entry
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Store `value`, returning the entry it replaced
    pub fn insert(&mut self, key: String, value: V) -> Option<V> {
        if let Some(old) = self.entries.insert(key.clone(), value) {
            return Some(old);
        }
        self.order.push_back(key);
        if let Some(cap) = self.capacity {
            while self.order.len() > cap {
                if let Some(oldest) = self.order.pop_front() {
                    self.entries.remove(&oldest);
                }
            }
        }
        None
    }

    /// Cached value for `key`, computed and stored on a miss
    pub fn get_or_insert_with<F: FnOnce() -> V>(&mut self, key: &str, make: F) -> Option<&V> {
        if !self.entries.contains_key(key) {
            self.insert(key.to_string(), make());
        }
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
