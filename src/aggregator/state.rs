//! Per-run resolution state.
//!
//! The claim set, the result sequence and the resolved counter share one
//! mutex so that claiming and appending are each a single critical section.
//! The lock is never held across an `.await`.

use crate::models::{HoldingKey, HoldingRecord, HoldingsView};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct StateInner {
    /// Keys in flight or already resolved.
    claimed: HashSet<HoldingKey>,
    /// Keys present in `results`.
    recorded: HashSet<HoldingKey>,
    results: Vec<HoldingRecord>,
    resolved_count: usize,
}

/// State owned by exactly one aggregation run.
#[derive(Debug)]
pub struct ResolutionState {
    generation: u64,
    loading: AtomicBool,
    inner: Mutex<StateInner>,
}

impl ResolutionState {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            loading: AtomicBool::new(false),
            inner: Mutex::new(StateInner::default()),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub fn set_loading(&self, loading: bool) {
        self.loading.store(loading, Ordering::Release);
    }

    fn lock(&self) -> MutexGuard<'_, StateInner> {
        // Every mutation is a single insert/remove/push, so a poisoned lock
        // still holds consistent data.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Test-and-set `key` in the claim set. Returns `false` if it was
    /// already claimed.
    pub fn try_claim(&self, key: &HoldingKey) -> bool {
        self.lock().claimed.insert(key.clone())
    }

    /// Release a claim after a failed resolution.
    pub fn release(&self, key: &HoldingKey) {
        self.lock().claimed.remove(key);
    }

    #[cfg(test)]
    pub fn is_claimed(&self, key: &HoldingKey) -> bool {
        self.lock().claimed.contains(key)
    }

    /// Append `record` unless a record with the same key exists.
    /// The counter moves with the append.
    pub fn append(&self, record: HoldingRecord) -> bool {
        let mut inner = self.lock();
        if !inner.recorded.insert(record.key()) {
            return false;
        }
        inner.results.push(record);
        inner.resolved_count += 1;
        true
    }

    pub fn resolved_count(&self) -> usize {
        self.lock().resolved_count
    }

    /// Snapshot for presentation.
    pub fn view(&self) -> HoldingsView {
        let inner = self.lock();
        HoldingsView {
            generation: self.generation,
            loading: self.is_loading(),
            resolved_count: inner.resolved_count,
            results: inner.results.clone(),
        }
    }
}
