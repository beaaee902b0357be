//! # In-Process Store
//!
//! Provide a `Pool` whose connections operate on a shared in-memory map, for
//! tests and for embedders that want the facade without a server.
//!
//! ## Usage
//!
//! - `MemoryPool::new()` for an unbounded pool.
//! - `MemoryPool::with_max_connections(n)` to make `acquire` fail once `n`
//!   leases are outstanding.
//! - `set_reachable(false)` simulates a store that cannot be reached, and
//!   `set_faulty(true)` makes every store call fail.
//! - `stats()` exposes lease and store-call counters for instrumentation.
//!
//! ## Design Principles
//!
//! 1. **TTL Fast Path**: Expiration is checked on access; no background thread.
//! 2. **Accumulator Pattern**: Relaxed atomic counters for acquire/release.
//! 3. **Default Two-Step TTL**: Connections do not override `set_ex`, so
//!    `set_with_ttl` runs as set followed by expire.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use parking_lot::Mutex;
use thiserror::Error;

use wkv_common::{Pool, StoreConnection, Ttl};

/// Errors raised by the in-memory pool and its connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// All connection slots are leased.
    #[error("memory pool exhausted ({0} connections leased)")]
    Exhausted(usize),
    /// The store was marked unreachable.
    #[error("memory store unreachable")]
    Unreachable,
    /// The pool was closed.
    #[error("memory pool closed")]
    Closed,
    /// Store calls were configured to fail.
    #[error("injected store fault")]
    Fault,
    /// The TTL cannot be represented as a deadline on this clock.
    #[error("ttl of {0}s is out of range")]
    TtlOutOfRange(u64),
}

/// Counters describing pool activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Leases handed out.
    pub acquired: u64,
    /// Leases returned.
    pub released: u64,
    /// Leases currently outstanding.
    pub leased: usize,
    /// Primitive store calls issued (set, get, del, expire).
    pub store_calls: u64,
}

#[derive(Debug)]
struct Entry {
    value: Bytes,
    // Absolute expiration timestamp.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(deadline) if now >= deadline)
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    entries: Mutex<HashMap<String, Entry>>,
    max_connections: Option<usize>,
    leased: AtomicUsize,
    unreachable: AtomicBool,
    faulty: AtomicBool,
    closed: AtomicBool,
    acquired: AtomicU64,
    released: AtomicU64,
    store_calls: AtomicU64,
}

/// In-memory store behind a `Pool` interface. Clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct MemoryPool {
    inner: Arc<MemoryInner>,
}

impl MemoryPool {
    /// Creates a pool with no connection limit.
    pub fn new() -> Self {
        MemoryPool::default()
    }

    /// Creates a pool that allows at most `max` outstanding leases.
    pub fn with_max_connections(max: usize) -> Self {
        MemoryPool {
            inner: Arc::new(MemoryInner {
                max_connections: Some(max),
                ..MemoryInner::default()
            }),
        }
    }

    /// Marks the store reachable or not. Unreachable stores fail `acquire`.
    pub fn set_reachable(&self, reachable: bool) {
        self.inner.unreachable.store(!reachable, Ordering::Relaxed);
    }

    /// Makes every store call fail with `MemoryError::Fault` while set.
    pub fn set_faulty(&self, faulty: bool) {
        self.inner.faulty.store(faulty, Ordering::Relaxed);
    }

    /// Number of live (unexpired) keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.inner
            .entries
            .lock()
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    /// Returns true when no live key is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes expired entries and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.inner.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Returns a snapshot of the counters.
    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            acquired: self.inner.acquired.load(Ordering::Relaxed),
            released: self.inner.released.load(Ordering::Relaxed),
            leased: self.inner.leased.load(Ordering::Relaxed),
            store_calls: self.inner.store_calls.load(Ordering::Relaxed),
        }
    }

    fn reserve_slot(&self) -> Result<(), MemoryError> {
        let leased = &self.inner.leased;
        match self.inner.max_connections {
            Some(max) => leased
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < max).then_some(n + 1))
                .map(|_| ())
                .map_err(MemoryError::Exhausted),
            None => {
                leased.fetch_add(1, Ordering::AcqRel);
                Ok(())
            }
        }
    }
}

impl Pool for MemoryPool {
    type Connection = MemoryConnection;
    type Error = MemoryError;

    fn acquire(&self) -> Result<MemoryConnection, MemoryError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(MemoryError::Closed);
        }
        if self.inner.unreachable.load(Ordering::Relaxed) {
            return Err(MemoryError::Unreachable);
        }
        self.reserve_slot()?;
        self.inner.acquired.fetch_add(1, Ordering::Relaxed);
        Ok(MemoryConnection {
            inner: self.inner.clone(),
        })
    }

    fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }
}

/// Lease on a `MemoryPool`; dropping it releases the slot.
#[derive(Debug)]
pub struct MemoryConnection {
    inner: Arc<MemoryInner>,
}

impl MemoryConnection {
    /// Counts the call and applies fault injection.
    fn begin_call(&self) -> Result<(), MemoryError> {
        self.inner.store_calls.fetch_add(1, Ordering::Relaxed);
        if self.inner.faulty.load(Ordering::Relaxed) {
            return Err(MemoryError::Fault);
        }
        Ok(())
    }
}

impl StoreConnection for MemoryConnection {
    type Error = MemoryError;

    fn set(&mut self, key: &str, value: &[u8]) -> Result<String, MemoryError> {
        self.begin_call()?;
        let entry = Entry {
            value: Bytes::copy_from_slice(value),
            expires_at: None,
        };
        self.inner.entries.lock().insert(key.to_string(), entry);
        Ok("OK".to_string())
    }

    fn get(&mut self, key: &str) -> Result<Option<Bytes>, MemoryError> {
        self.begin_call()?;
        let now = Instant::now();
        let mut entries = self.inner.entries.lock();
        let live = entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone());
        if live.is_none() {
            entries.remove(key);
        }
        Ok(live)
    }

    fn del(&mut self, key: &str) -> Result<u64, MemoryError> {
        self.begin_call()?;
        let now = Instant::now();
        match self.inner.entries.lock().remove(key) {
            Some(entry) if !entry.is_expired(now) => Ok(1),
            _ => Ok(0),
        }
    }

    fn expire(&mut self, key: &str, ttl: Ttl) -> Result<bool, MemoryError> {
        self.begin_call()?;
        let now = Instant::now();
        let deadline = now
            .checked_add(ttl.as_duration())
            .ok_or(MemoryError::TtlOutOfRange(ttl.as_secs()))?;
        let mut entries = self.inner.entries.lock();
        let updated = entries
            .get_mut(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.expires_at = Some(deadline))
            .is_some();
        if !updated {
            entries.remove(key);
        }
        Ok(updated)
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.inner.released.fetch_add(1, Ordering::Relaxed);
        self.inner.leased.fetch_sub(1, Ordering::AcqRel);
    }
}
