//! In-flight request bookkeeping for `find`.
//!
//! At most one non-bypass fetch per `(resource, id)` is outstanding at a
//! time; later callers subscribe to its result instead of fetching again.
//! Every fetch also gets a sequence number so that, when a bypass fetch
//! races a regular one, only the latest-issued response is written to the
//! store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rds_store::Item;
use rds_types::ResourceId;
use tokio::sync::watch;

use crate::error::{SdkError, SdkResult};

/// `(resource, id)` of a fetch.
pub(crate) type PendingKey = (String, ResourceId);

/// Settled result broadcast to subscribers; `None` while in flight.
type Shared = Option<SdkResult<Item>>;

struct PendingEntry {
    seq: u64,
    rx: watch::Receiver<Shared>,
}

/// What a `find` caller should do next.
pub(crate) enum Ticket<'a> {
    /// Another fetch for the key is in flight; wait for its result.
    Join(watch::Receiver<Shared>),
    /// The item is already cached.
    Cached(Item),
    /// Fetch it.
    Lead(Lease<'a>),
}

#[derive(Default)]
pub(crate) struct Coordinator {
    pending: Mutex<HashMap<PendingKey, PendingEntry>>,
    applied: Mutex<HashMap<PendingKey, u64>>,
    next_seq: AtomicU64,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Coordinator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Join an in-flight fetch, serve from cache, or start a new fetch.
    ///
    /// `cached` is only consulted when no fetch is in flight and the caller
    /// did not ask to bypass. A bypass fetch never replaces the in-flight
    /// entry other callers are subscribed to.
    pub(crate) fn begin(
        &self,
        key: PendingKey,
        bypass: bool,
        cached: impl FnOnce() -> Option<Item>,
    ) -> Ticket<'_> {
        let mut pending = lock(&self.pending);
        if !bypass {
            if let Some(entry) = pending.get(&key) {
                return Ticket::Join(entry.rx.clone());
            }
            if let Some(item) = cached() {
                return Ticket::Cached(item);
            }
        }

        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = watch::channel(None);
        let registered = !pending.contains_key(&key);
        if registered {
            pending.insert(key.clone(), PendingEntry { seq, rx });
        }
        Ticket::Lead(Lease {
            coordinator: self,
            key,
            seq,
            tx,
            registered,
        })
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self, key: &PendingKey) -> bool {
        lock(&self.pending).contains_key(key)
    }

    pub(crate) fn pending_len(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Forget sequencing state for `key`.
    pub(crate) fn forget(&self, key: &PendingKey) {
        lock(&self.applied).remove(key);
    }

    pub(crate) fn forget_resource(&self, resource: &str) {
        lock(&self.applied).retain(|(r, _), _| r != resource);
    }
}

/// Ownership of one outstanding fetch.
///
/// Dropping the lease removes its pending entry. If it was never settled,
/// subscribers observe [`SdkError::RequestAbandoned`].
pub(crate) struct Lease<'a> {
    coordinator: &'a Coordinator,
    key: PendingKey,
    seq: u64,
    tx: watch::Sender<Shared>,
    registered: bool,
}

impl Lease<'_> {
    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }

    /// Returns `true` unless a later-issued fetch for the same key already
    /// wrote its response.
    ///
    /// Check and [`Lease::record_applied`] must happen under one registry
    /// write lock so the check and the write are ordered together.
    pub(crate) fn is_latest(&self) -> bool {
        lock(&self.coordinator.applied)
            .get(&self.key)
            .map_or(true, |latest| *latest < self.seq)
    }

    /// Record this fetch's response as written to the store.
    pub(crate) fn record_applied(&self) {
        let mut applied = lock(&self.coordinator.applied);
        let latest = applied.entry(self.key.clone()).or_insert(0);
        *latest = (*latest).max(self.seq);
    }

    /// Publish the result to every subscriber.
    pub(crate) fn settle(self, result: &SdkResult<Item>) {
        self.tx.send_replace(Some(result.clone()));
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        if !self.registered {
            return;
        }
        let mut pending = lock(&self.coordinator.pending);
        if pending.get(&self.key).is_some_and(|e| e.seq == self.seq) {
            pending.remove(&self.key);
        }
    }
}

/// Wait for a joined fetch to settle.
pub(crate) async fn join(mut rx: watch::Receiver<Shared>, key: PendingKey) -> SdkResult<Item> {
    let abandoned = |(resource, id): PendingKey| SdkError::RequestAbandoned { resource, id };
    let settled = match rx.wait_for(Option::is_some).await {
        Ok(value) => value.clone(),
        Err(_) => None,
    };
    settled.unwrap_or_else(|| Err(abandoned(key)))
}
