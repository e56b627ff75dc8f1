//! In-memory moderation state shared by the webhook, the poll loop and the
//! panel API.
//!
//! Everything sits behind one mutex. The lock is only held for the in-memory
//! bookkeeping itself; callers release it before any network I/O.

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use crate::error::ModerationError;
use crate::model::{HistoryAction, HistoryEntry, ItemKey, ItemKind, PendingCounts};

pub const HISTORY_CAPACITY: usize = 100;
pub const HISTORY_READ_LIMIT: usize = 50;

#[derive(Debug, Default)]
struct Inner {
    /// Resolved items and who resolved them. Entries are never replaced.
    handled: HashMap<ItemKey, String>,
    /// Approve/reject calls currently waiting on the Site API. Dropping the
    /// sender wakes everyone waiting on the key.
    in_flight: HashMap<ItemKey, watch::Sender<()>>,
    seen: HashMap<ItemKind, HashSet<i64>>,
    /// `None` until the first complete poll cycle.
    pending: Option<PendingCounts>,
    /// Newest first.
    history: VecDeque<HistoryEntry>,
}

#[derive(Debug, Default)]
pub struct ModerationState {
    inner: Mutex<Inner>,
}

impl ModerationState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Name of the moderator who resolved `key`, if any.
    pub fn handled_by(&self, key: ItemKey) -> Option<String> {
        self.inner.lock().handled.get(&key).cloned()
    }

    /// Reserve `key` for an approve/reject by `moderator`.
    ///
    /// Fails with `Conflict` once the key is resolved. If another moderator's
    /// call is in flight, waits for it to finish and checks again, so a failed
    /// attempt never surfaces as a conflict. The reservation is released when
    /// the returned claim is dropped without [`Claim::commit`].
    pub async fn claim(
        self: &Arc<Self>,
        key: ItemKey,
        moderator: &str,
    ) -> Result<Claim, ModerationError> {
        loop {
            let mut finished = {
                let mut inner = self.inner.lock();
                if let Some(by) = inner.handled.get(&key) {
                    return Err(ModerationError::Conflict { by: by.clone() });
                }
                let waiting = inner.in_flight.get(&key).map(watch::Sender::subscribe);
                match waiting {
                    Some(rx) => rx,
                    None => {
                        let (tx, _) = watch::channel(());
                        inner.in_flight.insert(key, tx);
                        return Ok(Claim {
                            state: Arc::clone(self),
                            key,
                            moderator: moderator.to_string(),
                            committed: false,
                        });
                    }
                }
            };
            debug!(%key, "waiting for in-flight decision");
            // resolves with Err once the holder drops the sender
            let _ = finished.changed().await;
        }
    }

    /// Add `ids` to the seen set for `kind`; returns the ones not seen before,
    /// in input order.
    pub fn mark_seen(&self, kind: ItemKind, ids: impl IntoIterator<Item = i64>) -> Vec<i64> {
        let mut inner = self.inner.lock();
        let seen = inner.seen.entry(kind).or_default();
        ids.into_iter().filter(|id| seen.insert(*id)).collect()
    }

    pub fn is_seen(&self, kind: ItemKind, id: i64) -> bool {
        self.inner
            .lock()
            .seen
            .get(&kind)
            .map_or(false, |s| s.contains(&id))
    }

    /// Record the latest queue sizes. Returns true when the total went from
    /// positive to zero; never on the first observation.
    pub fn observe_counts(&self, counts: PendingCounts) -> bool {
        let mut inner = self.inner.lock();
        let previous = inner.pending.replace(counts);
        matches!(previous, Some(prev) if prev.total() > 0) && counts.total() == 0
    }

    pub fn pending_counts(&self) -> Option<PendingCounts> {
        self.inner.lock().pending
    }

    /// Up to `limit` (capped at 50) most recent entries, newest first.
    pub fn history(&self, limit: usize) -> Vec<HistoryEntry> {
        let limit = limit.min(HISTORY_READ_LIMIT);
        self.inner.lock().history.iter().take(limit).cloned().collect()
    }

    fn record(&self, key: ItemKey, moderator: &str, action: HistoryAction, reason: String) {
        let mut inner = self.inner.lock();
        inner.in_flight.remove(&key);
        inner.handled.insert(key, moderator.to_string());
        inner.history.push_front(HistoryEntry {
            kind: key.kind,
            id: key.id,
            action,
            moderator: moderator.to_string(),
            reason,
            time: Utc::now(),
        });
        inner.history.truncate(HISTORY_CAPACITY);
    }

    fn release(&self, key: ItemKey) {
        self.inner.lock().in_flight.remove(&key);
    }
}

/// Exclusive right to resolve one item key.
#[derive(Debug)]
pub struct Claim {
    state: Arc<ModerationState>,
    key: ItemKey,
    moderator: String,
    committed: bool,
}

impl Claim {
    /// Write the handled record and the history entry in one step.
    pub fn commit(mut self, action: HistoryAction, reason: impl Into<String>) {
        self.state
            .record(self.key, &self.moderator, action, reason.into());
        self.committed = true;
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        if !self.committed {
            debug!(key = %self.key, "releasing uncommitted claim");
            self.state.release(self.key);
        }
    }
}
