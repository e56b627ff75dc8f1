//! Background reconciliation against the Site's pending queue.
//!
//! Catches items whose webhook never arrived and announces when the queue
//! drains. Each id is announced by the poller at most once per process.
use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument};

use crate::model::{ItemKind, ModerationItem, PendingCounts};
use crate::notify::NotificationDispatcher;
use crate::site::SiteApi;
use crate::state::ModerationState;
use crate::texts;

/// What a single cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub notified: usize,
    pub drained: bool,
    pub failed_fetches: usize,
}

pub struct PollWatcher {
    site: Arc<dyn SiteApi>,
    state: Arc<ModerationState>,
    dispatcher: Arc<NotificationDispatcher>,
    interval: Duration,
    startup_delay: Duration,
}

impl PollWatcher {
    pub fn new(
        site: Arc<dyn SiteApi>,
        state: Arc<ModerationState>,
        dispatcher: Arc<NotificationDispatcher>,
        interval: Duration,
        startup_delay: Duration,
    ) -> Self {
        Self {
            site,
            state,
            dispatcher,
            interval,
            startup_delay,
        }
    }

    /// Run forever. A failing cycle is logged and the loop carries on.
    pub async fn run(self) {
        info!(interval_secs = self.interval.as_secs(), "poll watcher started");
        tokio::time::sleep(self.startup_delay).await;
        loop {
            let report = self.poll_once().await;
            if report.failed_fetches > 0 {
                error!(failed = report.failed_fetches, "poll cycle incomplete");
            }
            tokio::time::sleep(self.interval).await;
        }
    }

    #[instrument(skip_all)]
    pub async fn poll_once(&self) -> CycleReport {
        let (songs, names, covers) = tokio::join!(
            self.site.pending_songs(),
            self.site.pending_names(),
            self.site.pending_covers(),
        );

        let mut report = CycleReport::default();
        let songs = log_fetch(ItemKind::Song, songs, &mut report);
        let names = log_fetch(ItemKind::Name, names, &mut report);
        let covers = log_fetch(ItemKind::Cover, covers, &mut report);

        // queue totals only mean something when every fetch succeeded
        if let (Some(s), Some(n), Some(c)) = (&songs, &names, &covers) {
            let counts = PendingCounts {
                songs: s.len(),
                names: n.len(),
                covers: c.len(),
            };
            if self.state.observe_counts(counts) {
                info!("pending queue drained");
                self.dispatcher.broadcast(texts::QUEUE_EMPTY_TEXT).await;
                report.drained = true;
            }
        }

        let mut fresh: Vec<ModerationItem> = Vec::new();
        if let Some(items) = songs {
            fresh.extend(self.unseen(ItemKind::Song, items, |s| s.id, ModerationItem::Song));
        }
        if let Some(items) = names {
            fresh.extend(self.unseen(ItemKind::Name, items, |n| n.id, ModerationItem::Name));
        }
        if let Some(items) = covers {
            fresh.extend(self.unseen(ItemKind::Cover, items, |c| c.id, ModerationItem::Cover));
        }

        for item in &fresh {
            info!(key = %item.key(), "announcing item found by polling");
            self.dispatcher.broadcast(&texts::notification(item)).await;
        }
        report.notified = fresh.len();
        report
    }

    /// Items whose ids were not yet in the seen set; marks them seen.
    fn unseen<T>(
        &self,
        kind: ItemKind,
        items: Vec<T>,
        id_of: impl Fn(&T) -> i64,
        wrap: impl Fn(T) -> ModerationItem,
    ) -> Vec<ModerationItem> {
        let mut new_ids: HashSet<i64> = self
            .state
            .mark_seen(kind, items.iter().map(&id_of))
            .into_iter()
            .collect();
        // remove() also drops ids the Site listed twice
        items
            .into_iter()
            .filter(|item| new_ids.remove(&id_of(item)))
            .map(wrap)
            .collect()
    }
}

fn log_fetch<T>(kind: ItemKind, res: Result<Vec<T>>, report: &mut CycleReport) -> Option<Vec<T>> {
    match res {
        Ok(items) => Some(items),
        Err(err) => {
            error!(?err, %kind, "failed to fetch pending items");
            report.failed_fetches += 1;
            None
        }
    }
}
