//! Read path over the listings store.
//!
//! Every read first runs the marking pass so the stored document keeps its
//! history with past showtimes flagged as hidden. When that pass changed
//! anything, the marked document is written back in a detached task and the
//! response does not wait for it. The response is then either the marked
//! document or a hard-filtered view of it.

use chrono::NaiveDate;
use chrono_tz::Tz;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::ListingEntry;
use crate::schedule::{self, SanitizeMode};
use crate::store::{ListingStore, StoreError, WriteBack};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    UpcomingOnly,
    /// Past showtimes stay in the response, flagged `hidden`.
    IncludePast,
}

impl Visibility {
    pub fn from_include_past(include_past: bool) -> Self {
        if include_past {
            Visibility::IncludePast
        } else {
            Visibility::UpcomingOnly
        }
    }
}

pub struct ReadOutcome {
    pub entries: Vec<ListingEntry>,
    /// Present when the marking pass changed the document.
    pub write_back: Option<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct Reconciler {
    store: ListingStore,
    tz: Tz,
}

impl Reconciler {
    pub fn new(store: ListingStore, tz: Tz) -> Self {
        Self { store, tz }
    }

    pub fn store(&self) -> &ListingStore {
        &self.store
    }

    pub fn today(&self) -> NaiveDate {
        schedule::today_in(self.tz)
    }

    pub async fn handle_read(&self, visibility: Visibility) -> Result<Vec<ListingEntry>, StoreError> {
        let outcome = self.read(visibility, self.today()).await?;
        Ok(outcome.entries)
    }

    pub async fn read(
        &self,
        visibility: Visibility,
        today: NaiveDate,
    ) -> Result<ReadOutcome, StoreError> {
        let snapshot = self.store.load().await?;
        let marked = schedule::sanitize(snapshot.entries, SanitizeMode::MarkOnly, today);

        let write_back = if marked.changed {
            Some(spawn_write_back(
                self.store.clone(),
                marked.entries.clone(),
                snapshot.generation,
                marked.stats.slots_marked,
            ))
        } else {
            None
        };

        let entries = match visibility {
            Visibility::IncludePast => marked.entries,
            Visibility::UpcomingOnly => {
                let filtered = schedule::sanitize(marked.entries, SanitizeMode::HardFilter, today);
                debug!(
                    slots = filtered.stats.slots_removed,
                    venues = filtered.stats.venues_removed,
                    entries = filtered.stats.entries_removed,
                    "filtered past showtimes from response"
                );
                filtered.entries
            }
        };

        Ok(ReadOutcome {
            entries,
            write_back,
        })
    }
}

fn spawn_write_back(
    store: ListingStore,
    entries: Vec<ListingEntry>,
    generation: u64,
    slots_marked: usize,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match store.write_back(&entries, generation).await {
            Ok(WriteBack::Written) => info!(slots_marked, "persisted hidden flags for past showtimes"),
            Ok(WriteBack::Superseded) => {
                debug!("listings were refreshed during the read, dropped stale write-back")
            }
            Err(err) => warn!("failed to persist hidden flags: {err}"),
        }
    })
}
