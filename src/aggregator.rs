use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use chrono::{Duration as Days, NaiveDate, Utc};
use chrono_tz::Tz;
use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::models::{KindCounts, ListingEntry, ListingKind, RefreshSummary};
use crate::normalize::{self, RawPayload, SinglePayload};
use crate::schedule;
use crate::scraping::{self, SourceAdapter, SourceInfo};
use crate::store::ListingStore;

pub struct RefreshOutcome {
    pub entries: Vec<ListingEntry>,
    pub summary: RefreshSummary,
}

/// Runs every registered adapter and replaces the store with the result.
/// Refreshes are serialized; a second caller waits for the first to finish.
#[derive(Clone)]
pub struct Aggregator {
    inner: Arc<Inner>,
}

struct Inner {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    store: ListingStore,
    tz: Tz,
    adapter_timeout: Duration,
    refresh_lock: Mutex<()>,
}

impl Aggregator {
    pub fn new(
        adapters: Vec<Arc<dyn SourceAdapter>>,
        store: ListingStore,
        tz: Tz,
        adapter_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                adapters,
                store,
                tz,
                adapter_timeout,
                refresh_lock: Mutex::new(()),
            }),
        }
    }

    pub fn sources(&self) -> Vec<SourceInfo> {
        scraping::describe(&self.inner.adapters)
    }

    pub fn store(&self) -> &ListingStore {
        &self.inner.store
    }

    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        self.refresh_on(schedule::today_in(self.inner.tz)).await
    }

    pub async fn refresh_on(&self, today: NaiveDate) -> Result<RefreshOutcome> {
        let _guard = self.inner.refresh_lock.lock().await;
        let started = Instant::now();
        let adapters = &self.inner.adapters;

        let results = join_all(
            adapters
                .iter()
                .map(|adapter| run_adapter(Arc::clone(adapter), self.inner.adapter_timeout)),
        )
        .await;

        let mut entries = Vec::new();
        let mut failed_sources = Vec::new();
        for (adapter, result) in adapters.iter().zip(results) {
            match result {
                Some(payloads) => {
                    let normalized = normalize::normalize_all(payloads, today);
                    info!(
                        source = adapter.source_id(),
                        entries = normalized.len(),
                        "normalized source listings"
                    );
                    entries.extend(normalized);
                }
                None => failed_sources.push(adapter.source_id().to_string()),
            }
        }

        let mut used_fallback = false;
        if !adapters.is_empty() && failed_sources.len() == adapters.len() {
            warn!("every source failed, storing the fallback listings");
            entries = fallback_listings(today);
            used_fallback = true;
        }

        let store = &self.inner.store;
        let stored = store.replace(&entries).await;
        let entries = match stored {
            Ok(()) => entries,
            Err(err) => {
                error!("failed to store refreshed listings: {err}");
                let fallback = fallback_listings(today);
                store
                    .replace(&fallback)
                    .await
                    .context("unable to store the fallback listings")?;
                used_fallback = true;
                fallback
            }
        };

        let summary = RefreshSummary {
            refreshed_at: Utc::now(),
            total: entries.len(),
            counts: KindCounts::tally(&entries),
            used_fallback,
            failed_sources,
        };
        if let Err(err) = store.save_summary(&summary).await {
            warn!("failed to store refresh summary: {err}");
        }

        info!(
            total = summary.total,
            slots = entries.iter().map(ListingEntry::slot_count).sum::<usize>(),
            cinema = summary.counts.cinema,
            theater = summary.counts.theater,
            music = summary.counts.music,
            used_fallback,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "refresh complete"
        );

        Ok(RefreshOutcome { entries, summary })
    }
}

/// Any error, panic or timeout becomes `None`. A timed-out fetch keeps its
/// blocking thread until the HTTP client gives up; its result is discarded.
async fn run_adapter(
    adapter: Arc<dyn SourceAdapter>,
    timeout: Duration,
) -> Option<Vec<RawPayload>> {
    let source = adapter.source_id();
    let task = tokio::task::spawn_blocking(move || adapter.fetch());

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(Ok(payloads))) => {
            info!(source, payloads = payloads.len(), "source fetched");
            Some(payloads)
        }
        Ok(Ok(Err(err))) => {
            warn!(source, "source failed: {err:#}");
            None
        }
        Ok(Err(join_err)) => {
            warn!(source, "source task aborted: {join_err}");
            None
        }
        Err(_) => {
            warn!(source, timeout_secs = timeout.as_secs(), "source timed out");
            None
        }
    }
}

/// Small fixed dataset, dated from `today` so it survives the upcoming-only view.
pub fn fallback_listings(today: NaiveDate) -> Vec<ListingEntry> {
    let day = |offset: i64| (today + Days::days(offset)).format("%Y-%m-%d").to_string();
    let payloads = vec![
        RawPayload::Single(SinglePayload {
            kind: ListingKind::Cinema,
            title: "Duna: Parte 2".into(),
            venue: Some("Cinemark Palermo".into()),
            address: Some("Beruti 3399, CABA".into()),
            description: Some("Secuela épica de ciencia ficción con Timothée Chalamet.".into()),
            date: Some(day(0)),
            time: Some("19:30".into()),
        }),
        RawPayload::Single(SinglePayload {
            kind: ListingKind::Theater,
            title: "Toc Toc".into(),
            venue: Some("Teatro Multiteatro Comafi".into()),
            address: Some("Av. Corrientes 1283, CABA".into()),
            description: Some(
                "Comedia sobre pacientes con trastornos obsesivos compulsivos en una sala de espera."
                    .into(),
            ),
            date: Some(day(0)),
            time: Some("20:30".into()),
        }),
        RawPayload::Single(SinglePayload {
            kind: ListingKind::Music,
            title: "Lisandro Aristimuño".into(),
            venue: Some("Teatro Gran Rex".into()),
            address: Some("Av. Corrientes 857, CABA".into()),
            description: Some("Show acústico del reconocido músico argentino.".into()),
            date: Some(day(1)),
            time: Some("21:00".into()),
        }),
    ];
    normalize::normalize_all(payloads, today)
}
