use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::models::{ListingEntry, RefreshSummary, Restaurant};
use crate::utils;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no data file at {0}")]
    NotFound(PathBuf),
    #[error("data file {path} is not valid json: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Listings as read from disk, tagged with the store generation they belong to.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub entries: Vec<ListingEntry>,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteBack {
    Written,
    /// A full replace happened after the snapshot was taken; nothing was written.
    Superseded,
}

/// The JSON document store. Cheap to clone; clones share the write lock and
/// the generation counter.
#[derive(Clone)]
pub struct ListingStore {
    inner: Arc<Inner>,
}

struct Inner {
    listings_path: PathBuf,
    status_path: PathBuf,
    generation: AtomicU64,
    write_lock: Mutex<()>,
}

impl ListingStore {
    pub fn new(listings_path: PathBuf, status_path: PathBuf) -> Self {
        Self {
            inner: Arc::new(Inner {
                listings_path,
                status_path,
                generation: AtomicU64::new(0),
                write_lock: Mutex::new(()),
            }),
        }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(utils::listings_path_in(dir), utils::status_path_in(dir))
    }

    pub fn listings_path(&self) -> &Path {
        &self.inner.listings_path
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    pub async fn load(&self) -> Result<Snapshot, StoreError> {
        // read the generation first: a replace landing between the two reads
        // makes the snapshot look stale, never fresh
        let generation = self.generation();
        let entries = read_json(&self.inner.listings_path).await?;
        Ok(Snapshot {
            entries,
            generation,
        })
    }

    /// Full replacement, used by refreshes.
    pub async fn replace(&self, entries: &[ListingEntry]) -> Result<(), StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        write_json_atomic(&self.inner.listings_path, entries).await?;
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Persists a read-side marking pass unless a replace superseded it.
    pub async fn write_back(
        &self,
        entries: &[ListingEntry],
        generation: u64,
    ) -> Result<WriteBack, StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        let current = self.generation();
        if current != generation {
            debug!(
                snapshot = generation,
                current, "store replaced since snapshot, skipping write-back"
            );
            return Ok(WriteBack::Superseded);
        }
        write_json_atomic(&self.inner.listings_path, entries).await?;
        Ok(WriteBack::Written)
    }

    pub async fn load_summary(&self) -> Result<Option<RefreshSummary>, StoreError> {
        match read_json(&self.inner.status_path).await {
            Ok(summary) => Ok(Some(summary)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn save_summary(&self, summary: &RefreshSummary) -> Result<(), StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        write_json_atomic(&self.inner.status_path, summary).await
    }
}

pub async fn load_restaurants(path: &Path) -> Result<Vec<Restaurant>, StoreError> {
    read_json(path).await
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(StoreError::NotFound(path.to_path_buf()))
        }
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let contents = serde_json::to_vec_pretty(value)?;
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, contents).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)
}
