//! In-memory store with optional JSON snapshot persistence.
//!
//! Every mutation serialises the collections while it still holds the write
//! guard, then writes the file with `tokio::fs` after releasing it. Snapshots
//! carry a generation number and an older one never replaces a newer one. A
//! failed write is logged and otherwise ignored: memory stays the source of
//! truth for the process.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::fs;
use tracing::{debug, warn};

use super::{ReviewFilter, ReviewPatch, Store};
use crate::error::{AppError, AppResult};
use crate::model::{Property, Review};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Collections {
    #[serde(default)]
    properties: Vec<Property>,
    #[serde(default)]
    reviews: Vec<Review>,
}

/// Serialised state waiting to be written.
#[derive(Debug)]
struct PendingSnapshot {
    generation: u64,
    bytes: Vec<u8>,
}

#[derive(Debug)]
struct SnapshotFile {
    path: PathBuf,
    generation: AtomicU64,
    /// Generation currently on disk; also serialises file writes.
    written: tokio::sync::Mutex<u64>,
}

impl SnapshotFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            generation: AtomicU64::new(0),
            written: tokio::sync::Mutex::new(0),
        }
    }

    /// Must run under the store's write guard so generations follow
    /// mutation order.
    fn capture(&self, data: &Collections) -> Option<PendingSnapshot> {
        match serde_json::to_vec_pretty(data) {
            Ok(bytes) => Some(PendingSnapshot {
                generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
                bytes,
            }),
            Err(e) => {
                warn!(target: "store", error = %e, "snapshot serialisation failed");
                None
            }
        }
    }

    async fn write(&self, pending: PendingSnapshot) {
        let mut written = self.written.lock().await;
        if pending.generation <= *written {
            debug!(
                target: "store",
                generation = pending.generation,
                on_disk = *written,
                "stale snapshot skipped"
            );
            return;
        }
        match write_atomic(&self.path, &pending.bytes).await {
            Ok(()) => *written = pending.generation,
            Err(e) => {
                warn!(target: "store", path = %self.path.display(), error = %e, "snapshot write failed")
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
    snapshot: Option<SnapshotFile>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a snapshot-backed store. A missing file starts empty; an
    /// unreadable or corrupt file is an error.
    pub fn with_snapshot(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        use anyhow::Context as _;

        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let raw = std::fs::read(&path)
                .with_context(|| format!("reading snapshot {}", path.display()))?;
            serde_json::from_slice::<Collections>(&raw)
                .with_context(|| format!("parsing snapshot {}", path.display()))?
        } else {
            Collections::default()
        };
        debug!(
            target: "store",
            path = %path.display(),
            properties = data.properties.len(),
            reviews = data.reviews.len(),
            "snapshot loaded"
        );
        Ok(Self {
            inner: RwLock::new(data),
            snapshot: Some(SnapshotFile::new(path)),
        })
    }

    fn read(&self) -> AppResult<RwLockReadGuard<'_, Collections>> {
        self.inner
            .read()
            .map_err(|_| AppError::Store("store lock poisoned".into()))
    }

    fn write(&self) -> AppResult<RwLockWriteGuard<'_, Collections>> {
        self.inner
            .write()
            .map_err(|_| AppError::Store("store lock poisoned".into()))
    }

    fn capture(&self, data: &Collections) -> Option<PendingSnapshot> {
        self.snapshot.as_ref()?.capture(data)
    }

    /// Write a captured snapshot. Call only after the write guard is gone.
    async fn persist(&self, pending: Option<PendingSnapshot>) {
        if let (Some(file), Some(pending)) = (&self.snapshot, pending) {
            file.write(pending).await;
        }
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).await?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, path).await
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_properties(&self) -> AppResult<Vec<Property>> {
        Ok(self.read()?.properties.clone())
    }

    async fn get_property(&self, id: &str) -> AppResult<Option<Property>> {
        Ok(self.read()?.properties.iter().find(|p| p.id == id).cloned())
    }

    async fn insert_property(&self, property: Property) -> AppResult<Property> {
        let pending = {
            let mut g = self.write()?;
            if g.properties.iter().any(|p| p.id == property.id) {
                return Err(AppError::Conflict(format!(
                    "property '{}' already exists",
                    property.id
                )));
            }
            g.properties.push(property.clone());
            self.capture(&g)
        };
        self.persist(pending).await;
        Ok(property)
    }

    async fn update_property_rating(&self, id: &str, rating: f64) -> AppResult<Option<Property>> {
        let (out, pending) = {
            let mut g = self.write()?;
            let Some(p) = g.properties.iter_mut().find(|p| p.id == id) else {
                return Ok(None);
            };
            p.rating = rating;
            let out = p.clone();
            (out, self.capture(&g))
        };
        self.persist(pending).await;
        Ok(Some(out))
    }

    async fn find_reviews(&self, filter: &ReviewFilter) -> AppResult<Vec<Review>> {
        Ok(self
            .read()?
            .reviews
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn get_review(&self, id: &str) -> AppResult<Option<Review>> {
        Ok(self.read()?.reviews.iter().find(|r| r.id == id).cloned())
    }

    async fn insert_review(&self, review: Review) -> AppResult<Review> {
        let pending = {
            let mut g = self.write()?;
            if g.reviews.iter().any(|r| r.id == review.id) {
                return Err(AppError::Conflict(format!("review '{}' already exists", review.id)));
            }
            g.reviews.push(review.clone());
            self.capture(&g)
        };
        self.persist(pending).await;
        Ok(review)
    }

    async fn update_review(&self, id: &str, patch: ReviewPatch) -> AppResult<Option<Review>> {
        let (out, pending) = {
            let mut g = self.write()?;
            let Some(r) = g.reviews.iter_mut().find(|r| r.id == id) else {
                return Ok(None);
            };
            patch.apply(r);
            let out = r.clone();
            (out, self.capture(&g))
        };
        self.persist(pending).await;
        Ok(Some(out))
    }

    async fn delete_review(&self, id: &str) -> AppResult<bool> {
        let pending = {
            let mut g = self.write()?;
            let before = g.reviews.len();
            g.reviews.retain(|r| r.id != id);
            if g.reviews.len() == before {
                return Ok(false);
            }
            self.capture(&g)
        };
        self.persist(pending).await;
        Ok(true)
    }

    async fn count_reviews(&self, filter: &ReviewFilter) -> AppResult<usize> {
        Ok(self.read()?.reviews.iter().filter(|r| filter.matches(r)).count())
    }
}
