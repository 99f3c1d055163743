//! Tracked expiry of converted artifacts awaiting download.
//!
//! Each artifact moves `Untracked → Tracked → {Downloaded, Expired}`. The
//! registry sits behind a single mutex; every mutation (track, stop, expire,
//! timer firing) takes it, so no two of them interleave on the same record.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::metrics;

struct ArtifactRecord {
    created_at: DateTime<Utc>,
    expires_at: Instant,
    /// Distinguishes this record's timer from one it replaced.
    generation: u64,
    timer: AbortHandle,
}

/// Snapshot of the registry for health and observability endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleStats {
    pub tracked: usize,
    pub oldest: Option<String>,
    pub newest: Option<String>,
    pub expiry_secs: u64,
}

struct Inner {
    upload_dir: PathBuf,
    output_dir: PathBuf,
    expiry: Duration,
    registry: Mutex<HashMap<String, ArtifactRecord>>,
    next_generation: AtomicU64,
}

/// Owns the registry of artifacts eligible for download.
///
/// Cheaply cloneable; clones share the same registry.
#[derive(Clone)]
pub struct ArtifactLifecycleManager {
    inner: Arc<Inner>,
}

impl ArtifactLifecycleManager {
    pub fn new(
        upload_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        expiry: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                upload_dir: upload_dir.into(),
                output_dir: output_dir.into(),
                expiry,
                registry: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.inner.upload_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.inner.output_dir
    }

    pub fn expiry(&self) -> Duration {
        self.inner.expiry
    }

    /// Location of a tracked artifact on disk.
    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.inner.output_dir.join(filename)
    }

    /// Starts (or restarts) the expiry window for `filename`.
    ///
    /// Tracking a name that is already tracked replaces its record and
    /// timer; the window is measured from this call.
    pub async fn track(&self, filename: &str) {
        let mut registry = self.inner.registry.lock().await;

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let timer = spawn_expiry_timer(
            Arc::downgrade(&self.inner),
            filename.to_string(),
            generation,
            self.inner.expiry,
        );
        let record = ArtifactRecord {
            created_at: Utc::now(),
            expires_at: Instant::now() + self.inner.expiry,
            generation,
            timer,
        };

        if let Some(previous) = registry.insert(filename.to_string(), record) {
            previous.timer.abort();
            tracing::debug!(filename, "Artifact re-tracked, expiry restarted");
        } else {
            tracing::debug!(
                filename,
                expiry_secs = self.inner.expiry.as_secs(),
                "Artifact tracked"
            );
        }
    }

    /// Whether `filename` may no longer be downloaded. Untracked names are
    /// always expired.
    pub async fn is_expired(&self, filename: &str) -> bool {
        let registry = self.inner.registry.lock().await;
        match registry.get(filename) {
            Some(record) => Instant::now() >= record.expires_at,
            None => true,
        }
    }

    /// Drops the record and cancels its timer without touching the file.
    /// Returns whether the name was tracked.
    pub async fn stop_tracking(&self, filename: &str) -> bool {
        let mut registry = self.inner.registry.lock().await;
        match registry.remove(filename) {
            Some(record) => {
                record.timer.abort();
                tracing::debug!(filename, "Artifact no longer tracked");
                true
            }
            None => false,
        }
    }

    /// Expires `filename` now: deletes the file if present and drops the
    /// record. Returns whether the name was tracked.
    pub async fn expire(&self, filename: &str) -> bool {
        let mut registry = self.inner.registry.lock().await;
        let Some(record) = registry.remove(filename) else {
            return false;
        };
        record.timer.abort();
        remove_artifact(&self.inner.output_dir.join(filename)).await;
        tracing::info!(filename, "Artifact expired");
        true
    }

    /// Empties the upload and output directories, creating them if needed.
    /// Returns the number of entries removed.
    pub async fn clear_on_startup(&self) -> io::Result<usize> {
        let mut removed = 0;
        for dir in [&self.inner.upload_dir, &self.inner.output_dir] {
            tokio::fs::create_dir_all(dir).await?;
            let mut entries = tokio::fs::read_dir(dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let result = match entry.file_type().await {
                    Ok(kind) if kind.is_dir() => tokio::fs::remove_dir_all(&path).await,
                    _ => tokio::fs::remove_file(&path).await,
                };
                match result {
                    Ok(()) => removed += 1,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Failed to remove stale entry")
                    }
                }
            }
        }
        tracing::info!(
            removed,
            upload_dir = %self.inner.upload_dir.display(),
            output_dir = %self.inner.output_dir.display(),
            "Startup sweep finished"
        );
        Ok(removed)
    }

    /// Cancels every timer and clears the registry. Files stay on disk for
    /// the next startup sweep.
    pub async fn shutdown(&self) {
        let mut registry = self.inner.registry.lock().await;
        let count = registry.len();
        for (_, record) in registry.drain() {
            record.timer.abort();
        }
        tracing::info!(cancelled = count, "Artifact lifecycle shut down");
    }

    pub async fn tracked_count(&self) -> usize {
        self.inner.registry.lock().await.len()
    }

    pub async fn stats(&self) -> LifecycleStats {
        let registry = self.inner.registry.lock().await;
        let oldest = registry
            .iter()
            .min_by_key(|(name, record)| (record.created_at, record.generation, *name))
            .map(|(name, _)| name.clone());
        let newest = registry
            .iter()
            .max_by_key(|(name, record)| (record.created_at, record.generation, *name))
            .map(|(name, _)| name.clone());
        LifecycleStats {
            tracked: registry.len(),
            oldest,
            newest,
            expiry_secs: self.inner.expiry.as_secs(),
        }
    }
}

fn spawn_expiry_timer(
    inner: Weak<Inner>,
    filename: String,
    generation: u64,
    expiry: Duration,
) -> AbortHandle {
    tokio::spawn(async move {
        tokio::time::sleep(expiry).await;
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let mut registry = inner.registry.lock().await;
        // A replaced or removed record is no longer this timer's business.
        match registry.get(&filename) {
            Some(record) if record.generation == generation => {}
            _ => return,
        }
        registry.remove(&filename);
        remove_artifact(&inner.output_dir.join(&filename)).await;
        metrics::ARTIFACTS_EXPIRED.inc();
        tracing::info!(filename = %filename, "Artifact expired");
    })
    .abort_handle()
}

/// Deletes an artifact, tolerating one that is already gone.
async fn remove_artifact(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to delete artifact"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager(dir: &TempDir, expiry: Duration) -> ArtifactLifecycleManager {
        ArtifactLifecycleManager::new(
            dir.path().join("uploads"),
            dir.path().join("converted"),
            expiry,
        )
    }

    fn artifact(manager: &ArtifactLifecycleManager, name: &str) -> PathBuf {
        std::fs::create_dir_all(manager.output_dir()).unwrap();
        let path = manager.path_for(name);
        std::fs::write(&path, b"data").unwrap();
        path
    }

    #[tokio::test]
    async fn test_untracked_is_expired() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, Duration::from_secs(60));
        assert!(manager.is_expired("never.txt").await);
        manager.track("never.txt").await;
        assert!(!manager.is_expired("never.txt").await);
    }

    #[tokio::test]
    async fn test_expiry_deletes_file_and_record() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, Duration::from_millis(100));
        let path = artifact(&manager, "a.md");

        manager.track("a.md").await;
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert!(manager.is_expired("a.md").await);
        assert_eq!(manager.tracked_count().await, 0);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_retrack_replaces_and_restarts_window() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, Duration::from_millis(300));
        let path = artifact(&manager, "b.md");

        manager.track("b.md").await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        manager.track("b.md").await;
        assert_eq!(manager.tracked_count().await, 1);

        // Past the first window, inside the second.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!manager.is_expired("b.md").await);
        assert!(path.exists());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(manager.is_expired("b.md").await);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_stop_tracking_keeps_file() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, Duration::from_millis(100));
        let path = artifact(&manager, "c.md");

        manager.track("c.md").await;
        assert!(manager.stop_tracking("c.md").await);
        assert!(manager.is_expired("c.md").await);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(path.exists());
        assert!(!manager.stop_tracking("c.md").await);
    }

    #[tokio::test]
    async fn test_expire_tolerates_missing_file() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, Duration::from_secs(60));
        manager.track("ghost.md").await;
        assert!(manager.expire("ghost.md").await);
        assert!(!manager.expire("ghost.md").await);
        assert!(manager.is_expired("ghost.md").await);
    }

    #[tokio::test]
    async fn test_clear_on_startup_empties_both_directories() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, Duration::from_secs(60));
        std::fs::create_dir_all(manager.upload_dir().join("nested")).unwrap();
        std::fs::write(manager.upload_dir().join("nested/x"), b"x").unwrap();
        std::fs::write(manager.upload_dir().join("y"), b"y").unwrap();
        artifact(&manager, "z.md");

        let removed = manager.clear_on_startup().await.unwrap();
        assert_eq!(removed, 3);
        assert_eq!(std::fs::read_dir(manager.upload_dir()).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(manager.output_dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_clear_on_startup_creates_missing_directories() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, Duration::from_secs(60));
        assert_eq!(manager.clear_on_startup().await.unwrap(), 0);
        assert!(manager.upload_dir().is_dir());
        assert!(manager.output_dir().is_dir());
    }

    #[tokio::test]
    async fn test_shutdown_cancels_timers_and_keeps_files() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, Duration::from_millis(100));
        let path = artifact(&manager, "d.md");
        manager.track("d.md").await;

        manager.shutdown().await;
        assert_eq!(manager.tracked_count().await, 0);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_stats_report_oldest_and_newest() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, Duration::from_secs(300));
        assert_eq!(
            manager.stats().await,
            LifecycleStats {
                tracked: 0,
                oldest: None,
                newest: None,
                expiry_secs: 300,
            }
        );

        manager.track("first.md").await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        manager.track("second.md").await;

        let stats = manager.stats().await;
        assert_eq!(stats.tracked, 2);
        assert_eq!(stats.oldest.as_deref(), Some("first.md"));
        assert_eq!(stats.newest.as_deref(), Some("second.md"));
    }
}
