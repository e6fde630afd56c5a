//! # Sample Library
//!
//! The demo ships a handful of well-known sample clips under a static asset
//! root. At startup each one is prefetched into memory by its own tokio task
//! so the UI can list and play them without touching disk per request.
//!
//! ## Failure policy:
//! A sample that cannot be read (missing file, timeout) is recorded as
//! `failed` with its reason and logged — it never blocks startup, the other
//! samples, or the predict path. Statuses are observable through
//! `GET /api/v1/samples` instead of disappearing into the log.

use crate::error::PipelineError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Per-item prefetch state.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum SampleStatus {
    Pending,
    Ready,
    Failed(String),
}

#[derive(Debug)]
struct SampleSlot {
    status: SampleStatus,
    bytes: Option<Vec<u8>>,
}

/// Prefetched sample clips with independently-trackable fetch tasks.
pub struct SampleLibrary {
    dir: PathBuf,
    slots: Arc<RwLock<HashMap<String, SampleSlot>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    fetch_timeout: Duration,
}

impl SampleLibrary {
    pub fn new(dir: impl Into<PathBuf>, files: &[String], fetch_timeout: Duration) -> Self {
        let slots = files
            .iter()
            .map(|name| {
                (
                    name.clone(),
                    SampleSlot {
                        status: SampleStatus::Pending,
                        bytes: None,
                    },
                )
            })
            .collect();

        Self {
            dir: dir.into(),
            slots: Arc::new(RwLock::new(slots)),
            handles: Mutex::new(Vec::new()),
            fetch_timeout,
        }
    }

    /// Spawn one fetch task per configured sample.
    ///
    /// Tasks run independently; each is abortable and reports its outcome
    /// into the shared status map.
    pub fn start_prefetch(&self) {
        let names: Vec<String> = {
            let slots = self.slots.read().unwrap();
            slots.keys().cloned().collect()
        };

        let mut handles = self.handles.lock().unwrap();
        for name in names {
            let path = self.dir.join(&name);
            let slots = Arc::clone(&self.slots);
            let timeout = self.fetch_timeout;

            handles.push(tokio::spawn(async move {
                let outcome = match tokio::time::timeout(timeout, tokio::fs::read(&path)).await {
                    Err(_) => Err(PipelineError::Fetch(format!(
                        "timed out reading {} after {:.0}s",
                        path.display(),
                        timeout.as_secs_f64()
                    ))),
                    Ok(Err(e)) => Err(PipelineError::Fetch(format!(
                        "failed to read {}: {}",
                        path.display(),
                        e
                    ))),
                    Ok(Ok(bytes)) => Ok(bytes),
                };

                let mut slots = slots.write().unwrap();
                if let Some(slot) = slots.get_mut(&name) {
                    match outcome {
                        Ok(bytes) => {
                            info!("sample '{}' ready ({} bytes)", name, bytes.len());
                            slot.status = SampleStatus::Ready;
                            slot.bytes = Some(bytes);
                        }
                        Err(e) => {
                            warn!("sample '{}' unavailable: {}", name, e);
                            slot.status = SampleStatus::Failed(e.to_string());
                        }
                    }
                }
            }));
        }
    }

    /// Snapshot of every sample's status, sorted by name.
    pub fn statuses(&self) -> Vec<(String, SampleStatus)> {
        let slots = self.slots.read().unwrap();
        let mut out: Vec<(String, SampleStatus)> = slots
            .iter()
            .map(|(name, slot)| (name.clone(), slot.status.clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Counts of (ready, pending, failed) samples, for the health report.
    pub fn status_counts(&self) -> (usize, usize, usize) {
        let slots = self.slots.read().unwrap();
        let mut counts = (0, 0, 0);
        for slot in slots.values() {
            match slot.status {
                SampleStatus::Ready => counts.0 += 1,
                SampleStatus::Pending => counts.1 += 1,
                SampleStatus::Failed(_) => counts.2 += 1,
            }
        }
        counts
    }

    /// The prefetched bytes of a ready sample.
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        let slots = self.slots.read().unwrap();
        slots.get(name).and_then(|slot| slot.bytes.clone())
    }

    pub fn status_of(&self, name: &str) -> Option<SampleStatus> {
        let slots = self.slots.read().unwrap();
        slots.get(name).map(|slot| slot.status.clone())
    }

    /// Wait for all outstanding fetch tasks to settle.
    pub async fn wait_for_prefetch(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut guard = self.handles.lock().unwrap();
            guard.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Abort any fetch still in flight (used on shutdown).
    pub fn abort_all(&self) {
        let mut handles = self.handles.lock().unwrap();
        for handle in handles.drain(..) {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prefetch_reports_per_item_status() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("present.wav"), b"RIFFfake").unwrap();

        let library = SampleLibrary::new(
            dir.path(),
            &["present.wav".to_string(), "missing.wav".to_string()],
            Duration::from_secs(5),
        );
        library.start_prefetch();
        library.wait_for_prefetch().await;

        assert_eq!(
            library.status_of("present.wav"),
            Some(SampleStatus::Ready)
        );
        assert!(matches!(
            library.status_of("missing.wav"),
            Some(SampleStatus::Failed(_))
        ));
        assert_eq!(library.get("present.wav").unwrap(), b"RIFFfake");
        assert!(library.get("missing.wav").is_none());

        let (ready, pending, failed) = library.status_counts();
        assert_eq!((ready, pending, failed), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_statuses_are_sorted_and_complete() {
        let dir = tempfile::tempdir().unwrap();
        let library = SampleLibrary::new(
            dir.path(),
            &["b.wav".to_string(), "a.wav".to_string()],
            Duration::from_secs(1),
        );

        let statuses = library.statuses();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].0, "a.wav");
        assert!(statuses.iter().all(|(_, s)| *s == SampleStatus::Pending));
    }

    #[tokio::test]
    async fn test_unknown_sample_has_no_status() {
        let dir = tempfile::tempdir().unwrap();
        let library = SampleLibrary::new(dir.path(), &[], Duration::from_secs(1));
        assert!(library.status_of("nope.wav").is_none());
    }
}
