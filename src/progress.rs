use std::sync::{
    Arc,
    PoisonError,
    RwLock,
    atomic::{AtomicBool, Ordering},
};

use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionStatus {
    #[default]
    Idle,
    InProgress,
    Completed,
    Error,
}

impl std::fmt::Display for IngestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// State of the most recent ingestion job.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct IngestionProgress {
    pub total_rows: u64,
    pub processed_rows: u64,
    pub status: IngestionStatus,
    pub error: Option<String>,
    pub columns: Vec<String>,
    pub current_file: Option<String>,
}

impl IngestionProgress {
    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            IngestionStatus::Completed | IngestionStatus::Error
        )
    }
}

/// Shared progress of the current (or last) ingestion.
///
/// Writers mutate under a write lock and readers get an owned copy, so a
/// snapshot never mixes fields from two updates.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    state: RwLock<IngestionProgress>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to `idle` with everything cleared.
    pub fn reset(&self) {
        self.update(|p| *p = IngestionProgress::default());
    }

    /// Start tracking a new job, replacing whatever was tracked before.
    pub fn begin(&self, filename: &str) {
        self.update(|p| {
            *p = IngestionProgress {
                status: IngestionStatus::InProgress,
                current_file: Some(filename.to_string()),
                ..IngestionProgress::default()
            }
        });
    }

    pub fn get(&self) -> IngestionProgress {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Apply a partial update atomically.
    pub fn update(&self, apply: impl FnOnce(&mut IngestionProgress)) {
        let mut state =
            self.state.write().unwrap_or_else(PoisonError::into_inner);
        apply(&mut state);
    }
}

/// At most one ingestion may hold the slot at a time.
#[derive(Debug, Clone, Default)]
pub struct IngestionSlot {
    busy: Arc<AtomicBool>,
}

impl IngestionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot without waiting. The slot is released when the
    /// returned guard is dropped, which may happen on another thread.
    pub fn try_acquire(&self) -> Result<SlotGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::IngestionBusy)?;
        Ok(SlotGuard {
            busy: Arc::clone(&self.busy),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct SlotGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        let tracker = ProgressTracker::new();
        let snapshot = tracker.get();
        assert_eq!(snapshot.status, IngestionStatus::Idle);
        assert_eq!(snapshot.processed_rows, 0);
        assert_eq!(snapshot.current_file, None);
    }

    #[test]
    fn begin_overwrites_the_previous_job() {
        let tracker = ProgressTracker::new();
        tracker.begin("old.csv");
        tracker.update(|p| {
            p.total_rows = 10;
            p.processed_rows = 10;
            p.columns = vec!["a".into()];
            p.status = IngestionStatus::Error;
            p.error = Some("boom".into());
        });

        tracker.begin("new.csv");
        let snapshot = tracker.get();
        assert_eq!(snapshot.status, IngestionStatus::InProgress);
        assert_eq!(snapshot.current_file.as_deref(), Some("new.csv"));
        assert_eq!(snapshot.total_rows, 0);
        assert_eq!(snapshot.processed_rows, 0);
        assert!(snapshot.columns.is_empty());
        assert_eq!(snapshot.error, None);
    }

    #[test]
    fn reset_returns_to_idle() {
        let tracker = ProgressTracker::new();
        tracker.begin("a.csv");
        tracker.reset();
        assert_eq!(tracker.get(), IngestionProgress::default());
    }

    #[test]
    fn update_is_partial() {
        let tracker = ProgressTracker::new();
        tracker.begin("a.csv");
        tracker.update(|p| p.processed_rows = 5);
        let snapshot = tracker.get();
        assert_eq!(snapshot.processed_rows, 5);
        assert_eq!(snapshot.current_file.as_deref(), Some("a.csv"));
    }

    #[test]
    fn readers_never_see_torn_snapshots() {
        let tracker = Arc::new(ProgressTracker::new());
        tracker.begin("a.csv");

        let writer = {
            let tracker = Arc::clone(&tracker);
            std::thread::spawn(move || {
                for i in 1..=2_000u64 {
                    tracker.update(|p| {
                        p.total_rows = i;
                        p.processed_rows = i;
                    });
                }
            })
        };

        let mut last = 0;
        while !writer.is_finished() {
            let snapshot = tracker.get();
            assert_eq!(snapshot.total_rows, snapshot.processed_rows);
            assert!(snapshot.processed_rows >= last);
            last = snapshot.processed_rows;
        }
        writer.join().unwrap();
        assert_eq!(tracker.get().processed_rows, 2_000);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&IngestionStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        assert_eq!(IngestionStatus::InProgress.to_string(), "in_progress");
    }

    #[test]
    fn slot_admits_one_holder() {
        let slot = IngestionSlot::new();
        let guard = slot.try_acquire().unwrap();
        assert!(slot.is_busy());
        assert!(matches!(slot.try_acquire(), Err(Error::IngestionBusy)));

        drop(guard);
        assert!(!slot.is_busy());
        assert!(slot.try_acquire().is_ok());
    }

    #[test]
    fn slot_guard_can_be_released_on_another_thread() {
        let slot = IngestionSlot::new();
        let guard = slot.try_acquire().unwrap();
        std::thread::spawn(move || drop(guard)).join().unwrap();
        assert!(!slot.is_busy());
    }
}
