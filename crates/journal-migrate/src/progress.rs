//! Run status and progress tracking.
//!
//! A [`ProgressTracker`] is created by whoever orchestrates runs and shared
//! with the engines through an `Arc`. It is a small state machine
//! (`Idle -> InProgress -> Completed | Failed`, `reset` back to `Idle`) that
//! pushes a [`Snapshot`] to every listener on each change. It also enforces
//! the one-run-at-a-time rule through [`ProgressTracker::begin_run`].

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Status of the current run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// No run has started since the last reset.
    #[default]
    Idle,
    /// A run is active.
    InProgress,
    /// The last run finished without failures.
    Completed,
    /// The last run aborted or finished with per-record failures.
    Failed,
}

/// Progress counters of the current run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Records processed so far.
    pub current: usize,
    /// Records to process in this run, summed over the entities started so far.
    pub total: usize,
    /// Entity being processed.
    pub entity: String,
    /// Free-form status line.
    pub detail: String,
}

/// What listeners receive on every change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Current status.
    pub status: RunStatus,
    /// Current progress.
    pub progress: Progress,
    /// Error message of an aborted run.
    pub error: Option<String>,
}

type Listener = Arc<dyn Fn(&Snapshot) + Send + Sync>;

#[derive(Default)]
struct Inner {
    snapshot: Snapshot,
    listeners: Vec<(u64, Listener)>,
    next_listener_id: u64,
}

/// Shared run state with an observer list.
#[derive(Default)]
pub struct ProgressTracker {
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ProgressTracker")
            .field("snapshot", &inner.snapshot)
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}

impl ProgressTracker {
    /// Creates an idle tracker wrapped for sharing.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.inner.lock().snapshot.clone()
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.inner.lock().snapshot.status
    }

    /// Registers a listener. Listeners are called in registration order.
    pub fn add_listener<F>(self: &Arc<Self>, callback: F) -> ListenerHandle
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        let id = inner.next_listener_id;
        inner.next_listener_id += 1;
        inner.listeners.push((id, Arc::new(callback)));
        ListenerHandle {
            tracker: Arc::downgrade(self),
            id,
        }
    }

    /// Starts a run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RunInProgress`] if a run is already active; the active
    /// run's state is left untouched.
    pub fn begin_run(&self, detail: impl Into<String>) -> Result<()> {
        self.update(|s| {
            if s.status == RunStatus::InProgress {
                return Err(Error::RunInProgress);
            }
            *s = Snapshot {
                status: RunStatus::InProgress,
                progress: Progress {
                    detail: detail.into(),
                    ..Progress::default()
                },
                error: None,
            };
            Ok(())
        })
    }

    /// Sets the status and detail line.
    pub fn set_status(&self, status: RunStatus, detail: impl Into<String>) {
        let detail = detail.into();
        let _ = self.update(|s| {
            s.status = status;
            s.progress.detail = detail;
            Ok(())
        });
    }

    /// Sets the progress counters for an entity.
    pub fn set_progress(&self, current: usize, total: usize, entity: impl Into<String>) {
        let entity = entity.into();
        let _ = self.update(|s| {
            s.progress.current = current;
            s.progress.total = total;
            s.progress.entity = entity;
            Ok(())
        });
    }

    /// Starts the next entity of the run: adds `total` records to the run's
    /// total and keeps `current`, so progress stays monotonic across entities.
    pub fn start_entity(&self, total: usize, entity: impl Into<String>) {
        let entity = entity.into();
        let _ = self.update(|s| {
            s.progress.total += total;
            s.progress.entity = entity;
            Ok(())
        });
    }

    /// Advances `current` by `n`, never past `total`.
    pub fn advance(&self, n: usize) {
        let _ = self.update(|s| {
            s.progress.current = (s.progress.current + n).min(s.progress.total);
            Ok(())
        });
    }

    /// Records a run-level error and marks the run failed.
    pub fn set_error(&self, error: impl Into<String>) {
        let error = error.into();
        let _ = self.update(|s| {
            s.status = RunStatus::Failed;
            s.progress.detail = error.clone();
            s.error = Some(error);
            Ok(())
        });
    }

    /// Returns to `Idle` with cleared progress.
    pub fn reset(&self) {
        let _ = self.update(|s| {
            *s = Snapshot::default();
            Ok(())
        });
    }

    /// Applies a change and notifies listeners outside the lock, so that a
    /// listener may read the tracker or unsubscribe itself.
    fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut Snapshot) -> Result<()>,
    {
        let (snapshot, listeners) = {
            let mut inner = self.inner.lock();
            change(&mut inner.snapshot)?;
            let listeners: Vec<Listener> =
                inner.listeners.iter().map(|(_, l)| Arc::clone(l)).collect();
            (inner.snapshot.clone(), listeners)
        };
        for listener in listeners {
            listener(&snapshot);
        }
        Ok(())
    }

    fn remove_listener(&self, id: u64) {
        self.inner.lock().listeners.retain(|(lid, _)| *lid != id);
    }
}

/// Handle returned by [`ProgressTracker::add_listener`].
#[derive(Debug)]
pub struct ListenerHandle {
    tracker: std::sync::Weak<ProgressTracker>,
    id: u64,
}

impl ListenerHandle {
    /// Removes the listener. Dropping the handle keeps it registered.
    pub fn unsubscribe(self) {
        if let Some(tracker) = self.tracker.upgrade() {
            tracker.remove_listener(self.id);
        }
    }
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
