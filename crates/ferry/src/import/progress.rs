//! Live progress reporting for a running import.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// Counters visible to the caller while a job runs.
///
/// Counts only ever increase during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportProgress {
    /// Containers finished.
    pub items_imported: usize,
    /// Containers selected for import.
    pub items_total: usize,
    /// Items (messages/issues/tasks) processed.
    pub sub_items_imported: usize,
    /// Items fetched so far.
    pub sub_items_total: usize,
    pub users_imported: usize,
    pub files_imported: usize,
    /// Human-readable description of what the run is doing.
    pub current_step: String,
}

/// Callback receiving a progress snapshot after each update.
pub type ProgressCallback = Box<dyn Fn(&ImportProgress) + Send + Sync>;

/// Emit a progress snapshot if a callback is provided.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, progress: &ImportProgress) {
    if let Some(cb) = on_progress {
        cb(progress);
    }
}

/// Single owner of the progress counters for one run.
///
/// Concurrent container tasks funnel their updates through here; each
/// update publishes one snapshot.
pub(crate) struct ProgressTracker {
    state: Mutex<ImportProgress>,
    callback: Option<Arc<ProgressCallback>>,
}

impl ProgressTracker {
    pub(crate) fn new(callback: Option<Arc<ProgressCallback>>) -> Self {
        Self {
            state: Mutex::new(ImportProgress::default()),
            callback,
        }
    }

    /// Apply an update and publish the resulting snapshot.
    pub(crate) fn update(&self, f: impl FnOnce(&mut ImportProgress)) {
        let snapshot = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            f(&mut state);
            state.clone()
        };
        emit(self.callback.as_deref(), &snapshot);
    }

    pub(crate) fn step(&self, step: impl Into<String>) {
        let step = step.into();
        self.update(|p| p.current_step = step);
    }

    pub(crate) fn snapshot(&self) -> ImportProgress {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
