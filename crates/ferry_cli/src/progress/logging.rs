use std::sync::Mutex;

use ferry::import::ImportProgress;

/// Logging reporter using tracing for structured output.
///
/// Step changes are logged at info level, counter-only updates at debug.
pub struct LoggingReporter {
    last_step: Mutex<String>,
}

impl LoggingReporter {
    pub fn new() -> Self {
        Self {
            last_step: Mutex::new(String::new()),
        }
    }

    pub fn handle(&self, progress: &ImportProgress) {
        let mut last_step = self.last_step.lock().unwrap_or_else(|e| e.into_inner());
        if *last_step != progress.current_step {
            tracing::info!(
                containers = progress.items_imported,
                containers_total = progress.items_total,
                items = progress.sub_items_imported,
                items_total = progress.sub_items_total,
                "{}",
                progress.current_step
            );
            last_step.clone_from(&progress.current_step);
        } else {
            tracing::debug!(
                items = progress.sub_items_imported,
                items_total = progress.sub_items_total,
                files = progress.files_imported,
                "Import progress"
            );
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
