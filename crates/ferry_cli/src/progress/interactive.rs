use std::sync::Mutex;

use ferry::import::ImportProgress;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

#[derive(Default)]
struct ProgressState {
    /// Containers finished out of containers selected.
    container_bar: Option<ProgressBar>,
    /// Items processed, with the current step as message.
    item_bar: Option<ProgressBar>,
}

/// Interactive progress reporter using indicatif.
pub struct InteractiveReporter {
    multi: MultiProgress,
    state: Mutex<ProgressState>,
}

impl InteractiveReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            state: Mutex::new(ProgressState::default()),
        }
    }

    pub fn handle(&self, progress: &ImportProgress) {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let state = &mut *guard;

        let item_bar = state.item_bar.get_or_insert_with(|| {
            let bar = self.multi.add(ProgressBar::new_spinner());
            bar.set_style(Self::counter_style());
            bar.set_prefix("items");
            bar.enable_steady_tick(std::time::Duration::from_millis(100));
            bar
        });
        item_bar.set_position(progress.sub_items_imported as u64);
        item_bar.set_message(progress.current_step.clone());

        if progress.items_total > 0 {
            // Containers sit above the item spinner once their count is known.
            let container_bar = state.container_bar.get_or_insert_with(|| {
                let bar = self
                    .multi
                    .insert_before(item_bar, ProgressBar::new(progress.items_total as u64));
                bar.set_style(Self::bar_style());
                bar.set_prefix("containers");
                bar
            });
            container_bar.set_length(progress.items_total as u64);
            container_bar.set_position(progress.items_imported as u64);
        }
    }

    pub fn finish(&self) {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(ref pb) = state.container_bar
            && !pb.is_finished()
        {
            pb.finish();
        }
        if let Some(ref pb) = state.item_bar
            && !pb.is_finished()
        {
            pb.finish_and_clear();
        }
    }

    fn counter_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.cyan} {spinner:.green} {pos:>5} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos:>3}/{len:3}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░")
    }
}

impl Default for InteractiveReporter {
    fn default() -> Self {
        Self::new()
    }
}
