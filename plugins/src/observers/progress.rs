use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tierbuild_core::events::{BuildEvent, BuildObserver};
use tierbuild_core::model::BuildStatus;

/// Terminal progress for a build tree: one overall bar counting finished
/// nodes and a spinner per node that is currently running.
pub struct ProgressObserver {
    multi: MultiProgress,
    overall: ProgressBar,
    state: Mutex<ProgressState>,
}

#[derive(Default)]
struct ProgressState {
    node_bars: HashMap<String, ProgressBar>,
    root_id: Option<String>,
    failed: u64,
}

impl ProgressObserver {
    /// `total_builds` is the node count of the tree about to run.
    /// A disabled observer draws nothing but still counts.
    pub fn new(total_builds: usize, enabled: bool) -> Self {
        let target = if enabled {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        let multi = MultiProgress::with_draw_target(target);
        let overall = multi.add(ProgressBar::new(total_builds as u64));
        overall.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} builds ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓▒░  "),
        );
        overall.set_message("Starting...");

        Self {
            multi,
            overall,
            state: Mutex::new(ProgressState::default()),
        }
    }

    /// Builds finished so far.
    pub fn finished(&self) -> u64 {
        self.overall.position()
    }

    pub fn running(&self) -> usize {
        self.lock().node_bars.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProgressState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn start_node(&self, build_id: &str, is_root: bool) {
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        bar.set_message(format!("⏳ {build_id}"));
        bar.enable_steady_tick(Duration::from_millis(100));

        let mut state = self.lock();
        if is_root {
            state.root_id = Some(build_id.to_string());
        }
        state.node_bars.insert(build_id.to_string(), bar);
    }

    fn complete_node(&self, build_id: &str, status: BuildStatus, duration_ms: u64) {
        let mut state = self.lock();
        if let Some(bar) = state.node_bars.remove(build_id) {
            let icon = match status {
                BuildStatus::Passed => "✅",
                BuildStatus::Failed => "❌",
                _ => "⏭",
            };
            bar.finish_with_message(format!("{icon} {build_id} ({duration_ms}ms)"));
        }
        if status == BuildStatus::Failed {
            state.failed += 1;
        }
        self.overall.inc(1);

        if state.root_id.as_deref() == Some(build_id) {
            let msg = if status == BuildStatus::Failed {
                format!("❌ {} builds failed", state.failed)
            } else {
                "✅ All builds completed".to_string()
            };
            self.overall.finish_with_message(msg);
        }
    }
}

impl BuildObserver for ProgressObserver {
    fn name(&self) -> &str {
        "progress"
    }

    fn on_event(&self, event: &BuildEvent) {
        match event {
            BuildEvent::BuildStart {
                build_id,
                parent_id,
                ..
            } => self.start_node(build_id, parent_id.is_none()),
            BuildEvent::BuildComplete {
                build_id,
                status,
                duration_ms,
                ..
            } => self.complete_node(build_id, *status, *duration_ms),
            BuildEvent::CommandStart {
                build_id, phase, ..
            } => {
                if let Some(bar) = self.lock().node_bars.get(build_id) {
                    bar.set_message(format!("⏳ {build_id} ({phase})"));
                }
            }
            _ => {}
        }
    }
}

impl Drop for ProgressObserver {
    fn drop(&mut self) {
        if !self.overall.is_finished() {
            self.overall.abandon();
        }
    }
}
