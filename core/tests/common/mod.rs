#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tierbuild_core::config::ExecutorConfig;
use tierbuild_core::events::{BuildEvent, BuildObserver};
use tierbuild_core::executor::BuildExecutor;
use tierbuild_core::model::{BuildKind, BuildNodeConfig};

/// Keeps every event in arrival order.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<BuildEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<BuildEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn names_for(&self, build_id: &str) -> Vec<&'static str> {
        self.events()
            .iter()
            .filter(|e| e.build_id() == build_id)
            .map(|e| e.name())
            .collect()
    }

    pub fn started(&self, build_id: &str) -> bool {
        self.names_for(build_id).contains(&"buildStart")
    }

    /// Largest number of nodes of `kind` seen between their start and
    /// completion events at the same time.
    pub fn peak_concurrency(&self, kind: BuildKind) -> usize {
        let mut running: Vec<String> = Vec::new();
        let mut peak = 0;
        for event in self.events() {
            match event {
                BuildEvent::BuildStart {
                    build_id, kind: k, ..
                } if k == kind => {
                    running.push(build_id);
                    peak = peak.max(running.len());
                }
                BuildEvent::BuildComplete { build_id, .. } => {
                    running.retain(|id| id != &build_id);
                }
                _ => {}
            }
        }
        peak
    }
}

impl BuildObserver for RecordingObserver {
    fn name(&self) -> &str {
        "recording"
    }

    fn on_event(&self, event: &BuildEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

pub fn recording_executor() -> (BuildExecutor, Arc<RecordingObserver>) {
    let observer = RecordingObserver::new();
    let executor = BuildExecutor::builder(ExecutorConfig::default())
        .observer(observer.clone())
        .build();
    (executor, observer)
}

pub fn story(id: &str) -> BuildNodeConfig {
    BuildNodeConfig::new(id, BuildKind::Story)
}

pub fn jest_summary(passed: u64, failed: u64) -> String {
    format!(
        "echo 'Tests: {passed} passed, {failed} failed, 0 skipped, {} total'",
        passed + failed
    )
}

/// Writes an istanbul `json-summary` where every metric has the given counters.
pub fn write_coverage_summary(dir: &std::path::Path, total: u64, covered: u64) {
    let metric = format!(r#"{{"total":{total},"covered":{covered},"skipped":0,"pct":0}}"#);
    let json = format!(
        r#"{{"total":{{"lines":{metric},"statements":{metric},"functions":{metric},"branches":{metric}}}}}"#
    );
    std::fs::create_dir_all(dir.join("coverage")).unwrap();
    std::fs::write(dir.join("coverage/coverage-summary.json"), json).unwrap();
}

/// Polls until the live commands are exactly `expected` (sorted ids),
/// failing after five seconds.
pub async fn wait_for_active(executor: &BuildExecutor, expected: &[&str]) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let active = executor.active_builds();
        if active == expected {
            return;
        }
        assert!(Instant::now() < deadline, "expected {expected:?} running, saw {active:?}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
