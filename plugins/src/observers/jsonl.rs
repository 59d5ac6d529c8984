use std::io::Write;
use std::sync::Mutex;

use serde_json::{json, Value};
use tierbuild_core::events::{BuildEvent, BuildObserver};

/// Writes one JSON object per event to the wrapped writer.
pub struct JsonlEventObserver<W: Write + Send> {
    writer: Mutex<W>,
    pretty_print: bool,
}

impl JsonlEventObserver<std::io::Stdout> {
    pub fn stdout(pretty_print: bool) -> Self {
        Self::new(std::io::stdout(), pretty_print)
    }
}

impl<W: Write + Send> JsonlEventObserver<W> {
    pub fn new(writer: W, pretty_print: bool) -> Self {
        Self {
            writer: Mutex::new(writer),
            pretty_print,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    fn event_to_json(&self, event: &BuildEvent) -> Value {
        let ts = event.timestamp().to_rfc3339();
        let build_id = event.build_id();
        let metadata = match event {
            BuildEvent::BuildStart {
                kind, parent_id, ..
            } => json!({
                "kind": kind,
                "parent_id": parent_id,
            }),
            BuildEvent::BuildComplete {
                status,
                duration_ms,
                ..
            } => json!({
                "status": status,
                "duration_ms": duration_ms,
            }),
            BuildEvent::BuildError { error, .. } => json!({
                "message": error.message,
                "phase": error.phase,
            }),
            BuildEvent::BuildLog {
                level,
                message,
                source,
                ..
            } => json!({
                "level": level,
                "message": message,
                "source": source,
            }),
            BuildEvent::CommandStart { command, phase, .. } => json!({
                "command": command,
                "phase": phase,
            }),
            BuildEvent::CommandComplete {
                command,
                phase,
                results,
                ..
            } => json!({
                "command": command,
                "phase": phase,
                "results": results,
            }),
            BuildEvent::BuildCancelled { .. } => json!({}),
            BuildEvent::ArtifactsCollected { artifacts, .. } => json!({
                "count": artifacts.len(),
                "artifacts": artifacts,
            }),
        };
        json!({
            "v": 1,
            "event_type": event.name(),
            "ts": ts,
            "build_id": build_id,
            "metadata": metadata,
        })
    }
}

impl<W: Write + Send> BuildObserver for JsonlEventObserver<W> {
    fn name(&self) -> &str {
        "jsonl"
    }

    fn on_event(&self, event: &BuildEvent) {
        let value = self.event_to_json(event);
        let line = if self.pretty_print {
            serde_json::to_string_pretty(&value)
        } else {
            serde_json::to_string(&value)
        }
        .unwrap_or_else(|_| "{}".into());

        let mut w = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = writeln!(w, "{line}").and_then(|_| w.flush()) {
            tracing::debug!(error = %e, "jsonl observer write failed");
        }
    }
}
