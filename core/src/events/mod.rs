//! Typed notifications emitted while a build tree executes.
//!
//! Events from sibling subtrees interleave freely; only the per-node order
//! `BuildStart -> (CommandStart, BuildLog*, CommandComplete)* -> BuildComplete`
//! is guaranteed.

mod bus;

pub use bus::{BuildObserver, ChannelObserver, EventBus};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{
    BuildArtifacts, BuildFailure, BuildKind, BuildPhase, BuildStatus, TestResults,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum BuildEvent {
    #[serde(rename_all = "camelCase")]
    BuildStart {
        build_id: String,
        kind: BuildKind,
        parent_id: Option<String>,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    BuildComplete {
        build_id: String,
        status: BuildStatus,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    BuildError {
        build_id: String,
        error: BuildFailure,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    BuildLog {
        build_id: String,
        level: LogLevel,
        message: String,
        source: BuildPhase,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    CommandStart {
        build_id: String,
        command: String,
        phase: BuildPhase,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    CommandComplete {
        build_id: String,
        command: String,
        phase: BuildPhase,
        #[serde(skip_serializing_if = "Option::is_none")]
        results: Option<TestResults>,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    BuildCancelled {
        build_id: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    ArtifactsCollected {
        build_id: String,
        artifacts: BuildArtifacts,
        timestamp: DateTime<Utc>,
    },
}

impl BuildEvent {
    pub fn build_id(&self) -> &str {
        match self {
            BuildEvent::BuildStart { build_id, .. }
            | BuildEvent::BuildComplete { build_id, .. }
            | BuildEvent::BuildError { build_id, .. }
            | BuildEvent::BuildLog { build_id, .. }
            | BuildEvent::CommandStart { build_id, .. }
            | BuildEvent::CommandComplete { build_id, .. }
            | BuildEvent::BuildCancelled { build_id, .. }
            | BuildEvent::ArtifactsCollected { build_id, .. } => build_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            BuildEvent::BuildStart { timestamp, .. }
            | BuildEvent::BuildComplete { timestamp, .. }
            | BuildEvent::BuildError { timestamp, .. }
            | BuildEvent::BuildLog { timestamp, .. }
            | BuildEvent::CommandStart { timestamp, .. }
            | BuildEvent::CommandComplete { timestamp, .. }
            | BuildEvent::BuildCancelled { timestamp, .. }
            | BuildEvent::ArtifactsCollected { timestamp, .. } => *timestamp,
        }
    }

    /// Wire name, e.g. `buildStart`.
    pub fn name(&self) -> &'static str {
        match self {
            BuildEvent::BuildStart { .. } => "buildStart",
            BuildEvent::BuildComplete { .. } => "buildComplete",
            BuildEvent::BuildError { .. } => "buildError",
            BuildEvent::BuildLog { .. } => "buildLog",
            BuildEvent::CommandStart { .. } => "commandStart",
            BuildEvent::CommandComplete { .. } => "commandComplete",
            BuildEvent::BuildCancelled { .. } => "buildCancelled",
            BuildEvent::ArtifactsCollected { .. } => "artifactsCollected",
        }
    }
}
