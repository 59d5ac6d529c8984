use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::model::BuildPhase;

/// One shell command to run on behalf of a build node.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub build_id: String,
    pub command: String,
    pub phase: BuildPhase,
    pub cwd: PathBuf,
    /// Merged on top of the inherited process environment.
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration_ms: u64,
}
