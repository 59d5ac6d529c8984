use serde::{Deserialize, Serialize};

use crate::model::{BuildKind, ExecutionOrder};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Program and leading args used to run a command string, e.g. `["sh", "-c"]`.
    #[serde(default = "default_shell")]
    pub shell: Vec<String>,

    /// Tail bytes of stdout/stderr retained per command.
    #[serde(default = "default_capture_bytes")]
    pub capture_bytes: usize,

    #[serde(default = "default_line_channel_capacity")]
    pub line_channel_capacity: usize,

    /// How long to keep draining output after a process exits or is killed.
    #[serde(default = "default_io_drain_timeout_ms")]
    pub io_drain_timeout_ms: u64,

    /// istanbul `json-summary` file read after a successful test command,
    /// relative to the node's working directory.
    #[serde(default = "default_coverage_summary_path")]
    pub coverage_summary_path: String,

    #[serde(default)]
    pub parallelism: ParallelismDefaults,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_shell() -> Vec<String> {
    if cfg!(windows) {
        vec!["cmd".to_string(), "/C".to_string()]
    } else {
        vec!["sh".to_string(), "-c".to_string()]
    }
}

fn default_capture_bytes() -> usize {
    1024 * 1024
}

fn default_line_channel_capacity() -> usize {
    1024
}

fn default_io_drain_timeout_ms() -> u64 {
    2_000
}

fn default_coverage_summary_path() -> String {
    "coverage/coverage-summary.json".to_string()
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            capture_bytes: default_capture_bytes(),
            line_channel_capacity: default_line_channel_capacity(),
            io_drain_timeout_ms: default_io_drain_timeout_ms(),
            coverage_summary_path: default_coverage_summary_path(),
            parallelism: ParallelismDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Execution order applied to nodes that don't set `executionOrder`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelismDefaults {
    #[serde(default = "default_epic_order")]
    pub epic: ExecutionOrder,

    #[serde(default = "default_theme_order")]
    pub theme: ExecutionOrder,

    #[serde(default = "default_story_order")]
    pub story: ExecutionOrder,
}

fn default_epic_order() -> ExecutionOrder {
    ExecutionOrder::parallel(2)
}

fn default_theme_order() -> ExecutionOrder {
    ExecutionOrder::parallel(4)
}

fn default_story_order() -> ExecutionOrder {
    ExecutionOrder::sequential()
}

impl ParallelismDefaults {
    pub fn for_kind(&self, kind: BuildKind) -> ExecutionOrder {
        match kind {
            BuildKind::Epic => self.epic,
            BuildKind::Theme => self.theme,
            BuildKind::Story => self.story,
        }
    }
}

impl Default for ParallelismDefaults {
    fn default() -> Self {
        Self {
            epic: default_epic_order(),
            theme: default_theme_order(),
            story: default_story_order(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default)]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "tierbuild_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses OS temp dir.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: false,
            level: default_logging_level(),
            directory: None,
        }
    }
}
