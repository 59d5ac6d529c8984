use thiserror::Error;

/// Failure of a single shell command. Captured per node, never propagated
/// past the node boundary.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("spawn failed: {0}")]
    Spawn(String),

    #[error("Command failed with exit code {code}: {stderr}")]
    Failed {
        code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("command cancelled")]
    Cancelled,

    #[error("stream io error: {stream} {source}")]
    StreamIo {
        stream: &'static str,
        source: std::io::Error,
    },
}

impl CommandError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CommandError::Cancelled)
    }
}
