use thiserror::Error;

/// Errors `BuildExecutor::execute_build` can return. Command failures never
/// surface here; they are recorded on the result tree instead.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

/// Malformed build tree, detected before any process is spawned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("build node at {path} has an empty id")]
    MissingId { path: String },

    #[error("duplicate build id: {0}")]
    DuplicateId(String),

    #[error("build '{id}' declares parent '{found}' but is nested under '{expected}'")]
    ParentMismatch {
        id: String,
        expected: String,
        found: String,
    },

    #[error("root build '{id}' must not declare a parent (found '{found}')")]
    RootHasParent { id: String, found: String },

    #[error("build '{id}' has invalid maxParallelChildren {value} (must be >= 1)")]
    InvalidParallelism { id: String, value: usize },

    #[error("unknown build kind '{0}' (expected epic, theme or story)")]
    UnknownKind(String),

    #[error("unknown failure handling policy '{0}' (expected fail-fast, continue or ignore-children)")]
    UnknownPolicy(String),

    #[error("failed to parse build tree: {0}")]
    Parse(String),

    #[error("failed to read build tree: {0}")]
    Io(String),
}
