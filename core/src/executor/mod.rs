//! Hierarchical build execution.
//!
//! ```text
//! BuildNodeConfig (validated)
//!   -> execute_node: build command -> children (BoundedPool) -> test command
//!        -> parse test output, read coverage, collect artifacts
//!        -> determine_status
//!   -> BuildNodeResult (same shape as the config)
//! ```
//!
//! Children of one parent share a pool of `maxParallelChildren` permits;
//! there is no global limit across levels.

mod artifacts;
mod context;
mod coverage;
mod engine;
mod node;
mod parse;
mod scheduler;
mod status;

pub use artifacts::collect_artifacts;
pub use context::ExecContext;
pub use coverage::{parse_istanbul_summary, read_coverage};
pub use engine::{BuildExecutor, BuildExecutorBuilder};
pub use parse::{JestParser, MochaParser, ParserRegistry, TestOutputParser};
pub use scheduler::{BoundedPool, Slot};
pub use status::{determine_status, interrupted_status};
