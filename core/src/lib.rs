//! Hierarchical epic -> theme -> story build execution and result roll-up.
//!
//! [`executor::BuildExecutor`] walks a [`model::BuildNodeConfig`] tree, runs each
//! node's build and test commands with bounded per-parent parallelism and
//! returns a [`model::BuildNodeResult`] of the same shape.
//! [`aggregate::ResultAggregator`] folds that tree into totals, weighted
//! coverage and flattened views.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod logging;
pub mod model;
pub mod runner;
pub mod util;
pub mod validate;

pub use aggregate::{AggregatedResult, AggregationOptions, ResultAggregator, SummaryReport};
pub use config::ExecutorConfig;
pub use error::{BuildError, CommandError, ConfigurationError};
pub use events::{BuildEvent, BuildObserver, EventBus};
pub use executor::{BuildExecutor, BuildExecutorBuilder};
pub use model::{BuildKind, BuildNodeConfig, BuildNodeResult, BuildStatus};
