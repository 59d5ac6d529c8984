pub mod command;
#[allow(clippy::module_inception)]
pub mod error;

pub use command::CommandError;
pub use error::{BuildError, ConfigurationError};
