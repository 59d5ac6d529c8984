//! Spawns one OS process per build/test command and streams its output.

mod io_pump;
mod registry;
mod run;
mod types;

pub use io_pump::{LineStream, LineTap};
pub use registry::{ActiveProcesses, Registration};
pub use run::CommandRunner;
pub use types::{CommandOutput, CommandSpec};
