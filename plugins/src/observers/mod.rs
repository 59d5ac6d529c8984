//! [`BuildObserver`](tierbuild_core::events::BuildObserver) implementations
//! that render the executor's event stream.

mod jsonl;
mod progress;
mod text;

pub use jsonl::JsonlEventObserver;
pub use progress::ProgressObserver;
pub use text::TextEventObserver;
