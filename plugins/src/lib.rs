//! Event rendering and executor wiring for tierbuild.

pub mod factory;
pub mod observers;
