//! Lifecycle management subsystem.
//!
//! Startup order is config → subsystems → listener; shutdown stops the
//! listener first, drains, then cancels the health probes.

pub mod shutdown;

pub use shutdown::{Shutdown, ShutdownHandle};
