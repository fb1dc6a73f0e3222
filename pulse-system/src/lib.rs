//! Foundational system components for Pulse.
//!
//! The [`Controller`] owns the shutdown signal of the process. Long-running tasks obtain a
//! [`ShutdownHandle`] from it and stop once a [`Shutdown`] has been broadcast.

#![warn(missing_docs)]

mod controller;

pub use self::controller::*;
