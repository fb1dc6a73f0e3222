//! Logging facade for Pulse.
//!
//! All crates in the workspace log through the macros re-exported here. The subscriber is
//! installed once at startup via [`init`], which is only available with the `init` feature. Tests
//! use [`init_test!`] from the `test` feature instead.
//!
//! # Example
//!
//! ```
//! pulse_log::info!("registered with {}", "http://localhost:8000/");
//! ```

#![warn(missing_docs)]

mod setup;
pub use setup::*;

#[cfg(feature = "test")]
mod test;
#[cfg(feature = "test")]
pub use test::*;

mod utils;
pub use utils::*;

// Expose the minimal log facade.
#[doc(inline)]
pub use tracing::{Level, debug, error, info, trace, warn};
