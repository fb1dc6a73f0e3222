//! Configuration for the Pulse CLI and server.
//!
//! The configuration is read from `config.yml` within a config folder. Every section is optional
//! and falls back to defaults, except for the secrets which must be provided either in the file or
//! through [`OverridableConfig`].

#![warn(missing_docs)]

mod config;
mod registry;

pub use crate::config::*;
pub use crate::registry::*;
