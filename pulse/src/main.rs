//! The Pulse command line application.
//!
//! Pulse sits next to a service and accepts metrics, users and messages from clients. Every
//! inbound document must carry a `Token` header with the HMAC-SHA256 of its canonical JSON body,
//! computed with a secret shared between clients and Pulse. On startup, Pulse registers with a
//! discovery registry and keeps the registration alive with periodic signed heartbeats.
//!
//! # Usage
//!
//! ```text
//! pulse --config .pulse run
//! ```
//!
//! The configuration folder contains a `config.yml`. Use `pulse config init` to create one with
//! default values and `pulse config show` to print the effective configuration. Secrets and a few
//! other settings can also be passed through the environment:
//!
//! | Variable                 | Setting                   |
//! |--------------------------|---------------------------|
//! | `PULSE_NAME`             | `service.name`            |
//! | `PULSE_HOST`             | `service.host`            |
//! | `PULSE_PORT`             | `service.port`            |
//! | `PULSE_INBOUND_SECRET`   | `auth.secret`             |
//! | `PULSE_DISCOVERY_SECRET` | `discovery.secret`        |
//! | `PULSE_REGISTRY`         | `discovery.registry`      |
//! | `PULSE_SHUTDOWN_TIMEOUT` | `limits.shutdown_timeout` |
//!
//! To compute a token for a document, pipe it into `pulse token sign`:
//!
//! ```text
//! echo '{"user_id": "5b3c"}' | pulse token sign --domain inbound
//! ```

mod cli;
mod cliapp;
mod setup;

use std::process;

pub fn main() {
    let exit_code = match cli::execute() {
        Ok(()) => 0,
        Err(err) => {
            pulse_log::ensure_error(&err);
            1
        }
    };

    process::exit(exit_code);
}
