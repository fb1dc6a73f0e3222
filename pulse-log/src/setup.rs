use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::level_filters::LevelFilter;

/// All crates in this workspace, which log at the configured level.
///
/// Third-party crates stay at `INFO` unless overridden through `RUST_LOG`.
#[cfg(feature = "init")]
const CRATE_NAMES: &[&str] = &[
    "pulse",
    "pulse_auth",
    "pulse_config",
    "pulse_log",
    "pulse_server",
    "pulse_system",
];

/// Controls the log format.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect the best format.
    ///
    /// This chooses [`LogFormat::Pretty`] for TTY, otherwise [`LogFormat::Simplified`].
    Auto,

    /// Pretty printing with colors.
    ///
    /// ```text
    ///  INFO pulse::setup: service name: metrics-service
    /// ```
    Pretty,

    /// Simplified plain text output.
    ///
    /// ```text
    /// 2024-12-04T12:10:32.123Z  INFO pulse::setup: service name: metrics-service
    /// ```
    Simplified,

    /// Dump out JSON lines.
    ///
    /// ```text
    /// {"timestamp":"2024-12-04T12:11:08.729716Z","level":"INFO","target":"pulse::setup","message":"service name: metrics-service"}
    /// ```
    Json,
}

/// The maximum log level, wrapped for config (de)serialization.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LogLevel(pub LevelFilter);

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_string().to_lowercase())
    }
}

impl FromStr for LogLevel {
    type Err = tracing::level_filters::ParseLevelFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(LogLevel)
    }
}

impl Serialize for LogLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Cow::<str>::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

/// Controls the logging system.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// The log level for Pulse.
    pub level: LogLevel,

    /// Controls the log output format.
    ///
    /// Defaults to [`LogFormat::Auto`], which detects the best format based on the TTY.
    pub format: LogFormat,

    /// When set to `true`, backtraces are forced on.
    ///
    /// Otherwise, backtraces can be enabled by setting the `RUST_BACKTRACE` variable to `full`.
    pub enable_backtraces: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel(LevelFilter::INFO),
            format: LogFormat::Auto,
            enable_backtraces: false,
        }
    }
}

#[cfg(feature = "init")]
fn default_filters(level: LevelFilter) -> tracing_subscriber::EnvFilter {
    let mut directives = vec![String::from("info")];
    directives.extend(CRATE_NAMES.iter().map(|name| format!("{name}={level}")));
    tracing_subscriber::EnvFilter::new(directives.join(","))
}

/// Initialize the logging system.
///
/// The `RUST_LOG` environment variable takes precedence over the configured level.
///
/// # Example
///
/// ```ignore
/// let log_config = pulse_log::LogConfig {
///     enable_backtraces: true,
///     ..Default::default()
/// };
///
/// pulse_log::init(&log_config);
/// ```
#[cfg(feature = "init")]
pub fn init(config: &LogConfig) {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, Layer, Registry};

    if config.enable_backtraces {
        // SAFETY: Logging is initialized on the main thread during startup, before any other
        // threads are spawned that could read the environment concurrently.
        unsafe { std::env::set_var("RUST_BACKTRACE", "full") };
    }

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => default_filters(config.level.0),
    };

    let attended = console::user_attended();
    let format: Box<dyn Layer<Registry> + Send + Sync> = match (config.format, attended) {
        (LogFormat::Auto, true) | (LogFormat::Pretty, _) => {
            tracing_subscriber::fmt::layer().compact().with_target(true).boxed()
        }
        (LogFormat::Auto, false) | (LogFormat::Simplified, _) => {
            tracing_subscriber::fmt::layer().with_ansi(false).with_target(true).boxed()
        }
        (LogFormat::Json, _) => tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(format.with_filter(filter))
        .try_init()
        .ok();
}
