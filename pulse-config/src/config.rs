use std::collections::BTreeMap;
use std::env;
use std::error::Error;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use pulse_auth::{DiscoverySecret, InboundSecret};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::registry::RegistryDescriptor;

/// Defines the source of a config error
#[derive(Debug, Default)]
enum ConfigErrorSource {
    /// An error occurring independently.
    #[default]
    None,
    /// An error originating from a configuration file.
    File(PathBuf),
    /// An error originating in a field override (an env var, or a CLI parameter).
    FieldOverride(String),
}

impl fmt::Display for ConfigErrorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigErrorSource::None => Ok(()),
            ConfigErrorSource::File(file_name) => {
                write!(f, " (file {})", file_name.display())
            }
            ConfigErrorSource::FieldOverride(name) => write!(f, " (field {name})"),
        }
    }
}

/// Indicates config related errors.
#[derive(Debug)]
pub struct ConfigError {
    source: ConfigErrorSource,
    kind: ConfigErrorKind,
    cause: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl ConfigError {
    #[inline]
    fn new(kind: ConfigErrorKind) -> Self {
        Self {
            source: ConfigErrorSource::None,
            kind,
            cause: None,
        }
    }

    #[inline]
    fn wrap<E>(cause: E, kind: ConfigErrorKind) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self {
            source: ConfigErrorSource::None,
            kind,
            cause: Some(Box::new(cause)),
        }
    }

    #[inline]
    fn for_field<E>(cause: E, field: &'static str) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self::wrap(cause, ConfigErrorKind::InvalidValue).field(field)
    }

    #[inline]
    fn file(mut self, p: impl AsRef<Path>) -> Self {
        self.source = ConfigErrorSource::File(p.as_ref().to_path_buf());
        self
    }

    #[inline]
    fn field(mut self, name: &'static str) -> Self {
        self.source = ConfigErrorSource::FieldOverride(name.to_owned());
        self
    }

    /// Returns the error kind of the error.
    pub fn kind(&self) -> ConfigErrorKind {
        self.kind
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind, self.source)
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause.as_deref().map(|e| e as &(dyn Error + 'static))
    }
}

/// Indicates config related errors.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigErrorKind {
    /// Failed to open the file.
    #[error("could not open config file")]
    CouldNotOpenFile,
    /// Failed to save a file.
    #[error("could not write config file")]
    CouldNotWriteFile,
    /// Parsing YAML failed.
    #[error("could not parse yaml config file")]
    BadYaml,
    /// Parsing JSON failed.
    #[error("could not parse json config file")]
    BadJson,
    /// Invalid config value
    #[error("invalid config value")]
    InvalidValue,
    /// A required secret has not been configured.
    #[error("missing secret")]
    MissingSecret,
    /// The inbound and the discovery secret are identical.
    #[error("the inbound and discovery secrets must differ")]
    SharedSecretReused,
}

enum ConfigFormat {
    Yaml,
}

impl ConfigFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yml",
        }
    }
}

trait ConfigObject: DeserializeOwned + Serialize {
    /// The format in which to serialize this configuration.
    fn format() -> ConfigFormat;

    /// The basename of the config file.
    fn name() -> &'static str;

    /// The full filename of the config file, including the file extension.
    fn path(base: &Path) -> PathBuf {
        base.join(format!("{}.{}", Self::name(), Self::format().extension()))
    }

    /// Loads the config file from a file within the given directory location.
    fn load(base: &Path) -> Result<Self, ConfigError> {
        let path = Self::path(base);

        let f = fs::File::open(&path)
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::CouldNotOpenFile).file(&path))?;

        match Self::format() {
            ConfigFormat::Yaml => serde_yaml::from_reader(io::BufReader::new(f))
                .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::BadYaml).file(&path)),
        }
    }

    /// Writes the configuration object to the given writer.
    fn write<W: Write>(&self, writer: &mut W) -> Result<(), ConfigError> {
        match Self::format() {
            ConfigFormat::Yaml => serde_yaml::to_writer(writer, self)
                .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::CouldNotWriteFile)),
        }
    }

    /// Writes the configuration to a file within the given directory location.
    fn save(&self, base: &Path) -> Result<(), ConfigError> {
        let path = Self::path(base);
        let mut options = fs::OpenOptions::new();
        options.write(true).truncate(true).create(true);

        // Remove all non-user permissions for the newly created file, it contains secrets.
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut f = options
            .open(&path)
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::CouldNotWriteFile).file(&path))?;

        self.write(&mut f).map_err(|e| e.file(&path))?;
        f.write_all(b"\n").ok();

        Ok(())
    }
}

/// Structure used to hold information about configuration overrides via
/// CLI parameters or environment variables
#[derive(Debug, Default)]
pub struct OverridableConfig {
    /// The name under which the service registers.
    pub name: Option<String>,
    /// The host the service should bind to (network interface).
    pub host: Option<String>,
    /// The port to bind for the HTTP server.
    pub port: Option<String>,
    /// The secret shared with clients.
    pub inbound_secret: Option<String>,
    /// The secret shared with the discovery registry.
    pub discovery_secret: Option<String>,
    /// The URL of the discovery registry.
    pub registry: Option<String>,
    /// Shutdown timeout in seconds.
    pub shutdown_timeout: Option<String>,
}

fn is_default<T: Default + PartialEq>(t: &T) -> bool {
    *t == T::default()
}

/// Identity and listening address of this service.
#[derive(Serialize, Deserialize, Debug)]
#[serde(default)]
struct Service {
    /// The name under which the service registers with the discovery registry.
    name: String,
    /// The host to which the HTTP server binds.
    host: IpAddr,
    /// The port to which the HTTP server binds.
    port: u16,
    /// The host announced to the discovery registry.
    ///
    /// Defaults to `host`. Set this when binding to an unspecified address such as `0.0.0.0`.
    #[serde(skip_serializing_if = "Option::is_none")]
    advertise_host: Option<String>,
    /// Additional metadata sent along with the identity during registration.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    capabilities: BTreeMap<String, String>,
}

impl Default for Service {
    fn default() -> Self {
        Service {
            name: "pulse".to_owned(),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
            advertise_host: None,
            capabilities: BTreeMap::new(),
        }
    }
}

/// Authentication of inbound requests.
#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(default)]
struct Auth {
    /// The secret shared with clients.
    #[serde(skip_serializing_if = "Option::is_none")]
    secret: Option<InboundSecret>,
}

/// Registration with the discovery registry.
#[derive(Serialize, Deserialize, Debug)]
#[serde(default)]
struct Discovery {
    /// The URL of the discovery registry.
    registry: RegistryDescriptor,
    /// The path of the registration endpoint on the registry.
    register_endpoint: String,
    /// The secret shared with the discovery registry.
    #[serde(skip_serializing_if = "Option::is_none")]
    secret: Option<DiscoverySecret>,
    /// Interval between heartbeats in seconds.
    heartbeat_interval: u64,
    /// Number of consecutive failed heartbeats after which the service considers itself degraded
    /// and registers again.
    failure_threshold: u32,
    /// Delay before the first registration retry in milliseconds.
    retry_initial_interval: u64,
    /// Maximum delay between registration retries in seconds.
    retry_max_interval: u64,
    /// Maximum number of registration attempts at startup. Unlimited if not set.
    #[serde(skip_serializing_if = "Option::is_none")]
    register_max_attempts: Option<u32>,
    /// Maximum time in seconds to keep retrying registration at startup. Unlimited if not set.
    #[serde(skip_serializing_if = "Option::is_none")]
    register_max_duration: Option<u64>,
}

impl Default for Discovery {
    fn default() -> Self {
        Discovery {
            registry: RegistryDescriptor::default(),
            register_endpoint: "register".to_owned(),
            secret: None,
            heartbeat_interval: 30,
            failure_threshold: 3,
            retry_initial_interval: 500,
            retry_max_interval: 60,
            register_max_attempts: None,
            register_max_duration: None,
        }
    }
}

/// Controls outbound requests to the discovery registry.
#[derive(Serialize, Deserialize, Debug)]
#[serde(default)]
struct Http {
    /// Timeout for registry requests in seconds.
    ///
    /// This covers the entire request from connecting until the response has been received.
    timeout: u32,
    /// Timeout for establishing connections with the registry in seconds.
    connection_timeout: u32,
}

impl Default for Http {
    fn default() -> Self {
        Http {
            timeout: 5,
            connection_timeout: 3,
        }
    }
}

/// Controls various limits
#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
struct Limits {
    /// The maximum payload size for inbound requests in bytes.
    max_api_payload_size: usize,
    /// The maximum number of seconds to wait for pending requests after receiving SIGTERM.
    shutdown_timeout: u64,
    /// The maximum number of records held by the in-memory store.
    max_stored_records: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_api_payload_size: 1024 * 1024,
            shutdown_timeout: 10,
            max_stored_records: 100_000,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct ConfigValues {
    #[serde(default)]
    service: Service,
    #[serde(default)]
    auth: Auth,
    #[serde(default)]
    discovery: Discovery,
    #[serde(default)]
    http: Http,
    #[serde(default, skip_serializing_if = "is_default")]
    limits: Limits,
    #[serde(default)]
    logging: pulse_log::LogConfig,
}

impl ConfigObject for ConfigValues {
    fn format() -> ConfigFormat {
        ConfigFormat::Yaml
    }

    fn name() -> &'static str {
        "config"
    }
}

/// Config struct.
#[derive(Default)]
pub struct Config {
    values: ConfigValues,
    path: PathBuf,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("path", &self.path)
            .field("values", &self.values)
            .finish()
    }
}

impl Config {
    /// Loads a config from a given config folder.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let path = env::current_dir()
            .map(|x| x.join(path.as_ref()))
            .unwrap_or_else(|_| path.as_ref().to_path_buf());

        Ok(Config {
            values: ConfigValues::load(&path)?,
            path,
        })
    }

    /// Creates a config from a JSON value.
    ///
    /// This is mostly useful for tests.
    pub fn from_json_value(value: serde_json::Value) -> Result<Config, ConfigError> {
        Ok(Config {
            values: serde_json::from_value(value)
                .map_err(|err| ConfigError::wrap(err, ConfigErrorKind::BadJson))?,
            path: PathBuf::new(),
        })
    }

    /// Override configuration with values coming from other sources (e.g. env variables or
    /// command line parameters)
    pub fn apply_override(
        &mut self,
        overrides: OverridableConfig,
    ) -> Result<&mut Self, ConfigError> {
        let service = &mut self.values.service;

        if let Some(name) = overrides.name {
            service.name = name;
        }

        if let Some(host) = overrides.host {
            service.host = host
                .parse::<IpAddr>()
                .map_err(|err| ConfigError::for_field(err, "host"))?;
        }

        if let Some(port) = overrides.port {
            service.port = port
                .as_str()
                .parse()
                .map_err(|err| ConfigError::for_field(err, "port"))?;
        }

        if let Some(secret) = overrides.inbound_secret {
            self.values.auth.secret = Some(
                secret
                    .parse()
                    .map_err(|err| ConfigError::for_field(err, "inbound_secret"))?,
            );
        }

        let discovery = &mut self.values.discovery;

        if let Some(secret) = overrides.discovery_secret {
            discovery.secret = Some(
                secret
                    .parse()
                    .map_err(|err| ConfigError::for_field(err, "discovery_secret"))?,
            );
        }

        if let Some(registry) = overrides.registry {
            discovery.registry = registry
                .parse::<RegistryDescriptor>()
                .map_err(|err| ConfigError::for_field(err, "registry"))?;
        }

        if let Some(shutdown_timeout) = overrides.shutdown_timeout {
            self.values.limits.shutdown_timeout = shutdown_timeout
                .parse()
                .map_err(|err| ConfigError::for_field(err, "shutdown_timeout"))?;
        }

        Ok(self)
    }

    /// Checks that the configuration can be used to run the service.
    ///
    /// Both secrets must be present and must differ from each other. The service name is used as
    /// a URL path segment and must not contain `/`, `?`, `#` or `%`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = &self.values.service.name;
        if name.trim().is_empty() || name.contains(['/', '?', '#', '%']) {
            return Err(ConfigError::new(ConfigErrorKind::InvalidValue).field("service.name"));
        }

        if self.values.discovery.heartbeat_interval == 0 {
            return Err(ConfigError::new(ConfigErrorKind::InvalidValue)
                .field("discovery.heartbeat_interval"));
        }

        if self.values.discovery.retry_initial_interval == 0 {
            return Err(ConfigError::new(ConfigErrorKind::InvalidValue)
                .field("discovery.retry_initial_interval"));
        }

        if self.register_max_interval() < self.register_initial_interval() {
            return Err(ConfigError::new(ConfigErrorKind::InvalidValue)
                .field("discovery.retry_max_interval"));
        }

        let Some(inbound) = self.inbound_secret() else {
            return Err(ConfigError::new(ConfigErrorKind::MissingSecret).field("auth.secret"));
        };

        let Some(discovery) = self.discovery_secret() else {
            return Err(ConfigError::new(ConfigErrorKind::MissingSecret).field("discovery.secret"));
        };

        if inbound.shares_key_with(discovery) {
            return Err(ConfigError::new(ConfigErrorKind::SharedSecretReused));
        }

        Ok(())
    }

    /// Checks if the config is already initialized.
    pub fn config_exists<P: AsRef<Path>>(path: P) -> bool {
        fs::metadata(ConfigValues::path(path.as_ref())).is_ok()
    }

    /// Returns the filename of the config file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the configuration into `config.yml` within the given folder.
    pub fn save_in_folder<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if fs::metadata(path).is_err() {
            fs::create_dir_all(path)
                .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::CouldNotWriteFile).file(path))?;
        }
        self.values.save(path)
    }

    /// Dumps out a YAML string of the values.
    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(&self.values)
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::CouldNotWriteFile))
    }

    /// Returns the name under which this service registers.
    pub fn service_name(&self) -> &str {
        &self.values.service.name
    }

    /// Returns the socket address the HTTP server binds to.
    pub fn listen_addr(&self) -> SocketAddr {
        (self.values.service.host, self.values.service.port).into()
    }

    /// Returns the host announced to the discovery registry.
    pub fn advertise_host(&self) -> String {
        match self.values.service.advertise_host {
            Some(ref host) => host.clone(),
            None => self.values.service.host.to_string(),
        }
    }

    /// Returns the port announced to the discovery registry.
    pub fn advertise_port(&self) -> u16 {
        self.values.service.port
    }

    /// Returns the capability metadata announced to the discovery registry.
    pub fn capabilities(&self) -> &BTreeMap<String, String> {
        &self.values.service.capabilities
    }

    /// Returns the secret shared with clients.
    pub fn inbound_secret(&self) -> Option<&InboundSecret> {
        self.values.auth.secret.as_ref()
    }

    /// Returns the secret shared with the discovery registry.
    pub fn discovery_secret(&self) -> Option<&DiscoverySecret> {
        self.values.discovery.secret.as_ref()
    }

    /// Returns the location of the discovery registry.
    pub fn registry(&self) -> &RegistryDescriptor {
        &self.values.discovery.registry
    }

    /// Returns the path of the registration endpoint on the registry.
    pub fn register_endpoint(&self) -> &str {
        &self.values.discovery.register_endpoint
    }

    /// Returns the interval between heartbeats.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.values.discovery.heartbeat_interval)
    }

    /// Returns the number of consecutive heartbeat failures before registering again.
    pub fn heartbeat_failure_threshold(&self) -> u32 {
        self.values.discovery.failure_threshold.max(1)
    }

    /// Returns the delay before the first registration retry.
    pub fn register_initial_interval(&self) -> Duration {
        Duration::from_millis(self.values.discovery.retry_initial_interval)
    }

    /// Returns the maximum delay between registration retries.
    pub fn register_max_interval(&self) -> Duration {
        Duration::from_secs(self.values.discovery.retry_max_interval)
    }

    /// Returns the maximum number of registration attempts at startup.
    pub fn register_max_attempts(&self) -> Option<u32> {
        self.values.discovery.register_max_attempts
    }

    /// Returns the maximum time to keep retrying registration at startup.
    pub fn register_max_duration(&self) -> Option<Duration> {
        self.values
            .discovery
            .register_max_duration
            .map(Duration::from_secs)
    }

    /// Returns the timeout for registry requests.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.values.http.timeout.into())
    }

    /// Returns the timeout for establishing connections with the registry.
    pub fn http_connection_timeout(&self) -> Duration {
        Duration::from_secs(self.values.http.connection_timeout.into())
    }

    /// Returns the maximum payload size of inbound requests.
    pub fn max_api_payload_size(&self) -> usize {
        self.values.limits.max_api_payload_size
    }

    /// Returns the maximum number of records kept by the in-memory store.
    pub fn max_stored_records(&self) -> usize {
        self.values.limits.max_stored_records
    }

    /// Returns the maximum time to drain pending requests after SIGTERM.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.values.limits.shutdown_timeout)
    }

    /// Returns logging configuration.
    pub fn logging(&self) -> &pulse_log::LogConfig {
        &self.values.logging
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config::from_json_value(serde_json::json!({
            "auth": {"secret": "inbound"},
            "discovery": {"secret": "discovery"},
        }))
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.service_name(), "pulse");
        assert_eq!(config.listen_addr().to_string(), "127.0.0.1:3000");
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(30));
        assert_eq!(config.heartbeat_failure_threshold(), 3);
        assert_eq!(config.register_endpoint(), "register");
        assert_eq!(config.register_max_attempts(), None);
        assert_eq!(config.http_timeout(), Duration::from_secs(5));
        assert!(config.inbound_secret().is_none());
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.yml"),
            r#"---
service:
  name: metrics-service
  host: 0.0.0.0
  port: 6000
  advertise_host: metrics.internal
  capabilities:
    version: "2"
auth:
  secret: client-secret
discovery:
  registry: http://discovery.internal:8000/
  register_endpoint: register
  secret: registry-secret
  heartbeat_interval: 10
  register_max_attempts: 5
logging:
  level: debug
"#,
        )
        .unwrap();

        let config = Config::from_path(dir.path()).unwrap();
        assert_eq!(config.service_name(), "metrics-service");
        assert_eq!(config.listen_addr().to_string(), "0.0.0.0:6000");
        assert_eq!(config.advertise_host(), "metrics.internal");
        assert_eq!(config.capabilities().get("version").unwrap(), "2");
        assert_eq!(config.registry().host(), "discovery.internal");
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(10));
        assert_eq!(config.register_max_attempts(), Some(5));
        assert_eq!(config.logging().level.to_string(), "debug");
        config.validate().unwrap();
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let error = Config::from_path(dir.path()).unwrap_err();
        assert_eq!(error.kind(), ConfigErrorKind::CouldNotOpenFile);
        assert!(error.source().is_some());
    }

    #[test]
    fn test_bad_yaml() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.yml"), "service: [").unwrap();
        let error = Config::from_path(dir.path()).unwrap_err();
        assert_eq!(error.kind(), ConfigErrorKind::BadYaml);
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config
            .apply_override(OverridableConfig {
                name: Some("intent-metrics".to_owned()),
                host: Some("0.0.0.0".to_owned()),
                port: Some("4000".to_owned()),
                inbound_secret: Some("a".to_owned()),
                discovery_secret: Some("b".to_owned()),
                registry: Some("https://registry.example.com/".to_owned()),
                shutdown_timeout: Some("3".to_owned()),
            })
            .unwrap();

        assert_eq!(config.service_name(), "intent-metrics");
        assert_eq!(config.listen_addr().to_string(), "0.0.0.0:4000");
        assert_eq!(config.registry().port(), 443);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(3));
        config.validate().unwrap();
    }

    #[test]
    fn test_invalid_override() {
        let mut config = Config::default();
        let error = config
            .apply_override(OverridableConfig {
                port: Some("http".to_owned()),
                ..Default::default()
            })
            .unwrap_err();

        insta::assert_snapshot!(error.to_string(), @"invalid config value (field port)");
    }

    #[test]
    fn test_missing_secret() {
        let config = Config::from_json_value(serde_json::json!({
            "auth": {"secret": "inbound"},
        }))
        .unwrap();

        let error = config.validate().unwrap_err();
        assert_eq!(error.kind(), ConfigErrorKind::MissingSecret);
        assert_eq!(error.to_string(), "missing secret (field discovery.secret)");
    }

    #[test]
    fn test_shared_secret_rejected() {
        let config = Config::from_json_value(serde_json::json!({
            "auth": {"secret": "same"},
            "discovery": {"secret": "same"},
        }))
        .unwrap();

        let error = config.validate().unwrap_err();
        assert_eq!(error.kind(), ConfigErrorKind::SharedSecretReused);
    }

    #[test]
    fn test_zero_retry_interval_rejected() {
        let config = Config::from_json_value(serde_json::json!({
            "auth": {"secret": "inbound"},
            "discovery": {"secret": "registry", "retry_initial_interval": 0},
        }))
        .unwrap();

        let error = config.validate().unwrap_err();
        insta::assert_snapshot!(
            error.to_string(),
            @"invalid config value (field discovery.retry_initial_interval)"
        );
    }

    #[test]
    fn test_retry_max_below_initial_rejected() {
        let config = Config::from_json_value(serde_json::json!({
            "auth": {"secret": "inbound"},
            "discovery": {
                "secret": "registry",
                "retry_initial_interval": 2000,
                "retry_max_interval": 1,
            },
        }))
        .unwrap();

        let error = config.validate().unwrap_err();
        insta::assert_snapshot!(
            error.to_string(),
            @"invalid config value (field discovery.retry_max_interval)"
        );
    }

    #[test]
    fn test_service_name_path_characters_rejected() {
        for name in ["metrics/admin", "metrics?debug", "metrics#1", "metrics%2F"] {
            let config = Config::from_json_value(serde_json::json!({
                "service": {"name": name},
                "auth": {"secret": "inbound"},
                "discovery": {"secret": "registry"},
            }))
            .unwrap();

            let error = config.validate().unwrap_err();
            assert_eq!(error.kind(), ConfigErrorKind::InvalidValue, "{name}");
            assert_eq!(
                error.to_string(),
                "invalid config value (field service.name)"
            );
        }
    }

    #[test]
    fn test_empty_secret_rejected() {
        let result = Config::from_json_value(serde_json::json!({
            "auth": {"secret": ""},
        }));
        assert_eq!(result.unwrap_err().kind(), ConfigErrorKind::BadJson);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        valid().save_in_folder(dir.path()).unwrap();

        let config = Config::from_path(dir.path()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.service_name(), "pulse");
    }
}
