use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;

/// The scheme used to talk to the discovery registry.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Scheme {
    /// Plain HTTP.
    Http,
    /// HTTP over TLS.
    Https,
}

impl Scheme {
    /// Returns the default port for this scheme.
    pub fn default_port(self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => f.write_str("http"),
            Self::Https => f.write_str("https"),
        }
    }
}

/// Raised if a URL cannot be parsed into a registry descriptor.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, thiserror::Error)]
pub enum RegistryParseError {
    /// Raised if the registry could not be parsed as URL.
    #[error("invalid registry URL: bad URL format")]
    BadUrl,
    /// Raised if a path was added to a URL.
    #[error("invalid registry URL: non root URL given")]
    NonOriginUrl,
    /// Raised if an unknown or unsupported scheme is encountered.
    #[error("invalid registry URL: unknown or unsupported URL scheme")]
    UnknownScheme,
    /// Raised if no host was provided.
    #[error("invalid registry URL: no host")]
    NoHost,
}

/// Location of the discovery registry.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RegistryDescriptor {
    host: Cow<'static, str>,
    port: u16,
    scheme: Scheme,
}

impl RegistryDescriptor {
    /// Manually constructs a registry descriptor.
    pub fn new(host: impl Into<Cow<'static, str>>, port: u16, scheme: Scheme) -> Self {
        Self {
            host: host.into(),
            port,
            scheme,
        }
    }

    /// Returns the host as a string.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the registry port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the registry's connection scheme.
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Returns a URL relative to the registry.
    pub fn get_url(&self, path: &str) -> Result<Url, url::ParseError> {
        format!("{}{}", self, path.trim_start_matches('/')).parse()
    }
}

impl Default for RegistryDescriptor {
    fn default() -> Self {
        Self::new("127.0.0.1", 8000, Scheme::Http)
    }
}

impl fmt::Display for RegistryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.host)?;
        if self.port != self.scheme.default_port() {
            write!(f, ":{}", self.port)?;
        }
        write!(f, "/")
    }
}

impl FromStr for RegistryDescriptor {
    type Err = RegistryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(s).map_err(|_| RegistryParseError::BadUrl)?;
        if url.path() != "/" || !(url.query().is_none() || url.query() == Some("")) {
            return Err(RegistryParseError::NonOriginUrl);
        }

        let scheme = match url.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            _ => return Err(RegistryParseError::UnknownScheme),
        };

        let host = url.host_str().ok_or(RegistryParseError::NoHost)?;

        Ok(Self {
            host: Cow::Owned(host.to_owned()),
            port: url.port().unwrap_or_else(|| scheme.default_port()),
            scheme,
        })
    }
}

impl Serialize for RegistryDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RegistryDescriptor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Cow::<str>::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_parsing() {
        let desc: RegistryDescriptor = "http://discovery.internal:8000/".parse().unwrap();
        assert_eq!(desc.host(), "discovery.internal");
        assert_eq!(desc.port(), 8000);
        assert_eq!(desc.scheme(), Scheme::Http);
    }

    #[test]
    fn test_default_port() {
        let desc: RegistryDescriptor = "https://discovery.internal".parse().unwrap();
        assert_eq!(desc.port(), 443);
        assert_eq!(desc.to_string(), "https://discovery.internal/");
    }

    #[test]
    fn test_rejects_paths() {
        let result = "http://discovery.internal/api/".parse::<RegistryDescriptor>();
        assert_eq!(result, Err(RegistryParseError::NonOriginUrl));
    }

    #[test]
    fn test_rejects_scheme() {
        let result = "ftp://discovery.internal/".parse::<RegistryDescriptor>();
        assert_eq!(result, Err(RegistryParseError::UnknownScheme));
    }

    #[test]
    fn test_get_url() {
        let desc = RegistryDescriptor::new("localhost", 8000, Scheme::Http);
        assert_eq!(
            desc.get_url("/heartbeat/metrics-service").unwrap().as_str(),
            "http://localhost:8000/heartbeat/metrics-service"
        );
        assert_eq!(
            desc.get_url("register").unwrap().as_str(),
            "http://localhost:8000/register"
        );
    }
}
