//! Worker addresses.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use url::Url;

/// Reasons a worker address is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("host must not be empty")]
    EmptyHost,

    #[error("invalid host: {0:?}")]
    InvalidHost(String),

    #[error("invalid port: {0:?}")]
    InvalidPort(String),

    #[error("address {0:?} has no port")]
    MissingPort(String),

    #[error("unsupported scheme {0:?}, expected http")]
    UnsupportedScheme(String),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

/// Network identity of one worker, kept in canonical `host:port` form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct WorkerAddr(String);

impl WorkerAddr {
    /// Build an address from the parts a worker sends when registering.
    pub fn new(host: &str, port: u16) -> Result<Self, AddressError> {
        let host = host.trim();
        if host.is_empty() {
            return Err(AddressError::EmptyHost);
        }
        if port == 0 {
            return Err(AddressError::InvalidPort(port.to_string()));
        }

        let bare = host.trim_start_matches('[').trim_end_matches(']');
        if bare.is_empty()
            || bare
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '/' | '@' | '?' | '#' | '[' | ']'))
        {
            return Err(AddressError::InvalidHost(host.to_string()));
        }

        if bare.contains(':') {
            Ok(Self(format!("[{}]:{}", bare, port)))
        } else {
            Ok(Self(format!("{}:{}", bare.to_ascii_lowercase(), port)))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `http://host:port`
    pub fn base_url(&self) -> String {
        format!("http://{}", self.0)
    }

    /// Absolute URL for `path` on this worker.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.0, path)
    }
}

impl FromStr for WorkerAddr {
    type Err = AddressError;

    /// Accepts `host:port`, `[v6]:port` or `http://host:port`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.contains("://") {
            let url = Url::parse(s)?;
            if url.scheme() != "http" {
                return Err(AddressError::UnsupportedScheme(url.scheme().to_string()));
            }
            let host = url.host_str().ok_or(AddressError::EmptyHost)?;
            let port = url
                .port_or_known_default()
                .ok_or_else(|| AddressError::MissingPort(s.to_string()))?;
            return Self::new(host, port);
        }

        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| AddressError::MissingPort(s.to_string()))?;
        let port: u16 = port
            .parse()
            .map_err(|_| AddressError::InvalidPort(port.to_string()))?;
        Self::new(host, port)
    }
}

impl AsRef<str> for WorkerAddr {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
