//! Connection configuration

use std::fmt;
use std::time::Duration;

/// A TCP endpoint of an INDI server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Host name or address
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl Endpoint {
    /// Default INDI server port (7624)
    pub const DEFAULT_PORT: u16 = 7624;

    /// Create a new endpoint
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Endpoint on the default port
    pub fn with_default_port(host: impl Into<String>) -> Self {
        Self::new(host, Self::DEFAULT_PORT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl std::str::FromStr for Endpoint {
    type Err = crate::error::Error;

    /// Accepts `host` or `host:port`; a missing port means 7624.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (host, port) = match s.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    crate::error::Error::Parse(format!("invalid port in endpoint `{}`", s))
                })?;
                (host, port)
            }
            None => (s, Self::DEFAULT_PORT),
        };
        if host.is_empty() {
            return Err(crate::error::Error::Parse(format!(
                "empty host in endpoint `{}`",
                s
            )));
        }
        Ok(Self::new(host, port))
    }
}

/// Tuning knobs for a [`Session`](crate::client::Session)
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upper bound on bytes requested per socket read
    pub read_buffer_size: usize,
    /// Capacity of each fan-out stream before backpressure applies
    pub channel_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: 65536,
            channel_capacity: 32,
        }
    }
}

/// Tuning knobs for a [`Registry`](crate::client::Registry)
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Expected cadence of server `pingRequest`s; the link is declared dead
    /// when none arrives within twice this interval
    pub ping_interval: Duration,
    /// Session settings
    pub session: SessionConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(60),
            session: SessionConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_display() {
        let endpoint = Endpoint::with_default_port("astro.local");
        assert_eq!(endpoint.to_string(), "astro.local:7624");
        assert_eq!(endpoint.port, Endpoint::DEFAULT_PORT);
    }

    #[test]
    fn test_endpoint_from_str() {
        let endpoint: Endpoint = "astro.local:7000".parse().unwrap();
        assert_eq!(endpoint, Endpoint::new("astro.local", 7000));

        let endpoint: Endpoint = "astro.local".parse().unwrap();
        assert_eq!(endpoint.port, Endpoint::DEFAULT_PORT);

        assert!("astro.local:seven".parse::<Endpoint>().is_err());
        assert!(":7624".parse::<Endpoint>().is_err());
    }
}
