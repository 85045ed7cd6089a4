//! Proxy configuration settings
//!
//! Loaded once at startup from a YAML file and/or environment variables and
//! passed by reference into every component entry point. Nothing mutates the
//! configuration after load.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Address family policy applied during resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    /// Accept any resolved address
    Any,
    /// IPv4 candidates only
    V4,
    /// IPv6 candidates only
    V6,
}

impl Default for AddressFamily {
    fn default() -> Self {
        AddressFamily::Any
    }
}

/// Main configuration for the intercepting proxy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Listening socket configuration
    #[serde(default)]
    pub listen: ListenConfig,

    /// Optional upstream proxy to chain through
    #[serde(default)]
    pub upstream_proxy: Option<UpstreamProxyConfig>,

    /// Address family policy for resolution
    #[serde(default)]
    pub address_family: AddressFamily,

    /// Log level configuration
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Verbose connection-level logging
    #[serde(default)]
    pub verbose: bool,

    /// TLS interception configuration
    #[serde(default)]
    pub tls: TlsConfig,
}

/// Listening socket configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    /// Host to bind
    pub host: String,

    /// Port to bind
    pub port: u16,

    /// Listen backlog
    pub backlog: u32,
}

/// Upstream proxy configuration for chained forwarding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamProxyConfig {
    /// Upstream proxy host
    pub host: String,

    /// Upstream proxy port
    pub port: u16,
}

/// TLS configuration for HTTPS interception
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Organization name placed in impersonated certificates
    pub cert_organization: String,

    /// Validity period of impersonated certificates in days
    pub cert_validity_days: u32,

    /// Skip verification of the real server's certificate
    pub skip_upstream_cert_verify: bool,

    /// Optional PEM certificate to present instead of a generated one
    pub cert_path: Option<String>,

    /// Optional PEM private key matching `cert_path`
    pub key_path: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen: ListenConfig::default(),
            upstream_proxy: None,
            address_family: AddressFamily::Any,
            log_level: default_log_level(),
            verbose: false,
            tls: TlsConfig::default(),
        }
    }
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8008,
            backlog: 128,
        }
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            cert_organization: "Rust Intercept Proxy".to_string(),
            cert_validity_days: 365,
            skip_upstream_cert_verify: false,
            cert_path: None,
            key_path: None,
        }
    }
}

impl ProxyConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: ProxyConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Load configuration from an optional YAML file with environment overrides
    ///
    /// When `path` is `None` and `config.yml` does not exist, defaults are used.
    pub fn load_config(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_yaml_file(p)?,
            None => {
                if Path::new("config.yml").exists() {
                    Self::from_yaml_file("config.yml")?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Override settings from environment variables for development/testing
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("PROXY_LISTEN_HOST") {
            self.listen.host = host;
        }

        if let Ok(port) = std::env::var("PROXY_LISTEN_PORT") {
            if let Ok(port) = port.parse() {
                self.listen.port = port;
            }
        }

        if let Ok(log_level) = std::env::var("RUST_LOG") {
            self.log_level = log_level;
        }

        if let Ok(upstream) = std::env::var("PROXY_UPSTREAM") {
            if let Some((host, port)) = upstream.rsplit_once(':') {
                if let Ok(port) = port.parse() {
                    self.upstream_proxy = Some(UpstreamProxyConfig {
                        host: host.to_string(),
                        port,
                    });
                }
            }
        }

        if let Ok(verbose) = std::env::var("PROXY_VERBOSE") {
            self.verbose = verbose.to_lowercase() == "true";
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_listens_locally_without_chaining() {
        let config = ProxyConfig::default();
        assert_eq!(config.listen.host, "127.0.0.1");
        assert_eq!(config.listen.port, 8008);
        assert!(config.upstream_proxy.is_none());
        assert_eq!(config.address_family, AddressFamily::Any);
    }

    #[test]
    fn yaml_round_trip_preserves_upstream_proxy() {
        let yaml = r#"
listen:
  host: "0.0.0.0"
  port: 8888
  backlog: 64
upstream_proxy:
  host: "corp-proxy.internal"
  port: 3128
address_family: v4
"#;
        let config: ProxyConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.listen.port, 8888);
        let upstream = config.upstream_proxy.unwrap();
        assert_eq!(upstream.host, "corp-proxy.internal");
        assert_eq!(upstream.port, 3128);
        assert_eq!(config.address_family, AddressFamily::V4);
    }
}
