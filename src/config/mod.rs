//! Configuration module

pub mod settings;

pub use settings::{AddressFamily, ListenConfig, ProxyConfig, TlsConfig, UpstreamProxyConfig};
