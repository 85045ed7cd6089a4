//! Error handling module for the intercepting proxy

use thiserror::Error;

/// Custom error type for the intercepting proxy
#[derive(Error, Debug)]
pub enum Error {
    /// Request line did not contain two space-separated tokens after the method
    #[error("malformed request line")]
    MalformedRequest,

    /// Target carried no http:// or https:// scheme and the method is not CONNECT
    #[error("malformed protocol: missing or unsupported scheme")]
    MalformedProtocol,

    /// Absolute-URI rewrite could not locate a scheme in the buffer
    #[error("request normalization: no scheme found in buffer")]
    MissingScheme,

    /// Absolute-URI rewrite found a scheme but no explicit path after the authority
    #[error("request normalization: no explicit path after authority")]
    MissingPath,

    /// Address resolution returned no usable candidate
    #[error("failed to resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        source: std::io::Error,
    },

    /// Every resolved candidate refused the connection
    #[error("failed to connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        source: std::io::Error,
    },

    /// Listener could not be bound or put into listening state
    #[error("failed to bind {host}:{port}: {source}")]
    Bind {
        host: String,
        port: u16,
        source: std::io::Error,
    },

    /// Chained upstream proxy refused the CONNECT or failed mid-relay
    #[error("upstream proxy error: {0}")]
    UpstreamProxy(String),

    /// Either leg of the dual TLS handshake failed
    #[error("TLS handshake with {peer} failed: {source}")]
    Handshake {
        peer: &'static str,
        source: std::io::Error,
    },

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for the intercepting proxy
pub type Result<T> = std::result::Result<T, Error>;

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Config(err.to_string())
    }
}
