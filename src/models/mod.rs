//! Data structures shared across the proxy

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Outcome of a single proxied connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Request method from the request line
    pub method: String,

    /// Fully-qualified target URI (`scheme://host:port/path`)
    pub url: String,

    /// Client socket address
    pub client_addr: SocketAddr,

    /// Whether the connection was intercepted with dual TLS sessions
    pub intercepted: bool,

    /// Whether the request was relayed through a chained upstream proxy
    pub via_upstream: bool,

    /// Error rendered to the client, if the connection failed
    pub error: Option<String>,

    /// Timestamp of the record
    pub timestamp: DateTime<Utc>,
}

impl ConnectionRecord {
    /// Create a new record for an accepted connection
    pub fn new(method: String, url: String, client_addr: SocketAddr) -> Self {
        Self {
            method,
            url,
            client_addr,
            intercepted: false,
            via_upstream: false,
            error: None,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_serializes_to_json() {
        let record = ConnectionRecord::new(
            "GET".to_string(),
            "http://example.com:80/".to_string(),
            "127.0.0.1:54321".parse().unwrap(),
        );
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"method\":\"GET\""));
        assert!(json.contains("example.com"));
    }
}
