//! Rust Intercept Proxy - An HTTP/HTTPS intercepting (MITM) proxy core
//!
//! Terminates client connections, parses proxy-style request lines, connects
//! outbound (directly or through a chained upstream proxy) and, for HTTPS
//! tunnels, runs two independent TLS sessions so plaintext is available at
//! the proxy for inspection and transformation.

pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod models;
pub mod net;
pub mod proxy;
pub mod tls;

// Re-export commonly used items
pub use config::ProxyConfig;
pub use error::{Error, Result};
pub use logging::{init_logger, log_connection, log_debug, log_error, log_info, log_warning};
pub use models::ConnectionRecord;
pub use proxy::{MessageHook, NoopHook, ProxyServer};
