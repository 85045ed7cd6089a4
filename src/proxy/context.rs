//! Per-connection state

use crate::http::ParsedTarget;
use std::net::SocketAddr;
use tokio::net::TcpStream;

/// State owned by one accepted client connection
///
/// Created once the outbound connection has been established; both sockets
/// are exclusively owned here until interception (which consumes them into
/// TLS sessions) or plain forwarding takes over. Nothing in this structure is
/// shared across connections.
pub struct ConnectionContext {
    /// Socket facing the original client (browser)
    pub client: TcpStream,

    /// Socket facing the destination: the target server, or the chained
    /// upstream proxy when one is configured
    pub server: TcpStream,

    /// Routing target parsed from the request line
    pub target: ParsedTarget,

    /// Address the client connected from
    pub client_addr: SocketAddr,

    /// Whether the destination socket points at a chained upstream proxy
    pub via_upstream: bool,
}

impl ConnectionContext {
    /// Whether this connection requires TLS interception
    pub fn is_tls(&self) -> bool {
        self.target.is_tls
    }
}
