//! Socket creation and resolution
//!
//! Outbound and listening sockets are created by resolving the host, then
//! walking the candidate addresses in resolver order until one works. The
//! address family policy from the configuration filters the candidate list
//! before iteration.

pub mod io;

use crate::config::AddressFamily;
use crate::error::{Error, Result};
use socket2::SockRef;
use std::net::SocketAddr;
use tokio::net::{lookup_host, TcpListener, TcpSocket, TcpStream};
use tracing::{debug, warn};

/// Connect to `host:port`, trying every resolved candidate
///
/// Keepalive is enabled on each attempted socket. The first successful
/// connection wins; when all candidates fail the last system error is
/// reported. Port 0 (produced by a non-numeric explicit port in the request
/// line) is rejected up front instead of being handed to the resolver.
pub async fn connect_to_host(host: &str, port: u16, family: AddressFamily) -> Result<TcpStream> {
    if port == 0 {
        return Err(Error::Connect {
            host: host.to_string(),
            port,
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "port 0 is not connectable"),
        });
    }

    let candidates = resolve(host, port, family).await?;
    connect_candidates(&candidates)
        .await
        .map_err(|source| Error::Connect {
            host: host.to_string(),
            port,
            source,
        })
}

/// Bind a listening socket on `host:port`
///
/// Address reuse is enabled before bind. Candidates are walked until one
/// binds; a listen failure after a successful bind is fatal rather than a
/// reason to try the next candidate.
pub async fn bind_listener(
    host: &str,
    port: u16,
    backlog: u32,
    family: AddressFamily,
) -> Result<TcpListener> {
    let candidates = resolve(host, port, family).await.map_err(rebrand_as_bind)?;

    let mut last_err = std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "no candidate address");
    for addr in &candidates {
        let socket = match socket_for(*addr) {
            Ok(s) => s,
            Err(e) => {
                last_err = e;
                continue;
            }
        };
        if let Err(e) = socket.set_reuseaddr(true) {
            warn!("failed to set SO_REUSEADDR on {}: {}", addr, e);
        }
        match socket.bind(*addr) {
            Ok(()) => {
                debug!("bound {}", addr);
                return socket.listen(backlog).map_err(|source| Error::Bind {
                    host: host.to_string(),
                    port,
                    source,
                });
            }
            Err(e) => {
                debug!("bind {} failed: {}", addr, e);
                last_err = e;
            }
        }
    }

    Err(Error::Bind {
        host: host.to_string(),
        port,
        source: last_err,
    })
}

/// Walk candidate addresses in resolver order, returning the first connection
pub(crate) async fn connect_candidates(candidates: &[SocketAddr]) -> std::io::Result<TcpStream> {
    let mut last_err =
        std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "no candidate address");

    for addr in candidates {
        let socket = match socket_for(*addr) {
            Ok(s) => s,
            Err(e) => {
                last_err = e;
                continue;
            }
        };
        if let Err(e) = SockRef::from(&socket).set_keepalive(true) {
            warn!("failed to set SO_KEEPALIVE on {}: {}", addr, e);
        }
        match socket.connect(*addr).await {
            Ok(stream) => {
                debug!("connected to {}", addr);
                return Ok(stream);
            }
            Err(e) => {
                debug!("connect {} failed: {}", addr, e);
                last_err = e;
            }
        }
    }

    Err(last_err)
}

async fn resolve(host: &str, port: u16, family: AddressFamily) -> Result<Vec<SocketAddr>> {
    let resolved = lookup_host((host, port)).await.map_err(|source| Error::Resolve {
        host: host.to_string(),
        port,
        source,
    })?;

    let candidates: Vec<SocketAddr> = resolved
        .filter(|addr| match family {
            AddressFamily::Any => true,
            AddressFamily::V4 => addr.is_ipv4(),
            AddressFamily::V6 => addr.is_ipv6(),
        })
        .collect();

    if candidates.is_empty() {
        return Err(Error::Resolve {
            host: host.to_string(),
            port,
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "resolver returned no address for the configured family",
            ),
        });
    }

    Ok(candidates)
}

fn socket_for(addr: SocketAddr) -> std::io::Result<TcpSocket> {
    if addr.is_ipv6() {
        TcpSocket::new_v6()
    } else {
        TcpSocket::new_v4()
    }
}

fn rebrand_as_bind(err: Error) -> Error {
    match err {
        Error::Resolve { host, port, source } => Error::Bind { host, port, source },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener as StdTcpListener;

    /// Reserve a loopback port that nothing is listening on.
    fn dead_addr() -> SocketAddr {
        let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr
    }

    #[tokio::test]
    async fn connect_skips_unreachable_candidates() {
        let live = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let good = live.local_addr().unwrap();
        let bad = dead_addr();

        let stream = connect_candidates(&[bad, good]).await.unwrap();
        assert_eq!(stream.peer_addr().unwrap(), good);
    }

    #[tokio::test]
    async fn connect_reports_last_error_when_all_candidates_fail() {
        let result = connect_candidates(&[dead_addr(), dead_addr()]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn port_zero_is_an_explicit_connect_error() {
        let err = connect_to_host("localhost", 0, AddressFamily::Any)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connect { port: 0, .. }));
    }

    #[tokio::test]
    async fn bind_listener_accepts_connections() {
        let listener = bind_listener("127.0.0.1", 0, 16, AddressFamily::Any)
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::net::TcpStream::connect(addr).await.unwrap();
        let (accepted, _) = listener.accept().await.unwrap();
        assert_eq!(accepted.peer_addr().unwrap(), client.local_addr().unwrap());
    }

    #[tokio::test]
    async fn v6_policy_rejects_v4_only_host() {
        let err = connect_to_host("127.0.0.1", 80, AddressFamily::V6)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Resolve { .. }));
    }
}
