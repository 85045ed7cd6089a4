//! TLS interception session
//!
//! Turns a CONNECT tunnel into two independent TLS sessions with the proxy in
//! the middle: one where the proxy plays TLS client toward the real server,
//! one where it plays TLS server toward the browser with an impersonated
//! identity. Between the two, plaintext is available to the relay and the
//! hook boundary. When an upstream proxy is configured the original CONNECT
//! request is first relayed to it verbatim and its response must be an HTTP
//! 200 before any handshake starts.

use crate::config::ProxyConfig;
use crate::error::{Error, Result};
use crate::net::io;
use crate::proxy::context::ConnectionContext;
use crate::tls;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::{client, server};
use tracing::{debug, error};

/// Literal response telling the browser that tunneling begins
pub const TUNNEL_ESTABLISHED: &[u8] = b"HTTP/1.0 200 Connection established\r\n\r\n";

/// Progress of one interception attempt
///
/// Transitions only move forward; any failure lands in `Failed` and the
/// session is never retried. Sockets and handshake state opened along the way
/// are dropped (closed) when the session is abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptState {
    Init,
    ConnectedPlaintext,
    UpstreamTunnelEstablished,
    ServerHandshakeDone,
    ClientNotified,
    ClientHandshakeDone,
    Failed,
}

/// The two plaintext channels produced by a successful interception
///
/// Each TLS stream owns exactly one socket; they share no cryptographic
/// state. Bytes cross between them only through the relay.
#[derive(Debug)]
pub struct InterceptedTunnel {
    /// Browser-facing session (proxy as TLS server)
    pub client: server::TlsStream<TcpStream>,
    /// Server-facing session (proxy as TLS client)
    pub server: client::TlsStream<TcpStream>,
}

/// One interception attempt over an established outbound connection
pub struct InterceptSession {
    state: InterceptState,
}

impl InterceptSession {
    pub fn new() -> Self {
        Self {
            state: InterceptState::Init,
        }
    }

    /// Terminal or current state of the session
    pub fn state(&self) -> InterceptState {
        self.state
    }

    fn advance(&mut self, next: InterceptState) {
        debug!("intercept: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn fail<T>(&mut self, err: Error) -> Result<T> {
        error!("intercept failed in {:?}: {}", self.state, err);
        self.state = InterceptState::Failed;
        Err(err)
    }

    /// Run the dual-handshake sequence
    ///
    /// Consumes the connection context: on success both sockets live on
    /// inside the returned tunnel, on failure everything already opened is
    /// closed by drop.
    pub async fn establish(
        &mut self,
        ctx: ConnectionContext,
        raw_request: &[u8],
        config: &ProxyConfig,
    ) -> Result<InterceptedTunnel> {
        let ConnectionContext {
            mut client,
            mut server,
            target,
            via_upstream,
            ..
        } = ctx;

        self.advance(InterceptState::ConnectedPlaintext);

        if via_upstream {
            if let Err(e) = relay_connect_through_upstream(&mut server, raw_request).await {
                return self.fail(e);
            }
            self.advance(InterceptState::UpstreamTunnelEstablished);
        }

        let connector = match tls::client_context(&config.tls) {
            Ok(c) => c,
            Err(e) => return self.fail(e),
        };
        let server_tls = match tls::handshake_with_server(&connector, &target.hostname, server).await
        {
            Ok(s) => s,
            Err(e) => return self.fail(e),
        };
        self.advance(InterceptState::ServerHandshakeDone);

        if let Err(e) = io::write_all(&mut client, TUNNEL_ESTABLISHED).await {
            return self.fail(e);
        }
        self.advance(InterceptState::ClientNotified);

        let acceptor = match tls::server_context(&target.hostname, &config.tls) {
            Ok(a) => a,
            Err(e) => return self.fail(e),
        };
        let client_tls = match tls::handshake_with_client(&acceptor, client).await {
            Ok(s) => s,
            Err(e) => return self.fail(e),
        };
        self.advance(InterceptState::ClientHandshakeDone);

        Ok(InterceptedTunnel {
            client: client_tls,
            server: server_tls,
        })
    }
}

impl Default for InterceptSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Forward the original CONNECT request to a chained upstream proxy
///
/// The request goes out verbatim, absolute URI intact. Anything other than an
/// `HTTP/1.0 200` or `HTTP/1.1 200` response aborts the connection; there is
/// no fallback to plaintext.
pub(crate) async fn relay_connect_through_upstream<S>(
    upstream: &mut S,
    connect_request: &[u8],
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    io::write_all(upstream, connect_request)
        .await
        .map_err(|e| Error::UpstreamProxy(format!("failed to send CONNECT: {}", e)))?;

    let response = io::read_all(upstream)
        .await
        .map_err(|e| Error::UpstreamProxy(format!("failed to read CONNECT response: {}", e)))?
        .ok_or_else(|| Error::UpstreamProxy("upstream closed without responding".to_string()))?;

    if response.starts_with(b"HTTP/1.0 200") || response.starts_with(b"HTTP/1.1 200") {
        Ok(())
    } else {
        let line = response
            .split(|&b| b == b'\r' || b == b'\n')
            .next()
            .unwrap_or(&response);
        Err(Error::UpstreamProxy(format!(
            "bad response: {}",
            String::from_utf8_lossy(line)
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http;
    use crate::tls::cert_gen::generate_impersonated_cert;
    use crate::tls::config::{create_server_config, AcceptAllCertVerifier};
    use std::sync::Arc;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    #[tokio::test]
    async fn upstream_200_lets_the_session_proceed() {
        let (mut proxy_side, mut upstream_side) = duplex(io::CHUNK_SIZE);

        let upstream = tokio::spawn(async move {
            let request = io::read_all(&mut upstream_side).await.unwrap().unwrap();
            assert!(request.starts_with(b"CONNECT example.com:443"));
            io::write_all(&mut upstream_side, b"HTTP/1.1 200 Connection Established\r\n\r\n")
                .await
                .unwrap();
        });

        relay_connect_through_upstream(
            &mut proxy_side,
            b"CONNECT example.com:443 HTTP/1.1\r\n\r\n",
        )
        .await
        .unwrap();
        upstream.await.unwrap();
    }

    #[tokio::test]
    async fn upstream_403_aborts_before_any_handshake() {
        let (mut proxy_side, mut upstream_side) = duplex(io::CHUNK_SIZE);

        tokio::spawn(async move {
            let _ = io::read_all(&mut upstream_side).await;
            io::write_all(&mut upstream_side, b"HTTP/1.1 403 Forbidden\r\n\r\n")
                .await
                .unwrap();
        });

        let err = relay_connect_through_upstream(
            &mut proxy_side,
            b"CONNECT example.com:443 HTTP/1.1\r\n\r\n",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::UpstreamProxy(_)));
    }

    #[tokio::test]
    async fn upstream_close_without_response_is_an_upstream_error() {
        let (mut proxy_side, mut upstream_side) = duplex(io::CHUNK_SIZE);

        tokio::spawn(async move {
            let _ = io::read_all(&mut upstream_side).await;
            drop(upstream_side);
        });

        let err = relay_connect_through_upstream(
            &mut proxy_side,
            b"CONNECT example.com:443 HTTP/1.1\r\n\r\n",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::UpstreamProxy(_)));
    }

    #[tokio::test]
    async fn refused_upstream_marks_the_session_failed() {
        // "Upstream proxy" that rejects every CONNECT.
        let upstream_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let upstream_addr = upstream_listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = upstream_listener.accept().await.unwrap();
            let _ = io::read_all(&mut sock).await;
            io::write_all(&mut sock, b"HTTP/1.1 403 Forbidden\r\n\r\n")
                .await
                .unwrap();
        });

        let client_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client_addr = client_listener.local_addr().unwrap();
        let browser = tokio::spawn(async move { TcpStream::connect(client_addr).await.unwrap() });
        let (proxy_client_sock, peer) = client_listener.accept().await.unwrap();
        let _browser_sock = browser.await.unwrap();

        let raw = b"CONNECT example.com:443 HTTP/1.1\r\n\r\n".to_vec();
        let ctx = ConnectionContext {
            client: proxy_client_sock,
            server: TcpStream::connect(upstream_addr).await.unwrap(),
            target: http::parse(&raw).unwrap(),
            client_addr: peer,
            via_upstream: true,
        };

        let mut session = InterceptSession::new();
        let err = session
            .establish(ctx, &raw, &ProxyConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UpstreamProxy(_)));
        assert_eq!(session.state(), InterceptState::Failed);
    }

    #[tokio::test]
    async fn dual_handshake_establishes_both_plaintext_channels() {
        // Real server terminating TLS for "localhost" and echoing one message.
        let server_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server_listener.local_addr().unwrap();
        let cert = generate_impersonated_cert("localhost", "Test Org", 1).unwrap();
        let acceptor = tokio_rustls::TlsAcceptor::from(create_server_config(cert.cert, cert.key).unwrap());
        tokio::spawn(async move {
            let (sock, _) = server_listener.accept().await.unwrap();
            let mut tls = acceptor.accept(sock).await.unwrap();
            if let Some(data) = io::read_all(&mut tls).await.unwrap() {
                io::write_all(&mut tls, &data).await.unwrap();
            }
        });

        // Browser: waits for the tunnel notice, then speaks TLS to the proxy.
        let client_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client_addr = client_listener.local_addr().unwrap();
        let browser = tokio::spawn(async move {
            let mut sock = TcpStream::connect(client_addr).await.unwrap();
            let mut notice = vec![0u8; TUNNEL_ESTABLISHED.len()];
            sock.read_exact(&mut notice).await.unwrap();
            assert_eq!(notice, TUNNEL_ESTABLISHED);

            let tls_config = rustls::ClientConfig::builder()
                .with_safe_defaults()
                .with_custom_certificate_verifier(Arc::new(AcceptAllCertVerifier))
                .with_no_client_auth();
            let connector = tokio_rustls::TlsConnector::from(Arc::new(tls_config));
            let name = rustls::ServerName::try_from("localhost").unwrap();
            let mut tls = connector.connect(name, sock).await.unwrap();

            tls.write_all(b"ping").await.unwrap();
            tls.flush().await.unwrap();
            let mut back = vec![0u8; 4];
            tls.read_exact(&mut back).await.unwrap();
            assert_eq!(back, b"ping");
        });

        let (proxy_client_sock, peer) = client_listener.accept().await.unwrap();

        let raw = format!(
            "CONNECT localhost:{} HTTP/1.1\r\n\r\n",
            server_addr.port()
        )
        .into_bytes();
        let ctx = ConnectionContext {
            client: proxy_client_sock,
            server: TcpStream::connect(server_addr).await.unwrap(),
            target: http::parse(&raw).unwrap(),
            client_addr: peer,
            via_upstream: false,
        };

        let mut config = ProxyConfig::default();
        config.tls.skip_upstream_cert_verify = true;

        let mut session = InterceptSession::new();
        let tunnel = session.establish(ctx, &raw, &config).await.unwrap();
        assert_eq!(session.state(), InterceptState::ClientHandshakeDone);

        // One plaintext round across the two sessions.
        let InterceptedTunnel {
            mut client,
            mut server,
        } = tunnel;
        let request = io::read_all(&mut client).await.unwrap().unwrap();
        assert_eq!(request, b"ping");
        io::write_all(&mut server, &request).await.unwrap();
        let response = io::read_all(&mut server).await.unwrap().unwrap();
        io::write_all(&mut client, &response).await.unwrap();

        browser.await.unwrap();
    }
}
