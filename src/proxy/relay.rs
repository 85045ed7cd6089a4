//! Plaintext relay between client and server
//!
//! Every message crossing the proxy goes through the hook boundary with the
//! fully-qualified target URI attached. Plain HTTP gets a single
//! request/response round; an intercepted tunnel is relayed bidirectionally,
//! one forwarding future per direction, so neither side can starve the other.

use crate::error::Result;
use crate::http;
use crate::net::io;
use crate::proxy::hook::{Direction, MessageHook};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Forward one plain HTTP round: request out, response back
///
/// `normalize` must be true for direct forwarding (the destination server
/// expects an origin-form request line) and false when the destination is a
/// chained upstream proxy (which expects the absolute URI intact).
pub async fn forward_plain<C, S>(
    client: &mut C,
    server: &mut S,
    mut request: Vec<u8>,
    uri: &str,
    hook: &dyn MessageHook,
    normalize: bool,
) -> Result<()>
where
    C: AsyncRead + AsyncWrite + Unpin,
    S: AsyncRead + AsyncWrite + Unpin,
{
    if normalize {
        http::normalize_in_place(&mut request)?;
    }

    let request = hook.transform(request, uri, Direction::Request);
    io::write_all(server, &request).await?;

    let response = match io::read_all(server).await? {
        Some(data) => data,
        None => {
            debug!("server closed without responding");
            return Ok(());
        }
    };

    let response = hook.transform(response, uri, Direction::Response);
    io::write_all(client, &response).await?;
    Ok(())
}

/// Relay an intercepted tunnel until either side closes
///
/// Runs one forwarding future per direction over the split halves of the two
/// TLS sessions; each full message read from one side is passed through the
/// hook and written to the other. A close on one side shuts down the paired
/// write half and lets the opposite direction drain.
pub async fn relay_bidirectional<C, S>(
    client: C,
    server: S,
    uri: String,
    hook: Arc<dyn MessageHook>,
) -> Result<()>
where
    C: AsyncRead + AsyncWrite + Unpin,
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut client_read, mut client_write) = tokio::io::split(client);
    let (mut server_read, mut server_write) = tokio::io::split(server);

    let upstream_hook = Arc::clone(&hook);
    let upstream_uri = uri.clone();
    let upstream = async move {
        loop {
            match io::read_all(&mut client_read).await? {
                Some(data) => {
                    let data = upstream_hook.transform(data, &upstream_uri, Direction::Request);
                    io::write_all(&mut server_write, &data).await?;
                }
                None => {
                    debug!("client closed, shutting down server write half");
                    let _ = server_write.shutdown().await;
                    return Ok::<(), crate::error::Error>(());
                }
            }
        }
    };

    let downstream = async move {
        loop {
            match io::read_all(&mut server_read).await? {
                Some(data) => {
                    let data = hook.transform(data, &uri, Direction::Response);
                    io::write_all(&mut client_write, &data).await?;
                }
                None => {
                    debug!("server closed, shutting down client write half");
                    let _ = client_write.shutdown().await;
                    return Ok(());
                }
            }
        }
    };

    tokio::try_join!(upstream, downstream)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::hook::NoopHook;
    use tokio::io::duplex;

    /// Hook that uppercases requests and reverses responses, so the test can
    /// tell both directions were transformed.
    struct MarkingHook;

    impl MessageHook for MarkingHook {
        fn transform(&self, data: Vec<u8>, _uri: &str, direction: Direction) -> Vec<u8> {
            match direction {
                Direction::Request => data.to_ascii_uppercase(),
                Direction::Response => {
                    let mut data = data;
                    data.reverse();
                    data
                }
            }
        }
    }

    #[tokio::test]
    async fn plain_round_normalizes_and_relays() {
        let (mut proxy_client, mut browser) = duplex(io::CHUNK_SIZE);
        let (mut proxy_server, mut origin) = duplex(io::CHUNK_SIZE);

        let origin_task = tokio::spawn(async move {
            let request = io::read_all(&mut origin).await.unwrap().unwrap();
            assert_eq!(request, b"GET /index.html HTTP/1.1\r\n\r\n".to_vec());
            io::write_all(&mut origin, b"HTTP/1.1 200 OK\r\n\r\nhello")
                .await
                .unwrap();
        });

        let request = b"GET http://example.com/index.html HTTP/1.1\r\n\r\n".to_vec();
        forward_plain(
            &mut proxy_client,
            &mut proxy_server,
            request,
            "http://example.com:80/index.html",
            &NoopHook,
            true,
        )
        .await
        .unwrap();

        let response = io::read_all(&mut browser).await.unwrap().unwrap();
        assert_eq!(response, b"HTTP/1.1 200 OK\r\n\r\nhello".to_vec());
        origin_task.await.unwrap();
    }

    #[tokio::test]
    async fn chained_round_keeps_absolute_uri() {
        let (mut proxy_client, _browser) = duplex(io::CHUNK_SIZE);
        let (mut proxy_server, mut upstream) = duplex(io::CHUNK_SIZE);

        let upstream_task = tokio::spawn(async move {
            let request = io::read_all(&mut upstream).await.unwrap().unwrap();
            // absolute URI must survive untouched through a chained proxy
            assert_eq!(
                request,
                b"GET http://example.com/index.html HTTP/1.1\r\n\r\n".to_vec()
            );
            drop(upstream);
        });

        let request = b"GET http://example.com/index.html HTTP/1.1\r\n\r\n".to_vec();
        forward_plain(
            &mut proxy_client,
            &mut proxy_server,
            request,
            "http://example.com:80/index.html",
            &NoopHook,
            false,
        )
        .await
        .unwrap();
        upstream_task.await.unwrap();
    }

    #[tokio::test]
    async fn bidirectional_relay_applies_hook_both_ways() {
        let (proxy_client, mut browser) = duplex(io::CHUNK_SIZE);
        let (proxy_server, mut origin) = duplex(io::CHUNK_SIZE);

        let relay = tokio::spawn(relay_bidirectional(
            proxy_client,
            proxy_server,
            "https://example.com:443/".to_string(),
            Arc::new(MarkingHook),
        ));

        io::write_all(&mut browser, b"ping").await.unwrap();
        let at_origin = io::read_all(&mut origin).await.unwrap().unwrap();
        assert_eq!(at_origin, b"PING".to_vec());

        io::write_all(&mut origin, b"pong").await.unwrap();
        let at_browser = io::read_all(&mut browser).await.unwrap().unwrap();
        assert_eq!(at_browser, b"gnop".to_vec());

        drop(browser);
        drop(origin);
        relay.await.unwrap().unwrap();
    }
}
