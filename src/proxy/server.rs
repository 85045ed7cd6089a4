//! Accept loop and per-connection handling

use crate::config::ProxyConfig;
use crate::error::Result;
use crate::http;
use crate::log_connection_record;
use crate::models::ConnectionRecord;
use crate::net::{self, io};
use crate::proxy::context::ConnectionContext;
use crate::proxy::hook::{MessageHook, NoopHook};
use crate::proxy::intercept::InterceptSession;
use crate::proxy::relay;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::{debug, error, info, warn};

/// The intercepting proxy server
pub struct ProxyServer {
    config: Arc<ProxyConfig>,
    hook: Arc<dyn MessageHook>,
}

impl ProxyServer {
    /// Create a proxy server with a pass-through hook
    pub fn new(config: ProxyConfig) -> Self {
        Self::with_hook(config, Arc::new(NoopHook))
    }

    /// Create a proxy server with a message transformation hook
    pub fn with_hook(config: ProxyConfig, hook: Arc<dyn MessageHook>) -> Self {
        Self {
            config: Arc::new(config),
            hook,
        }
    }

    /// Bind the listener and serve connections until the process ends
    pub async fn start(self) -> Result<()> {
        let listener = net::bind_listener(
            &self.config.listen.host,
            self.config.listen.port,
            self.config.listen.backlog,
            self.config.address_family,
        )
        .await?;

        info!(
            "Listening on {}:{}",
            self.config.listen.host, self.config.listen.port
        );
        if let Some(upstream) = &self.config.upstream_proxy {
            info!("Chaining through upstream proxy {}:{}", upstream.host, upstream.port);
        }

        loop {
            let (client, client_addr) = listener.accept().await?;
            debug!("New connection from {}", client_addr);

            let config = Arc::clone(&self.config);
            let hook = Arc::clone(&self.hook);
            tokio::spawn(async move {
                handle_connection(client, client_addr, config, hook).await;
            });
        }
    }
}

/// Handle one accepted client connection to completion
async fn handle_connection(
    mut client: TcpStream,
    client_addr: SocketAddr,
    config: Arc<ProxyConfig>,
    hook: Arc<dyn MessageHook>,
) {
    let request = match io::read_all(&mut client).await {
        Ok(Some(request)) => request,
        Ok(None) => {
            debug!("{} closed before sending a request", client_addr);
            return;
        }
        Err(e) => {
            warn!("failed to read request from {}: {}", client_addr, e);
            return;
        }
    };

    let target = match http::parse(&request) {
        Ok(target) => target,
        Err(e) => {
            warn!("unparseable request from {}: {}", client_addr, e);
            return;
        }
    };

    let mut record = ConnectionRecord::new(target.method.clone(), target.full_uri(), client_addr);
    record.intercepted = target.is_tls;
    record.via_upstream = config.upstream_proxy.is_some();

    if config.verbose {
        info!("{} {} from {}", target.method, record.url, client_addr);
    }

    match proxy_request(client, client_addr, request, target, &config, hook).await {
        Ok(()) => {
            debug!("connection from {} finished", client_addr);
        }
        Err(e) => {
            error!("connection from {} failed: {}", client_addr, e);
            record.error = Some(e.to_string());
        }
    }

    log_connection_record!(&record);
}

/// Route one parsed request: connect out, then intercept or forward
async fn proxy_request(
    mut client: TcpStream,
    client_addr: SocketAddr,
    request: Vec<u8>,
    target: http::ParsedTarget,
    config: &ProxyConfig,
    hook: Arc<dyn MessageHook>,
) -> Result<()> {
    let via_upstream = config.upstream_proxy.is_some();
    let (dest_host, dest_port) = match &config.upstream_proxy {
        Some(upstream) => (upstream.host.as_str(), upstream.port),
        None => (target.hostname.as_str(), target.port),
    };

    let server = match net::connect_to_host(dest_host, dest_port, config.address_family).await {
        Ok(server) => server,
        Err(e) => {
            // The client socket is still plaintext at this point, so a
            // human-readable error page can be delivered before teardown.
            write_error_page(&mut client, &e.to_string()).await;
            return Err(e);
        }
    };

    let uri = target.full_uri();
    let ctx = ConnectionContext {
        client,
        server,
        target,
        client_addr,
        via_upstream,
    };

    if ctx.is_tls() {
        let mut session = InterceptSession::new();
        let tunnel = session.establish(ctx, &request, config).await?;
        relay::relay_bidirectional(tunnel.client, tunnel.server, uri, hook).await
    } else {
        let ConnectionContext {
            mut client,
            mut server,
            ..
        } = ctx;
        relay::forward_plain(&mut client, &mut server, request, &uri, hook.as_ref(), !via_upstream)
            .await
    }
}

/// Write a minimal HTML error page over the still-plaintext client socket
async fn write_error_page(client: &mut TcpStream, message: &str) {
    let page = format!(
        "<html><body><h1>rust-intercept-proxy error page</h1><br/>{}</body></html>",
        message
    );
    if let Err(e) = io::write_all(client, page.as_bytes()).await {
        error!("failed to write error page: {}", e);
    }
}
