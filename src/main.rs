//! Main entry point for the Rust Intercept Proxy

use clap::Parser;
use rust_intercept_proxy::config::UpstreamProxyConfig;
use rust_intercept_proxy::{init_logger, log_info, ProxyConfig, ProxyServer};

/// HTTP/HTTPS intercepting proxy
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Listen host, overriding the configuration
    #[arg(short = 'b', long)]
    listen_host: Option<String>,

    /// Listen port, overriding the configuration
    #[arg(short = 'p', long)]
    listen_port: Option<u16>,

    /// Upstream proxy to chain through, as host:port
    #[arg(short = 'X', long)]
    upstream_proxy: Option<String>,

    /// Verbose connection-level logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = ProxyConfig::load_config(args.config.as_deref())?;

    if let Some(host) = args.listen_host {
        config.listen.host = host;
    }
    if let Some(port) = args.listen_port {
        config.listen.port = port;
    }
    if let Some(upstream) = args.upstream_proxy {
        let (host, port) = upstream
            .rsplit_once(':')
            .ok_or_else(|| anyhow::anyhow!("upstream proxy must be host:port"))?;
        config.upstream_proxy = Some(UpstreamProxyConfig {
            host: host.to_string(),
            port: port.parse()?,
        });
    }
    if args.verbose {
        config.verbose = true;
    }

    init_logger(&config.log_level);

    log_info!("Starting intercepting proxy");
    log_info!(
        "Test with: curl -x http://{}:{} https://example.com/",
        config.listen.host,
        config.listen.port
    );

    ProxyServer::new(config).start().await?;
    Ok(())
}
