//! TLS capability for HTTPS interception
//!
//! The interception core consumes four operations from this module: build a
//! client context (proxy acting as TLS client toward the real server), build
//! a server context presenting an impersonated identity for one hostname
//! (proxy acting as TLS server toward the browser), and run either handshake
//! over an established TCP connection. Each handshake produces a stream that
//! owns exactly one socket; the two sides never share cryptographic state.

pub mod cert_gen;
pub mod config;

pub use cert_gen::{generate_impersonated_cert, load_cert_from_files, CertificateData};
pub use config::{create_client_config, create_server_config};

use crate::config::TlsConfig;
use crate::error::{Error, Result};
use rustls::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::{client, server, TlsAcceptor, TlsConnector};
use tracing::debug;

/// Build the proxy→server TLS context
pub fn client_context(tls_config: &TlsConfig) -> Result<TlsConnector> {
    let config = create_client_config(tls_config)?;
    Ok(TlsConnector::from(config))
}

/// Build the proxy→client TLS context impersonating `hostname`
///
/// Uses the certificate/key files from the configuration when both are set,
/// otherwise generates a fresh per-host certificate.
pub fn server_context(hostname: &str, tls_config: &TlsConfig) -> Result<TlsAcceptor> {
    let cert_data = match (&tls_config.cert_path, &tls_config.key_path) {
        (Some(cert_path), Some(key_path)) => load_cert_from_files(cert_path, key_path)?,
        _ => generate_impersonated_cert(
            hostname,
            &tls_config.cert_organization,
            tls_config.cert_validity_days,
        )?,
    };

    let config = create_server_config(cert_data.cert, cert_data.key)?;
    Ok(TlsAcceptor::from(config))
}

/// Proxy→server handshake: the proxy plays TLS client
pub async fn handshake_with_server(
    connector: &TlsConnector,
    hostname: &str,
    stream: TcpStream,
) -> Result<client::TlsStream<TcpStream>> {
    let server_name = ServerName::try_from(hostname).map_err(|_| Error::Handshake {
        peer: "server",
        source: std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("invalid server name: {}", hostname),
        ),
    })?;

    let tls_stream = connector
        .connect(server_name, stream)
        .await
        .map_err(|source| Error::Handshake {
            peer: "server",
            source,
        })?;

    debug!("TLS handshake with server {} done", hostname);
    Ok(tls_stream)
}

/// Proxy→client handshake: the proxy plays TLS server with a fake identity
pub async fn handshake_with_client(
    acceptor: &TlsAcceptor,
    stream: TcpStream,
) -> Result<server::TlsStream<TcpStream>> {
    let tls_stream = acceptor
        .accept(stream)
        .await
        .map_err(|source| Error::Handshake {
            peer: "client",
            source,
        })?;

    debug!("TLS handshake with client done");
    Ok(tls_stream)
}
