//! rustls configuration for the two interception legs

use crate::config::TlsConfig;
use crate::error::Result;
use rustls::client::{ServerCertVerified, ServerCertVerifier};
use rustls::{Certificate, ClientConfig, PrivateKey, RootCertStore, ServerConfig};
use std::sync::Arc;
use tracing::{debug, warn};

/// Create the rustls ServerConfig presented to the intercepted browser
pub fn create_server_config(cert: Certificate, key: PrivateKey) -> Result<Arc<ServerConfig>> {
    let config = ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(vec![cert], key)?;

    Ok(Arc::new(config))
}

/// Create the rustls ClientConfig used toward the real server
pub fn create_client_config(tls_config: &TlsConfig) -> Result<Arc<ClientConfig>> {
    let config = if tls_config.skip_upstream_cert_verify {
        warn!("skipping upstream certificate verification (insecure)");
        ClientConfig::builder()
            .with_safe_defaults()
            .with_custom_certificate_verifier(Arc::new(AcceptAllCertVerifier))
            .with_no_client_auth()
    } else {
        let mut root_store = RootCertStore::empty();
        add_system_root_certificates(&mut root_store);
        ClientConfig::builder()
            .with_safe_defaults()
            .with_root_certificates(root_store)
            .with_no_client_auth()
    };

    Ok(Arc::new(config))
}

/// Add system root certificates to the root store
///
/// A missing system store is tolerated so the proxy still starts in stripped
/// environments; handshakes will then fail per-connection instead.
fn add_system_root_certificates(root_store: &mut RootCertStore) {
    match rustls_native_certs::load_native_certs() {
        Ok(certs) => {
            let mut added = 0;
            for cert in certs {
                if root_store.add(&Certificate(cert.0)).is_ok() {
                    added += 1;
                }
            }
            debug!("loaded {} system root certificates", added);
        }
        Err(e) => {
            warn!("could not load system root certificates: {}", e);
        }
    }
}

/// Certificate verifier that accepts any server certificate
pub struct AcceptAllCertVerifier;

impl ServerCertVerifier for AcceptAllCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &rustls::ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: std::time::SystemTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::cert_gen::generate_impersonated_cert;

    #[test]
    fn server_config_accepts_generated_cert() {
        let cert = generate_impersonated_cert("config.test.example", "Test Org", 1).unwrap();
        let config = create_server_config(cert.cert, cert.key);
        assert!(config.is_ok());
    }

    #[test]
    fn client_config_builds_with_and_without_verification() {
        let mut tls_config = crate::config::TlsConfig::default();
        assert!(create_client_config(&tls_config).is_ok());

        tls_config.skip_upstream_cert_verify = true;
        assert!(create_client_config(&tls_config).is_ok());
    }
}
