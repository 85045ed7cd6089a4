//! Certificate generation for TLS interception

use anyhow::{anyhow, Context};
use base64::{engine::general_purpose, Engine as _};
use rcgen::{Certificate, CertificateParams, DistinguishedName};
use rustls::{Certificate as RustlsCertificate, PrivateKey};
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

use crate::error::Result;

/// Certificate data containing both certificate and private key
#[derive(Debug, Clone)]
pub struct CertificateData {
    pub cert: RustlsCertificate,
    pub key: PrivateKey,
}

/// Generate a certificate impersonating `hostname` for the client-facing leg
pub fn generate_impersonated_cert(
    hostname: &str,
    organization: &str,
    validity_days: u32,
) -> Result<CertificateData> {
    debug!("Generating impersonated certificate for {}", hostname);

    let mut params = CertificateParams::new(vec![hostname.to_string()]);

    let mut distinguished_name = DistinguishedName::new();
    distinguished_name.push(rcgen::DnType::OrganizationName, organization);
    distinguished_name.push(rcgen::DnType::CommonName, hostname);
    params.distinguished_name = distinguished_name;

    let now = SystemTime::now();
    params.not_before = now.into();
    params.not_after = (now + Duration::from_secs(validity_days as u64 * 24 * 60 * 60)).into();

    params.subject_alt_names = vec![rcgen::SanType::DnsName(hostname.to_string())];

    params.key_usages = vec![
        rcgen::KeyUsagePurpose::DigitalSignature,
        rcgen::KeyUsagePurpose::KeyEncipherment,
    ];
    params.extended_key_usages = vec![rcgen::ExtendedKeyUsagePurpose::ServerAuth];

    let cert = Certificate::from_params(params)
        .map_err(|e| anyhow!("Failed to generate certificate: {}", e))?;

    let cert_der = RustlsCertificate(
        cert.serialize_der()
            .map_err(|e| anyhow!("Failed to serialize certificate: {}", e))?,
    );
    let key_der = PrivateKey(cert.serialize_private_key_der());

    Ok(CertificateData {
        cert: cert_der,
        key: key_der,
    })
}

/// Load certificate and private key from PEM or DER files
pub fn load_cert_from_files(cert_path: &str, key_path: &str) -> Result<CertificateData> {
    debug!("Loading certificate from {} and key from {}", cert_path, key_path);

    let cert_path = Path::new(cert_path);
    let key_path = Path::new(key_path);

    let cert_data = fs::read(cert_path)
        .with_context(|| format!("Failed to read certificate file: {}", cert_path.display()))?;
    let key_data = fs::read(key_path)
        .with_context(|| format!("Failed to read private key file: {}", key_path.display()))?;

    let cert = if cert_path.extension().map_or(false, |ext| ext == "der") {
        RustlsCertificate(cert_data)
    } else {
        let mut reader = std::io::BufReader::new(cert_data.as_slice());
        let certs = rustls_pemfile::certs(&mut reader)
            .map_err(|e| anyhow!("Failed to parse certificate PEM: {}", e))?;
        let der = certs
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No certificate found in PEM data"))?;
        RustlsCertificate(der)
    };

    let key = if key_path.extension().map_or(false, |ext| ext == "der") {
        PrivateKey(key_data)
    } else {
        let mut reader = std::io::BufReader::new(key_data.as_slice());
        let keys = rustls_pemfile::read_all(&mut reader)
            .map_err(|e| anyhow!("Failed to parse private key PEM: {}", e))?;
        let der = keys
            .into_iter()
            .find_map(|item| match item {
                rustls_pemfile::Item::PKCS8Key(der)
                | rustls_pemfile::Item::RSAKey(der)
                | rustls_pemfile::Item::ECKey(der) => Some(der),
                _ => None,
            })
            .ok_or_else(|| anyhow!("No supported private key format found in PEM data"))?;
        PrivateKey(der)
    };

    info!("Loaded interception certificate from {}", cert_path.display());

    Ok(CertificateData { cert, key })
}

/// Save certificate data to PEM files
pub fn save_cert_to_files(
    cert_data: &CertificateData,
    cert_path: &str,
    key_path: &str,
) -> Result<()> {
    debug!("Saving certificate to {} and key to {}", cert_path, key_path);

    if let Some(parent) = Path::new(cert_path).parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create certificate directory: {}", parent.display()))?;
    }

    fs::write(cert_path, to_pem("CERTIFICATE", &cert_data.cert.0))
        .with_context(|| format!("Failed to write certificate file: {}", cert_path))?;
    fs::write(key_path, to_pem("PRIVATE KEY", &cert_data.key.0))
        .with_context(|| format!("Failed to write private key file: {}", key_path))?;

    Ok(())
}

fn to_pem(label: &str, der: &[u8]) -> String {
    let b64 = general_purpose::STANDARD.encode(der);
    let lines: Vec<&str> = b64
        .as_bytes()
        .chunks(64)
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or(""))
        .collect();
    format!(
        "-----BEGIN {label}-----\n{}\n-----END {label}-----\n",
        lines.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_cert_has_der_content() {
        let cert = generate_impersonated_cert("intercepted.example.com", "Test Org", 30).unwrap();
        assert!(!cert.cert.0.is_empty());
        assert!(!cert.key.0.is_empty());
    }

    #[test]
    fn save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cert_path = dir.path().join("host.crt");
        let key_path = dir.path().join("host.key");

        let generated = generate_impersonated_cert("round.trip.example", "Test Org", 7).unwrap();
        save_cert_to_files(
            &generated,
            cert_path.to_str().unwrap(),
            key_path.to_str().unwrap(),
        )
        .unwrap();

        let loaded =
            load_cert_from_files(cert_path.to_str().unwrap(), key_path.to_str().unwrap()).unwrap();
        assert_eq!(loaded.cert.0, generated.cert.0);
        assert_eq!(loaded.key.0, generated.key.0);
    }
}
