//! TLS configuration and certificate loading.
//!
//! # Design Decisions
//! - The rustls server config is built here rather than by axum-server so
//!   client certificates can be requested and verified
//! - Client CAs are loaded before the server identity; a bad CA bundle is
//!   reported even when the server files are also wrong
//! - `reject_unauthorized = false` admits clients without a certificate; a
//!   presented certificate must still chain to a configured CA

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::RootCertStore;

use crate::config::TlsConfig;

/// Build the listener's rustls config from the PEM files in `config`.
pub fn load_tls_config(config: &TlsConfig) -> Result<RustlsConfig, io::Error> {
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let builder = rustls::ServerConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(invalid_data)?;

    let builder = if config.request_cert {
        let verifier = WebPkiClientVerifier::builder_with_provider(
            Arc::new(load_client_roots(&config.ca)?),
            provider,
        );
        let verifier = if config.reject_unauthorized {
            verifier
        } else {
            verifier.allow_unauthenticated()
        };
        tracing::info!(
            cas = config.ca.len(),
            required = config.reject_unauthorized,
            "Client certificates requested"
        );
        builder.with_client_cert_verifier(verifier.build().map_err(invalid_data)?)
    } else {
        builder.with_no_client_auth()
    };

    let certs = read_certs(Path::new(&config.cert_path), "Certificate")?;
    let key = read_key(Path::new(&config.key_path))?;
    let mut server = builder.with_single_cert(certs, key).map_err(invalid_data)?;
    server.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    tracing::debug!(cert = %config.cert_path, key = %config.key_path, "TLS material loaded");
    Ok(RustlsConfig::from_config(Arc::new(server)))
}

fn load_client_roots(paths: &[String]) -> Result<RootCertStore, io::Error> {
    let mut roots = RootCertStore::empty();
    for path in paths {
        for cert in read_certs(Path::new(path), "CA")? {
            roots.add(cert).map_err(invalid_data)?;
        }
    }
    Ok(roots)
}

fn open(path: &Path, what: &str) -> Result<BufReader<File>, io::Error> {
    if !path.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} file not found: {:?}", what, path),
        ));
    }
    Ok(BufReader::new(File::open(path)?))
}

fn read_certs(path: &Path, what: &str) -> Result<Vec<CertificateDer<'static>>, io::Error> {
    let mut reader = open(path, what)?;
    let certs = rustls_pemfile::certs(&mut reader).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} file holds no PEM certificate: {:?}", what, path),
        ));
    }
    Ok(certs)
}

fn read_key(path: &Path) -> Result<PrivateKeyDer<'static>, io::Error> {
    let mut reader = open(path, "Private key")?;
    rustls_pemfile::private_key(&mut reader)?.ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Private key file holds no PEM key: {:?}", path),
        )
    })
}

fn invalid_data<E>(e: E) -> io::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    io::Error::new(io::ErrorKind::InvalidData, e)
}
