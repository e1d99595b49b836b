//! TLS configuration and certificate loading.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificates found in {}", .0.display())]
    NoCertificates(PathBuf),

    #[error("no private key found in {}", .0.display())]
    NoPrivateKey(PathBuf),

    #[error("invalid TLS material: {0}")]
    Rustls(#[source] std::io::Error),
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    File::open(path).map(BufReader::new).map_err(|source| TlsError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> TlsError {
    let path = path.to_path_buf();
    move |source| TlsError::Io { path, source }
}

/// Check that the PEM files hold a certificate chain and a private key.
///
/// Returns the number of certificates in the chain.
pub fn inspect_pem(cert_path: &Path, key_path: &Path) -> Result<usize, TlsError> {
    let certs = rustls_pemfile::certs(&mut open(cert_path)?)
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_error(cert_path))?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates(cert_path.to_path_buf()));
    }

    match rustls_pemfile::private_key(&mut open(key_path)?).map_err(io_error(key_path))? {
        Some(_) => Ok(certs.len()),
        None => Err(TlsError::NoPrivateKey(key_path.to_path_buf())),
    }
}

/// Load TLS configuration from certificate and key files.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, TlsError> {
    let chain_len = inspect_pem(cert_path, key_path)?;
    tracing::debug!(cert = %cert_path.display(), chain_len, "Loading TLS material");

    RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(TlsError::Rustls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_files() {
        let err = inspect_pem(Path::new("/nonexistent/cert.pem"), Path::new("/nonexistent/key.pem")).unwrap_err();
        assert!(matches!(err, TlsError::Io { .. }));
    }

    #[test]
    fn test_empty_pem_has_no_certificates() {
        let mut cert = tempfile::NamedTempFile::new().unwrap();
        cert.write_all(b"not a certificate\n").unwrap();
        let err = inspect_pem(cert.path(), cert.path()).unwrap_err();
        assert!(matches!(err, TlsError::NoCertificates(_)));
    }
}
