//! HTTP transport factory for REST directory clients.
//!
//! Owns the certificate-trust decisions: the platform roots by default, a
//! single pinned CA when one is configured, or (explicit opt-in only) no
//! verification at all for self-signed internal deployments.

use crate::error::AppError;
use crate::observability::inject_trace_context;
use reqwest::header::HeaderMap;
use reqwest::{Certificate, Client, RequestBuilder};
use std::path::PathBuf;
use std::time::Duration;

/// How the HTTP client should be built.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub ca_certificate: Option<PathBuf>,
    pub accept_invalid_certs: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            ca_certificate: None,
            accept_invalid_certs: false,
        }
    }
}

/// Build a `reqwest::Client` honouring the timeout and trust settings.
pub fn build_client(settings: &HttpSettings) -> Result<Client, AppError> {
    let mut builder = Client::builder()
        .timeout(settings.timeout)
        .connect_timeout(settings.timeout);

    if let Some(path) = &settings.ca_certificate {
        let bytes = std::fs::read(path).map_err(|e| {
            AppError::TransportError(anyhow::anyhow!(
                "Cant read certificate file <{}>: {}",
                path.display(),
                e
            ))
        })?;
        let certificate = parse_certificate(&bytes)?;
        builder = builder
            .tls_built_in_root_certs(false)
            .add_root_certificate(certificate);
    }

    if settings.accept_invalid_certs {
        tracing::warn!("TLS certificate verification is disabled for the account directory");
        builder = builder.danger_accept_invalid_certs(true);
    }

    Ok(builder.build()?)
}

/// Accept either a PEM or a DER encoded X.509 certificate.
pub fn parse_certificate(bytes: &[u8]) -> Result<Certificate, AppError> {
    if bytes.starts_with(b"-----BEGIN") {
        return Certificate::from_pem(bytes).map_err(|e| {
            AppError::TransportError(anyhow::anyhow!("Cant trust to certificate: {}", e))
        });
    }
    Certificate::from_der(bytes)
        .map_err(|e| AppError::TransportError(anyhow::anyhow!("Cant trust to certificate: {}", e)))
}

/// Extension trait adding trace propagation to outgoing requests.
pub trait TracedRequestExt {
    fn with_trace_context(self) -> Self;
}

impl TracedRequestExt for RequestBuilder {
    fn with_trace_context(self) -> Self {
        let mut headers = HeaderMap::new();
        inject_trace_context(&mut headers);
        if headers.is_empty() {
            self
        } else {
            self.headers(headers)
        }
    }
}
