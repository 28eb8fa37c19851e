//! Authentication providers.
//!
//! A provider supplies credentials for the CONNECT handshake and,
//! optionally, TLS client-certificate material. The transport consults
//! [`Authentication::has_data_for_tls`] during TLS context construction;
//! when it returns true the provider's certificate chain and private key
//! take precedence over trust-store-only mode.

use crate::error::ClientError;
use crate::tls::{load_certs, load_private_key};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::path::PathBuf;

/// Credential source consumed by the transport pipeline.
pub trait Authentication: Send + Sync {
    /// Method name sent in the CONNECT command.
    fn auth_method(&self) -> &str;

    /// Opaque credential payload sent in the CONNECT command, if any.
    fn auth_data(&self) -> Option<String> {
        None
    }

    /// Whether this provider can supply TLS client-certificate material.
    fn has_data_for_tls(&self) -> bool {
        false
    }

    /// Client certificate chain for mutual TLS.
    fn tls_certificates(&self) -> Result<Vec<CertificateDer<'static>>, ClientError> {
        Err(ClientError::TlsConfig(
            "authentication provider has no TLS certificate data".to_string(),
        ))
    }

    /// Client private key for mutual TLS.
    fn tls_private_key(&self) -> Result<PrivateKeyDer<'static>, ClientError> {
        Err(ClientError::TlsConfig(
            "authentication provider has no TLS key data".to_string(),
        ))
    }
}

/// Certificate-based authentication: PEM client certificate + private key.
#[derive(Debug, Clone)]
pub struct AuthenticationTls {
    cert_path: PathBuf,
    key_path: PathBuf,
}

impl AuthenticationTls {
    pub fn new(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        }
    }
}

impl Authentication for AuthenticationTls {
    fn auth_method(&self) -> &str {
        "tls"
    }

    fn has_data_for_tls(&self) -> bool {
        true
    }

    fn tls_certificates(&self) -> Result<Vec<CertificateDer<'static>>, ClientError> {
        load_certs(&self.cert_path)
    }

    fn tls_private_key(&self) -> Result<PrivateKeyDer<'static>, ClientError> {
        load_private_key(&self.key_path)
    }
}

/// Bearer-token authentication.
#[derive(Debug, Clone)]
pub struct AuthenticationToken {
    token: String,
}

impl AuthenticationToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl Authentication for AuthenticationToken {
    fn auth_method(&self) -> &str {
        "token"
    }

    fn auth_data(&self) -> Option<String> {
        Some(self.token.clone())
    }
}
