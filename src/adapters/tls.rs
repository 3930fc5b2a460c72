//! OpenSSL client connector for raw TLS probes.
//!
//! Verification is off unless asked for: probes usually target test servers
//! with self-signed certificates. A SHA-256 fingerprint can pin the server
//! certificate instead.

use crate::domain::model::Target;
use crate::utils::error::{ProbeError, Result};
use openssl::hash::MessageDigest;
use openssl::ssl::{SslConnector, SslMethod, SslStream, SslVerifyMode};
use openssl::x509::X509Ref;
use serde::{Deserialize, Serialize};
use std::net::TcpStream;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsOptions {
    /// Verify the certificate chain and hostname.
    #[serde(default)]
    pub verify: bool,
    pub server_fingerprint: Option<String>,
}

/// 去掉 ':' 並轉小寫
pub fn normalize_fingerprint(fingerprint: &str) -> String {
    fingerprint
        .chars()
        .filter(|c| *c != ':')
        .flat_map(|c| c.to_lowercase())
        .collect()
}

pub fn fingerprint_of(cert: &X509Ref) -> Result<String> {
    let digest = cert.digest(MessageDigest::sha256())?;
    Ok(hex::encode(digest))
}

pub struct TlsConnector {
    inner: SslConnector,
    options: TlsOptions,
}

impl TlsConnector {
    pub fn new(options: TlsOptions) -> Result<Self> {
        let mut builder = SslConnector::builder(SslMethod::tls_client())?;
        if !options.verify {
            builder.set_verify(SslVerifyMode::NONE);
        }

        Ok(Self {
            inner: builder.build(),
            options,
        })
    }

    pub fn connect(&self, target: &Target, stream: TcpStream) -> Result<SslStream<TcpStream>> {
        let mut config = self.inner.configure()?;
        config.set_verify_hostname(self.options.verify);

        let tls = config
            .connect(&target.host, stream)
            .map_err(|e| ProbeError::TlsError {
                target: target.authority(),
                message: e.to_string(),
            })?;

        tracing::debug!(
            "🔒 TLS established with {} ({})",
            target,
            tls.ssl().version_str()
        );

        if let Some(expected) = &self.options.server_fingerprint {
            self.check_fingerprint(target, &tls, expected)?;
        }

        Ok(tls)
    }

    fn check_fingerprint(
        &self,
        target: &Target,
        tls: &SslStream<TcpStream>,
        expected: &str,
    ) -> Result<()> {
        let cert = tls
            .ssl()
            .peer_certificate()
            .ok_or_else(|| ProbeError::TlsError {
                target: target.authority(),
                message: "server sent no certificate".to_string(),
            })?;

        let actual = fingerprint_of(&cert)?;
        let expected = normalize_fingerprint(expected);
        if actual != expected {
            return Err(ProbeError::FingerprintMismatch { expected, actual });
        }

        tracing::debug!("Server fingerprint matches {}", actual);
        Ok(())
    }
}
