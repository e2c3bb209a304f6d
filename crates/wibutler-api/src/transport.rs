// Shared transport configuration for the REST pool and the push stream.
//
// The session owns exactly one `reqwest::Client`; the stream reuses the
// same TLS policy through a rustls connector built here.

use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use tokio_tungstenite::Connector;

use crate::error::Error;

const USER_AGENT: &str = concat!("wibutler-rs/", env!("CARGO_PKG_VERSION"));

/// TLS verification mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsMode {
    /// Use the bundled webpki roots / system store.
    System,
    /// Accept any certificate. Hubs ship self-signed certificates, so this
    /// is the default when TLS is enabled without verification.
    #[default]
    DangerAcceptInvalid,
}

impl TlsMode {
    /// Map the host-facing "verify TLS" toggle to a mode.
    pub fn from_verify(verify: bool) -> Self {
        if verify {
            Self::System
        } else {
            Self::DangerAcceptInvalid
        }
    }
}

/// Shared transport configuration for building HTTP clients.
///
/// Timeouts are optional: `None` defers to the transport defaults, which
/// means no overall request deadline.
#[derive(Debug, Clone, Default)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
}

impl TransportConfig {
    /// Build the `reqwest::Client` connection pool from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(connect_timeout) = self.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        if self.tls == TlsMode::DangerAcceptInvalid {
            builder = builder.danger_accept_invalid_certs(true);
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }

    /// Connector for `wss://` streams.
    ///
    /// Returns `None` for [`TlsMode::System`], letting tokio-tungstenite use
    /// its webpki roots.
    pub fn websocket_connector(&self) -> Result<Option<Connector>, Error> {
        match self.tls {
            TlsMode::System => Ok(None),
            TlsMode::DangerAcceptInvalid => {
                let provider = Arc::new(rustls::crypto::ring::default_provider());
                let config = rustls::ClientConfig::builder_with_provider(Arc::clone(&provider))
                    .with_safe_default_protocol_versions()
                    .map_err(|e| Error::Tls(format!("unsupported TLS versions: {e}")))?
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(AcceptAnyCert(provider)))
                    .with_no_client_auth();
                Ok(Some(Connector::Rustls(Arc::new(config))))
            }
        }
    }
}

/// Certificate verifier that trusts any server certificate but still checks
/// handshake signatures with the provider's algorithms.
#[derive(Debug)]
struct AcceptAnyCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_toggle_maps_to_mode() {
        assert_eq!(TlsMode::from_verify(true), TlsMode::System);
        assert_eq!(TlsMode::from_verify(false), TlsMode::DangerAcceptInvalid);
    }

    #[test]
    fn default_config_has_no_timeouts() {
        let config = TransportConfig::default();
        assert!(config.timeout.is_none());
        assert!(config.connect_timeout.is_none());
        assert!(config.build_client().is_ok());
    }

    #[test]
    fn system_mode_uses_default_connector() {
        let config = TransportConfig {
            tls: TlsMode::System,
            ..TransportConfig::default()
        };
        assert!(matches!(config.websocket_connector(), Ok(None)));
    }

    #[test]
    fn danger_mode_builds_custom_connector() {
        let config = TransportConfig::default();
        assert!(matches!(
            config.websocket_connector(),
            Ok(Some(Connector::Rustls(_)))
        ));
    }
}
