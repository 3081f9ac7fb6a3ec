// src/transport/tls.rs

//! TLS upgrade for established connections.
//!
//! The server side carries a self-signed identity generated at startup
//! (there is no CA in this deployment model). The client side therefore
//! skips certificate chain validation but still verifies handshake
//! signatures against the presented certificate.
//!
//! Any failure while building the TLS configuration is reported as
//! [`Error::SslInit`], which callers recognise by its message prefix and
//! treat as "TLS not available here" rather than as a send failure.

use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, ServerConfig, SignatureScheme};
use tokio::time::timeout;
use tokio_rustls::{TlsAcceptor, TlsConnector};

use crate::transport::BoxedStream;
use crate::{log_debug, Error, Result};

/// Timeout for the TLS handshake.
pub const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Name the self-signed certificate is issued for and clients present as SNI.
const TLS_SERVER_NAME: &str = "localhost";

fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Server-side TLS identity.
#[derive(Clone)]
pub struct TlsIdentity {
    acceptor: TlsAcceptor,
}

impl TlsIdentity {
    /// Generate a fresh self-signed identity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SslInit`] if key generation or configuration fails.
    pub fn self_signed() -> Result<Self> {
        // ---
        let certified = rcgen::generate_simple_self_signed(vec![TLS_SERVER_NAME.to_string()])
            .map_err(|e| Error::SslInit(format!("certificate generation failed: {e}")))?;

        let cert_chain: Vec<CertificateDer<'static>> = vec![certified.cert.der().clone()];
        let private_key =
            PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der()));

        let config = ServerConfig::builder_with_provider(crypto_provider())
            .with_safe_default_protocol_versions()
            .map_err(|e| Error::SslInit(format!("protocol versions: {e}")))?
            .with_no_client_auth()
            .with_single_cert(cert_chain, private_key)
            .map_err(|e| Error::SslInit(format!("server config: {e}")))?;

        Ok(Self {
            acceptor: TlsAcceptor::from(Arc::new(config)),
        })
    }

    /// Run the server half of the handshake.
    pub async fn accept(&self, stream: BoxedStream) -> Result<BoxedStream> {
        // ---
        let tls = timeout(TLS_HANDSHAKE_TIMEOUT, self.acceptor.accept(stream))
            .await
            .map_err(|_| Error::Timeout)?
            .map_err(|e| Error::Tls(format!("server handshake failed: {e}")))?;

        log_debug!("accepted TLS session");
        Ok(Box::new(tls))
    }
}

/// Client-side TLS configuration.
#[derive(Clone)]
pub struct TlsClient {
    connector: TlsConnector,
}

impl TlsClient {
    /// Initialise the client TLS subsystem.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SslInit`] if the configuration cannot be built.
    pub fn new() -> Result<Self> {
        // ---
        let provider = crypto_provider();
        let verifier = Arc::new(SelfSignedServerVerifier {
            provider: provider.clone(),
        });

        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| Error::SslInit(format!("protocol versions: {e}")))?
            .dangerous()
            .with_custom_certificate_verifier(verifier)
            .with_no_client_auth();

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
        })
    }

    /// Run the client half of the handshake.
    ///
    /// Returns the secured stream and a short description of the session
    /// (protocol version and cipher suite).
    pub async fn connect(&self, stream: BoxedStream) -> Result<(BoxedStream, String)> {
        // ---
        let server_name = ServerName::try_from(TLS_SERVER_NAME)
            .map_err(|e| Error::SslInit(format!("server name: {e}")))?;

        let tls = timeout(
            TLS_HANDSHAKE_TIMEOUT,
            self.connector.connect(server_name, stream),
        )
        .await
        .map_err(|_| Error::Timeout)?
        .map_err(|e| Error::Tls(format!("client handshake failed: {e}")))?;

        let (_, session) = tls.get_ref();
        let version = session
            .protocol_version()
            .map_or_else(|| "unknown".to_string(), |v| format!("{v:?}"));
        let suite = session
            .negotiated_cipher_suite()
            .map_or_else(|| "unknown".to_string(), |s| format!("{:?}", s.suite()));

        Ok((Box::new(tls), format!("{version} {suite}")))
    }
}

/// Accepts the server's self-signed certificate without chain validation.
///
/// Handshake signatures are still checked with the provider's algorithms,
/// so the peer must hold the key for the certificate it presents.
#[derive(Debug)]
struct SelfSignedServerVerifier {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for SelfSignedServerVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
