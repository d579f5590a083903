//! In-band upgrade of a plain MDC connection to a PIN authenticated TLS channel
//!
//! Once the transport is open the display sends `MDCSTART<<TLS>>`, the client
//! runs a TLS handshake over the same stream, writes its 4 digit PIN and reads
//! `MDCAUTH<<PASS>>` or `MDCAUTH<<FAIL:XXXX>>`.
//!
//! Displays present self-signed certificates, so certificate and hostname
//! verification are disabled.

use std::{sync::Arc, time::Duration};

use rustls::{
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    crypto::{self, CryptoProvider},
    pki_types::{CertificateDer, ServerName, UnixTime},
    ClientConfig, DigitallySignedStruct, SignatureScheme,
};
use tokio::io::AsyncRead;
use tokio_rustls::TlsConnector;

use crate::{
    client::{read_exact_timed, MDCStream},
    fields::ArgumentError,
    Error, TimeoutPhase,
};

/// Sent by the display when it expects a TLS handshake
pub const TLS_START: &[u8; 15] = b"MDCSTART<<TLS>>";

/// PIN accepted
pub const AUTH_PASS: &[u8; 15] = b"MDCAUTH<<PASS>>";

/// PIN refused, followed by a 4 hex digits code and `>>`
pub const AUTH_FAIL_PREFIX: &[u8; 14] = b"MDCAUTH<<FAIL:";

/// Name used for the handshake when the target is not a valid DNS name or IP
const FALLBACK_SERVER_NAME: &str = "samsung-mdc";

/// Zero padded ASCII PIN
pub fn format_pin(pin: u16) -> Result<[u8; 4], Error> {
    if pin > 9999 {
        return Err(ArgumentError::OutOfRange { field: "PIN", value: pin as u64, min: 0, max: 9999 }.into());
    }
    let mut digits = [b'0'; 4];
    for (i, digit) in format!("{pin:04}").bytes().enumerate() {
        digits[i] = digit;
    }
    Ok(digits)
}

#[derive(Debug)]
struct NoVerification(Arc<CryptoProvider>);

impl ServerCertVerifier for NoVerification {
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
        crypto::verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        crypto::verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

/// Client configuration accepting any server certificate
pub fn client_config() -> Result<Arc<ClientConfig>, Error> {
    let provider = Arc::new(crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(NoVerification(provider)))
        .with_no_client_auth();
    Ok(Arc::new(config))
}

fn server_name(host: &str) -> Result<ServerName<'static>, Error> {
    ServerName::try_from(host.to_owned())
        .or_else(|_| ServerName::try_from(FALLBACK_SERVER_NAME))
        .map_err(|_| Error::InvalidTarget(host.to_owned()))
}

/// Run the TLS client handshake over an already open stream
pub async fn handshake(stream: Box<dyn MDCStream>, host: &str, timeout: Duration) -> Result<Box<dyn MDCStream>, Error> {
    let connector = TlsConnector::from(client_config()?);
    let secured = tokio::time::timeout(timeout, connector.connect(server_name(host)?, stream))
        .await
        .map_err(|_| Error::Timeout { phase: TimeoutPhase::TlsHandshake, buffered: Vec::new() })??;
    Ok(Box::new(secured))
}

/// Read the start sentinel
pub async fn expect_start<S: AsyncRead + Unpin + ?Sized>(stream: &mut S, buffer: &mut Vec<u8>, timeout: Duration) -> Result<(), Error> {
    let header = read_exact_timed(stream, buffer, TLS_START.len(), timeout, TimeoutPhase::TlsHeader).await?;
    if header != TLS_START {
        return Err(Error::UnexpectedTlsResponse { reason: "Unexpected TLS header", raw: header });
    }
    Ok(())
}

/// Read the PIN verdict written by the display after the PIN
pub async fn read_auth_result<S: AsyncRead + Unpin + ?Sized>(stream: &mut S, buffer: &mut Vec<u8>, timeout: Duration) -> Result<(), Error> {
    let mut response = read_exact_timed(stream, buffer, AUTH_PASS.len(), timeout, TimeoutPhase::TlsAuth).await?;
    if response == AUTH_PASS {
        return Ok(());
    }
    if !response.starts_with(AUTH_FAIL_PREFIX) {
        return Err(Error::UnexpectedTlsResponse { reason: "Unexpected TLS auth response", raw: response });
    }

    response.extend(read_exact_timed(stream, buffer, 5, timeout, TimeoutPhase::TlsAuth).await?);
    if !response.ends_with(b">>") {
        return Err(Error::UnexpectedTlsResponse { reason: "Unexpected TLS auth fail response", raw: response });
    }
    let code = std::str::from_utf8(&response[AUTH_FAIL_PREFIX.len()..AUTH_FAIL_PREFIX.len() + 4])
        .ok()
        .and_then(|digits| u16::from_str_radix(digits, 16).ok());
    match code {
        Some(code) => Err(Error::TlsAuthFailed { code }),
        None => Err(Error::UnexpectedTlsResponse { reason: "Unexpected TLS auth fail code", raw: response })
    }
}

#[cfg(test)]
mod test {
    use tokio::io::AsyncWriteExt;

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(1);

    #[test]
    pub fn should_pad_pin(){
        assert_eq!(&format_pin(0).unwrap(), b"0000");
        assert_eq!(&format_pin(42).unwrap(), b"0042");
        assert_eq!(&format_pin(9999).unwrap(), b"9999");
        assert!(matches!(format_pin(10000), Err(Error::InvalidArgument(_))));
    }

    #[test]
    pub fn should_build_permissive_config(){
        assert!(client_config().is_ok());
        assert!(matches!(server_name("10.0.0.5"), Ok(ServerName::IpAddress(_))));
        assert!(matches!(server_name("display-1.local"), Ok(ServerName::DnsName(_))));
        assert!(matches!(server_name(""), Ok(ServerName::DnsName(_))));
    }

    async fn auth_with(reply: &[u8]) -> Result<(), Error> {
        let (mut client, mut display) = tokio::io::duplex(64);
        display.write_all(reply).await.unwrap();
        read_auth_result(&mut client, &mut Vec::new(), TIMEOUT).await
    }

    #[tokio::test]
    async fn should_accept_pass(){
        assert!(auth_with(b"MDCAUTH<<PASS>>").await.is_ok());
    }

    #[tokio::test]
    async fn should_report_wrong_pin(){
        let err = auth_with(b"MDCAUTH<<FAIL:0001>>").await.unwrap_err();
        assert!(matches!(err, Error::TlsAuthFailed { code: 1 }));
        assert_eq!(err.to_string(), "TLS authentication failed: Wrong pin");
    }

    #[tokio::test]
    async fn should_report_blocked_and_unknown_codes(){
        assert!(matches!(auth_with(b"MDCAUTH<<FAIL:0002>>").await, Err(Error::TlsAuthFailed { code: 2 })));
        assert!(matches!(auth_with(b"MDCAUTH<<FAIL:00FF>>").await, Err(Error::TlsAuthFailed { code: 0xFF })));
    }

    #[tokio::test]
    async fn should_reject_garbage(){
        assert!(matches!(
            auth_with(b"HELLO<<WORLD>>!").await,
            Err(Error::UnexpectedTlsResponse { .. })
        ));
        assert!(matches!(
            auth_with(b"MDCAUTH<<FAIL:00ZZ>>").await,
            Err(Error::UnexpectedTlsResponse { reason: "Unexpected TLS auth fail code", .. })
        ));
        assert!(matches!(
            auth_with(b"MDCAUTH<<FAIL:0001!!").await,
            Err(Error::UnexpectedTlsResponse { reason: "Unexpected TLS auth fail response", .. })
        ));
    }

    #[tokio::test]
    async fn should_check_start_sentinel(){
        let (mut client, mut display) = tokio::io::duplex(64);
        display.write_all(b"MDCSTART<<TLS>>").await.unwrap();
        assert!(expect_start(&mut client, &mut Vec::new(), TIMEOUT).await.is_ok());

        display.write_all(b"MDCSTART<<SSL>>").await.unwrap();
        assert!(matches!(
            expect_start(&mut client, &mut Vec::new(), TIMEOUT).await,
            Err(Error::UnexpectedTlsResponse { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn should_time_out_on_silent_display(){
        let (mut client, _display) = tokio::io::duplex(64);
        let err = expect_start(&mut client, &mut Vec::new(), TIMEOUT).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { phase: TimeoutPhase::TlsHeader, .. }));
    }
}
