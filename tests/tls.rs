use std::{sync::Arc, time::Duration};

use rustls::{
    crypto::ring::default_provider,
    pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer},
    ServerConfig,
};
use samsung_mdc::{
    commands,
    proto::{pack_response, Packet},
    tls::TLS_START,
    ConnectionConfig, Error, MDCConnection, Value,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    sync::oneshot,
};
use tokio_rustls::TlsAcceptor;

fn acceptor() -> TlsAcceptor {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_owned()]).unwrap();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der()));
    let config = ServerConfig::builder_with_provider(Arc::new(default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![certified.cert.der().clone()], key)
        .unwrap();
    TlsAcceptor::from(Arc::new(config))
}

/// Secured display: sends the start sentinel, accepts the handshake, reports the
/// PIN it received and answers `verdict`. After a pass it acks one request.
async fn secured_display(verdict: &'static [u8]) -> (String, oneshot::Receiver<[u8; 4]>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let (pin_tx, pin_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        socket.write_all(TLS_START).await.unwrap();
        let mut secured = acceptor().accept(socket).await.unwrap();

        let mut pin = [0_u8; 4];
        secured.read_exact(&mut pin).await.unwrap();
        let _ = pin_tx.send(pin);
        secured.write_all(verdict).await.unwrap();
        secured.flush().await.unwrap();

        let mut buffer = Vec::new();
        let mut chunk = [0_u8; 64];
        loop {
            if let Ok((packet, _)) = Packet::from_bytes(&mut buffer) {
                let reply = pack_response(packet.command, None, packet.display_id, true, &[1]);
                secured.write_all(&reply).await.unwrap();
                secured.flush().await.unwrap();
                continue;
            }
            match secured.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => buffer.extend_from_slice(&chunk[..n])
            }
        }
    });

    (address, pin_rx)
}

fn connection(address: String, pin: u16) -> MDCConnection {
    MDCConnection::new(address, ConnectionConfig::default().with_timeout(Duration::from_secs(2)).with_pin(pin))
}

#[tokio::test]
async fn should_close_connection_on_refused_pin(){
    let (address, pin) = secured_display(b"MDCAUTH<<FAIL:0001>>").await;
    let mut connection = connection(address, 0);

    let err = connection.open().await.unwrap_err();
    assert!(matches!(err, Error::TlsAuthFailed { code: 1 }));
    assert_eq!(&pin.await.unwrap(), b"0000");
    assert!(!connection.is_open());
    assert!(!connection.is_tls());
}

#[tokio::test]
async fn should_send_commands_over_tls_after_pin_accepted(){
    let (address, pin) = secured_display(b"MDCAUTH<<PASS>>").await;
    let mut connection = connection(address, 42);

    connection.open().await.unwrap();
    assert_eq!(&pin.await.unwrap(), b"0042");
    assert!(connection.is_open());
    assert!(connection.is_tls());

    let values = commands::POWER.invoke(&mut connection, 0, &[]).await.unwrap();
    let on: Value = commands::POWER_STATE.member_named("ON").unwrap().into();
    assert_eq!(values, vec![on]);
    connection.close().await.unwrap();
}
