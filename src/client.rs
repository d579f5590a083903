//! Communicate with MDC screen

use std::time::Duration;

use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    time,
};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, StopBits};
use tracing::{debug, info};

use crate::{proto::{self, Response}, tls, Error, TimeoutPhase};

/// Default TCP port of MDC displays
pub const DEFAULT_PORT: u16 = 1515;

/// Default serial line speed
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default read/write/connect timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A trait representing a valid MDC stream to communicate on
pub trait MDCStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> MDCStream for T {}

/// Transport used to reach a display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionMode {
    /// `host[:port]` over TCP
    #[default]
    Tcp,
    /// Serial device path (`/dev/ttyUSB0`, `COM1`)
    Serial
}

/// Connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Transport
    pub mode: ConnectionMode,
    /// Timeout of every write and read
    pub timeout: Duration,
    /// Timeout of transport connection, `timeout` when unset
    pub connect_timeout: Option<Duration>,
    /// PIN for the TLS upgrade, plain connection when unset
    pub pin: Option<u16>,
    /// Serial line speed
    pub baud_rate: u32
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            mode: ConnectionMode::Tcp,
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: None,
            pin: None,
            baud_rate: DEFAULT_BAUD_RATE
        }
    }
}

impl ConnectionConfig {
    /// Set transport
    pub fn with_mode(mut self, mode: ConnectionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set read/write timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Enable TLS upgrade with `pin`
    pub fn with_pin(mut self, pin: u16) -> Self {
        self.pin = Some(pin);
        self
    }

    /// Set serial line speed
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Effective connect timeout
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout.unwrap_or(self.timeout)
    }
}

/// Split `host[:port]`, defaulting to [DEFAULT_PORT]
pub fn split_host_port(target: &str) -> Result<(&str, u16), Error> {
    match target.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => {
            let port = port.parse().map_err(|_| Error::InvalidTarget(target.to_owned()))?;
            Ok((host, port))
        }
        _ => Ok((target, DEFAULT_PORT))
    }
}

/// Read exactly `count` bytes, keeping partial reads in `buffer`.
///
/// Never reads past `count`, so bytes that follow belong to the next reader.
pub async fn read_exact_timed<S: AsyncRead + Unpin + ?Sized>(
    stream: &mut S,
    buffer: &mut Vec<u8>,
    count: usize,
    timeout: Duration,
    phase: TimeoutPhase
) -> Result<Vec<u8>, Error> {
    let filled = time::timeout(timeout, async {
        while buffer.len() < count {
            let mut chunk = vec![0_u8; count - buffer.len()];
            let byte_red = stream.read(&mut chunk).await?;
            if byte_red == 0 {
                return Err(Error::UnexpectedEndOfStream)
            }
            buffer.extend_from_slice(&chunk[..byte_red]);
        }
        Ok::<(), Error>(())
    }).await;

    match filled {
        Ok(result) => result.map(|()| buffer.drain(..count).collect()),
        Err(_) => Err(Error::Timeout { phase, buffered: buffer.clone() })
    }
}

async fn write_all_timed<S: AsyncWrite + Unpin + ?Sized>(
    stream: &mut S,
    bytes: &[u8],
    timeout: Duration,
    phase: TimeoutPhase
) -> Result<(), Error> {
    time::timeout(timeout, async {
        stream.write_all(bytes).await?;
        stream.flush().await
    })
        .await
        .map_err(|_| Error::Timeout { phase, buffered: Vec::new() })??;
    Ok(())
}

/// A MDC session where we can send and receive packets.
///
/// Created closed; [MDCConnection::send] opens it on demand. One connection
/// serves one target and is never shared between concurrent tasks.
pub struct MDCConnection {
    target: String,
    config: ConnectionConfig,
    stream: Option<Box<dyn MDCStream>>,
    buffer: Vec<u8>,
    tls: bool
}

impl std::fmt::Debug for MDCConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MDCConnection")
            .field("target", &self.target)
            .field("config", &self.config)
            .field("open", &self.is_open())
            .field("tls", &self.tls)
            .finish()
    }
}

impl MDCConnection {
    /// Create a closed connection to `target` (`host[:port]` or serial path)
    pub fn new(target: impl Into<String>, config: ConnectionConfig) -> Self {
        Self {
            target: target.into(),
            config,
            stream: None,
            buffer: Vec::new(),
            tls: false
        }
    }

    /// Initiate a new connection from arbitrary, already open, stream.
    ///
    /// After [MDCConnection::close] the next send reconnects to `target` using `config`.
    pub fn new_from_stream(target: impl Into<String>, stream: impl MDCStream + 'static, config: ConnectionConfig) -> Self {
        let mut connection = Self::new(target, config);
        connection.stream = Some(Box::new(stream));
        connection
    }

    /// Address or path of the display
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Connection settings
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Whether a transport is open
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Whether the transport was upgraded to TLS
    pub fn is_tls(&self) -> bool {
        self.tls
    }

    async fn connect(&self) -> Result<Box<dyn MDCStream>, Error> {
        let connect_timeout = self.config.connect_timeout();
        let timed_out = |_| Error::Timeout { phase: TimeoutPhase::Connect, buffered: Vec::new() };
        match self.config.mode {
            ConnectionMode::Tcp => {
                let (host, port) = split_host_port(&self.target)?;
                let stream = time::timeout(connect_timeout, TcpStream::connect((host, port)))
                    .await
                    .map_err(timed_out)??;
                stream.set_nodelay(true)?;
                Ok(Box::new(stream))
            }
            ConnectionMode::Serial => {
                // Opening a local port is a synchronous open(2) that returns or fails at once,
                // there is no handshake for connect_timeout to bound.
                let stream = tokio_serial::new(&self.target, self.config.baud_rate)
                    .data_bits(DataBits::Eight)
                    .parity(Parity::None)
                    .stop_bits(StopBits::One)
                    .flow_control(FlowControl::None)
                    .open_native_async()?;
                Ok(Box::new(stream))
            }
        }
    }

    /// Open the transport, then upgrade to TLS when a PIN is configured.
    ///
    /// A failed upgrade leaves the connection closed.
    pub async fn open(&mut self) -> Result<(), Error> {
        let stream = self.connect().await?;
        self.stream = Some(stream);
        self.buffer.clear();
        self.tls = false;
        info!(target = %self.target, "Connected");

        if let Some(pin) = self.config.pin
            && let Err(e) = self.start_tls(pin).await {
            self.reset();
            return Err(e);
        }
        Ok(())
    }

    /// Upgrade the open transport to TLS and authenticate with `pin`
    pub async fn start_tls(&mut self, pin: u16) -> Result<(), Error> {
        let pin = tls::format_pin(pin)?;
        if self.stream.is_none() {
            self.stream = Some(self.connect().await?);
            self.buffer.clear();
        }
        let timeout = self.config.timeout;

        let Some(stream) = self.stream.as_mut() else {
            return Err(Error::UnexpectedEndOfStream);
        };
        tls::expect_start(stream, &mut self.buffer, timeout).await?;

        let Some(plain) = self.stream.take() else {
            return Err(Error::UnexpectedEndOfStream);
        };
        let host = match self.config.mode {
            ConnectionMode::Tcp => split_host_port(&self.target)?.0,
            ConnectionMode::Serial => ""
        };
        let mut secured = tls::handshake(plain, host, timeout).await?;
        info!(target = %self.target, "TLS established");

        write_all_timed(&mut secured, &pin, timeout, TimeoutPhase::WritePin).await?;
        tls::read_auth_result(&mut secured, &mut self.buffer, timeout).await?;
        info!(target = %self.target, "TLS authentication passed");

        self.stream = Some(secured);
        self.tls = true;
        Ok(())
    }

    /// Low level method to send a request and wait for its response.
    ///
    /// Opens the connection if needed. Any failure closes the transport so
    /// the next send starts from a fresh connection.
    pub async fn send(&mut self, code: u8, subcode: Option<u8>, display_id: u8, data: &[u8]) -> Result<Response, Error> {
        if self.stream.is_none() {
            self.open().await?;
        }
        let result = self.exchange(code, subcode, display_id, data).await;
        if result.is_err() {
            self.reset();
        }
        result
    }

    async fn exchange(&mut self, code: u8, subcode: Option<u8>, display_id: u8, data: &[u8]) -> Result<Response, Error> {
        let timeout = self.config.timeout;
        let Some(stream) = self.stream.as_mut() else {
            return Err(Error::UnexpectedEndOfStream);
        };

        let payload = proto::pack_payload(code, subcode, display_id, data);
        write_all_timed(stream, &payload, timeout, TimeoutPhase::Write).await?;
        debug!(target = %self.target, "Sent {}", proto::repr_hex(&payload));

        let mut frame = read_exact_timed(stream, &mut self.buffer, proto::HEADER_LEN, timeout, TimeoutPhase::ReadHeader).await?;
        let length = match proto::check_response_header(&frame, display_id) {
            Ok(length) => length,
            Err(source) if frame[0] != proto::HEADER && tls::TLS_START.starts_with(&frame) => {
                // Plain request on a display that insists on TLS
                let rest = tls::TLS_START.len() - frame.len();
                match read_exact_timed(stream, &mut self.buffer, rest, timeout, TimeoutPhase::ReadHeader).await {
                    Ok(tail) => frame.extend(tail),
                    Err(_) => frame.append(&mut self.buffer)
                }
                if frame == tls::TLS_START {
                    return Err(Error::TlsRequired(frame));
                }
                return Err(Error::InvalidResponse { source, raw: frame });
            }
            Err(source) => {
                frame.append(&mut self.buffer);
                return Err(Error::InvalidResponse { source, raw: frame });
            }
        };

        frame.extend(read_exact_timed(stream, &mut self.buffer, length + 1, timeout, TimeoutPhase::ReadPayload).await?);
        debug!(target = %self.target, "Recv {}", proto::repr_hex(&frame));

        proto::parse_response(&frame, display_id, subcode.is_some())
            .map_err(|source| Error::InvalidResponse { source, raw: frame })
    }

    fn reset(&mut self) {
        self.stream = None;
        self.buffer.clear();
        self.tls = false;
    }

    /// Shut the transport down. Does nothing when already closed.
    pub async fn close(&mut self) -> Result<(), Error> {
        let tls = self.tls;
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        self.reset();

        let shutdown = time::timeout(self.config.timeout, stream.shutdown())
            .await
            .map_err(|_| Error::Timeout { phase: TimeoutPhase::Close, buffered: Vec::new() })?;
        match shutdown {
            // Displays drop the socket without answering close_notify
            Err(e) if tls && matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::NotConnected
            ) => {
                debug!(target = %self.target, "Ignoring TLS shutdown error: {e}");
            }
            Err(e) => return Err(e.into()),
            Ok(()) => {}
        }
        info!(target = %self.target, "Disconnected");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    use super::*;
    use crate::proto::{pack_response, Packet};

    fn connection() -> (MDCConnection, DuplexStream) {
        let (client, display) = tokio::io::duplex(256);
        let config = ConnectionConfig::default().with_timeout(Duration::from_secs(1));
        (MDCConnection::new_from_stream("mock", client, config), display)
    }

    async fn read_request(display: &mut DuplexStream) -> Packet {
        let mut buffer = Vec::new();
        loop {
            if let Ok((packet, _)) = Packet::from_bytes(&mut buffer) {
                return packet;
            }
            let mut chunk = [0_u8; 64];
            let n = display.read(&mut chunk).await.unwrap();
            buffer.extend_from_slice(&chunk[..n]);
        }
    }

    #[test]
    pub fn should_split_targets(){
        assert_eq!(split_host_port("10.0.0.1").unwrap(), ("10.0.0.1", 1515));
        assert_eq!(split_host_port("10.0.0.1:1516").unwrap(), ("10.0.0.1", 1516));
        assert_eq!(split_host_port("display.local").unwrap(), ("display.local", 1515));
        assert!(split_host_port("10.0.0.1:port").is_err());
    }

    #[test]
    pub fn should_default_connect_timeout(){
        let config = ConnectionConfig::default();
        assert_eq!(config.connect_timeout(), DEFAULT_TIMEOUT);
        assert_eq!(config.with_connect_timeout(Duration::from_secs(2)).connect_timeout(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn should_send_and_parse_response(){
        let (mut connection, mut display) = connection();
        display.write_all(&pack_response(0x11, None, 0, true, &[0x01])).await.unwrap();

        let response = connection.send(0x11, None, 0, &[]).await.unwrap();
        assert_eq!(read_request(&mut display).await, Packet::new(0x11, 0, vec![]));
        assert_eq!(response, Response { ack: true, code: 0x11, subcode: None, data: vec![0x01] });
        assert!(connection.is_open());
    }

    #[tokio::test]
    async fn should_send_subcode(){
        let (mut connection, mut display) = connection();
        display.write_all(&pack_response(0xC7, Some(0x81), 2, true, &[0x01])).await.unwrap();

        let response = connection.send(0xC7, Some(0x81), 2, &[0x01]).await.unwrap();
        assert_eq!(read_request(&mut display).await, Packet::new(0xC7, 2, vec![0x81, 0x01]));
        assert_eq!(response.subcode, Some(0x81));
        assert_eq!(response.data, vec![0x01]);
    }

    #[tokio::test]
    async fn should_detect_tls_requirement(){
        let (mut connection, mut display) = connection();
        display.write_all(tls::TLS_START).await.unwrap();

        let err = connection.send(0x11, None, 0, &[]).await.unwrap_err();
        assert!(matches!(err, Error::TlsRequired(ref raw) if raw == tls::TLS_START));
        assert!(!connection.is_open());
    }

    #[tokio::test]
    async fn should_reject_other_display(){
        let (mut connection, mut display) = connection();
        display.write_all(&pack_response(0x11, None, 3, true, &[0x01])).await.unwrap();

        let err = connection.send(0x11, None, 1, &[]).await.unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidResponse { source: proto::Error::UnexpectedDisplayId { expected: 1, got: 3 }, .. }
        ));
    }

    #[tokio::test]
    async fn should_reject_bad_checksum(){
        let (mut connection, mut display) = connection();
        let mut response = pack_response(0x12, None, 0, true, &[0x0A]);
        *response.last_mut().unwrap() ^= 0xFF;
        display.write_all(&response).await.unwrap();

        let err = connection.send(0x12, None, 0, &[]).await.unwrap_err();
        assert!(matches!(err, Error::InvalidResponse { source: proto::Error::InvalidChecksum, ref raw } if *raw == response));
    }

    #[tokio::test(start_paused = true)]
    async fn should_time_out_with_partial_bytes(){
        let (mut connection, mut display) = connection();
        let response = pack_response(0x11, None, 0, true, &[0x01]);
        display.write_all(&response[..5]).await.unwrap();

        let err = connection.send(0x11, None, 0, &[]).await.unwrap_err();
        match err {
            Error::Timeout { phase: TimeoutPhase::ReadPayload, buffered } => assert_eq!(buffered, vec![b'A']),
            other => panic!("unexpected error {other:?}")
        }
        assert!(!connection.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn should_time_out_reading_header(){
        let (mut connection, _display) = connection();
        let err = connection.send(0x11, None, 0, &[]).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { phase: TimeoutPhase::ReadHeader, .. }));
    }

    #[tokio::test]
    async fn should_report_closed_stream(){
        let (mut connection, display) = connection();
        drop(display);
        assert!(connection.send(0x11, None, 0, &[]).await.is_err());
    }

    #[tokio::test]
    async fn should_close_once(){
        let (mut connection, _display) = connection();
        connection.close().await.unwrap();
        assert!(!connection.is_open());
        connection.close().await.unwrap();
    }
}
