#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

use std::{fmt, io};

use thiserror::Error;

pub mod proto;
pub mod fields;
pub mod client;
pub mod tls;
pub mod command;
pub mod commands;
pub mod executor;
pub mod args;

pub use client::{ConnectionConfig, ConnectionMode, MDCConnection};
pub use command::{Code, Command};
pub use fields::{Field, ParseMode, Value};
pub use proto::DISPLAY_BROADCAST;
pub use executor::{Script, ScriptOptions, Step, Target};

/// Blocking step that exceeded its timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    /// Opening the transport
    Connect,
    /// Writing and draining a request
    Write,
    /// Reading the 4 bytes response header
    ReadHeader,
    /// Reading the response payload and checksum
    ReadPayload,
    /// Waiting for the TLS start sentinel
    TlsHeader,
    /// TLS client handshake
    TlsHandshake,
    /// Writing the PIN
    WritePin,
    /// Reading the PIN verdict
    TlsAuth,
    /// Shutting the transport down
    Close
}

impl fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TimeoutPhase::Connect => "Connect",
            TimeoutPhase::Write => "Write",
            TimeoutPhase::ReadHeader => "Response header read",
            TimeoutPhase::ReadPayload => "Response data read",
            TimeoutPhase::TlsHeader => "TLS header read",
            TimeoutPhase::TlsHandshake => "TLS handshake",
            TimeoutPhase::WritePin => "Write pin",
            TimeoutPhase::TlsAuth => "TLS auth read",
            TimeoutPhase::Close => "Close"
        })
    }
}

fn tls_auth_reason(code: u16) -> String {
    match code {
        1 => "Wrong pin".to_owned(),
        2 => "Blocked".to_owned(),
        code => format!("Unknown code: {code}")
    }
}

/// General error that can occur during communication with MDC server
#[derive(Debug, Error)]
pub enum Error {
    /// IO Error
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),
    /// Serial port could not be opened
    #[error("Serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),
    /// TLS layer failure
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),
    /// Failed to decode a response frame
    #[error("Invalid response ({source}): {}", proto::repr_hex(raw))]
    InvalidResponse {
        /// What was wrong with the frame
        source: proto::Error,
        /// Bytes received so far
        raw: Vec<u8>
    },
    /// Device answered the TLS upgrade with something unexpected
    #[error("{reason}: {}", proto::repr_hex(raw))]
    UnexpectedTlsResponse {
        /// What was expected
        reason: &'static str,
        /// Bytes received
        raw: Vec<u8>
    },
    /// Response payload does not match the command fields
    #[error("Invalid response data: {0}")]
    Decode(#[from] fields::DecodeError),
    /// Server responded with NAK
    #[error("Negative Acknowledgement [error_code {0}]")]
    Nak(u8),
    /// A blocking step exceeded its timeout
    #[error("{phase} timeout")]
    Timeout {
        /// Step that timed out
        phase: TimeoutPhase,
        /// Bytes buffered when the timeout hit
        buffered: Vec<u8>
    },
    /// Device requires a TLS connection for this operation
    #[error("TLS required by device, reconnect with a PIN")]
    TlsRequired(Vec<u8>),
    /// PIN was refused
    #[error("TLS authentication failed: {}", tls_auth_reason(*code))]
    TlsAuthFailed {
        /// Device failure code (1 wrong pin, 2 blocked)
        code: u16
    },
    /// Caller side mistake, detected before any I/O
    #[error("Invalid argument: {0}")]
    InvalidArgument(#[from] fields::ArgumentError),
    /// Stream ended or was closed before a packet ended
    #[error("Stream ended before sending full packet")]
    UnexpectedEndOfStream,
    /// Target could not be resolved
    #[error("Invalid target: {0}")]
    InvalidTarget(String)
}

impl Error {
    /// Device answered with NAK
    pub fn is_nak(&self) -> bool {
        matches!(self, Error::Nak(_))
    }

    /// Some step timed out
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Short error class name, used when reporting per target results
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Io(_) => "IOError",
            Error::Serial(_) => "SerialError",
            Error::Tls(_) => "TLSError",
            Error::InvalidResponse { .. } | Error::UnexpectedTlsResponse { .. } => "ResponseError",
            Error::Decode(_) => "DecodeError",
            Error::Nak(_) => "NAKError",
            Error::Timeout { .. } => "TimeoutError",
            Error::TlsRequired(_) => "TLSRequired",
            Error::TlsAuthFailed { .. } => "TLSAuthFailed",
            Error::InvalidArgument(_) => "InvalidArgument",
            Error::UnexpectedEndOfStream => "EndOfStream",
            Error::InvalidTarget(_) => "InvalidTarget"
        }
    }
}
