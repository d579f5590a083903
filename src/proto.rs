//! Structures and methods to create and parse packets

use thiserror::Error;

/// First byte of every packet, both directions
pub const HEADER: u8 = 0xAA;

/// Command byte carried by every response packet
pub const RESPONSE_CMD: u8 = 0xFF;

/// Acknowledge marker in a response payload
pub const ACK: u8 = b'A';

/// Not Acknowledge marker in a response payload
pub const NAK: u8 = b'N';

/// Special display id to address any display on the link.
///
/// Not interpreted by the client: echo validation stays strict for it too.
pub const DISPLAY_BROADCAST: u8 = 0xFE;

/// Size of the fixed part of a packet before the payload
pub const HEADER_LEN: usize = 4;

/// A packet sent over MDC connection
/// Its carries commands and responses from screen
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// Command id to perform (see [crate::commands] for descriptors)
    pub command: u8,
    /// Display id to send command to (or [DISPLAY_BROADCAST])
    pub display_id: u8,
    /// Data and arguments associated to this command, subcommand included
    pub data: Vec<u8>
}

impl Packet {
    /// Create a new packet with provided data
    pub fn new(command: u8, display_id: u8, data: Vec<u8>) -> Self {
        Self { command, display_id, data }
    }

    /// Create a request packet, prepending `subcode` to `data` when present
    pub fn request(command: u8, subcode: Option<u8>, display_id: u8, data: &[u8]) -> Self {
        let mut payload = Vec::with_capacity(data.len() + 1);
        payload.extend(subcode);
        payload.extend_from_slice(data);
        Self::new(command, display_id, payload)
    }

    /// Compute packet's checksum
    pub fn checksum(&self) -> u8 {
        checksum(self.command, self.display_id, &self.data)
    }

    /// Convert this packet into bytes ready to be sent
    pub fn into_bytes(mut self) -> Vec<u8> {
        let checksum = self.checksum();
        let mut bytes = vec![
            HEADER,
            self.command,
            self.display_id,
            self.data.len() as u8
        ];
        bytes.append(&mut self.data);
        bytes.push(checksum);
        bytes
    }

    /// Parse packet from buffer, removing bytes associated to parsed packet from buffer.
    ///
    /// Returns a packet and the number of bytes removed from buffer.
    /// In cas of error, buffer is not modified.
    pub fn from_bytes(input: &mut Vec<u8>) -> Result<(Self, usize), Error> {
        let Some(header) = input.first() else {
            return Err(Error::IncompleteInput)
        };

        if *header != HEADER {
            return Err(Error::InvalidHeader(*header));
        };

        let Some(command) = input.get(1).cloned() else {
            return Err(Error::IncompleteInput);
        };

        let Some(display_id) = input.get(2).cloned() else {
            return Err(Error::IncompleteInput);
        };

        let Some(data_length) = input.get(3).map(|it| *it as usize) else {
            return Err(Error::IncompleteInput);
        };

        let Some(given_checksum) = input.get(HEADER_LEN + data_length).cloned() else {
            return Err(Error::IncompleteInput);
        };

        let data = &input[HEADER_LEN..HEADER_LEN + data_length];
        if checksum(command, display_id, data) != given_checksum {
            return Err(Error::InvalidChecksum)
        }

        let bytes_red = HEADER_LEN + data_length + 1;
        let data = input.drain(..bytes_red).skip(HEADER_LEN).take(data_length).collect::<Vec<_>>();

        Ok((Self {
            command,
            display_id,
            data
        }, bytes_red))
    }
}

/// Sum of command, display id, length and payload bytes, modulo 256
pub fn checksum(command: u8, display_id: u8, data: &[u8]) -> u8 {
    data.iter().fold(
        command.wrapping_add(display_id).wrapping_add(data.len() as u8),
        |acc, it| acc.wrapping_add(*it)
    )
}

/// Render bytes as space separated hex, for logs and error messages
pub fn repr_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|it| format!("{it:02x}")).collect::<Vec<_>>().join(" ")
}

/// Frame a request: `HEADER, code, display_id, length, [subcode] + data, checksum`
pub fn pack_payload(code: u8, subcode: Option<u8>, display_id: u8, data: &[u8]) -> Vec<u8> {
    Packet::request(code, subcode, display_id, data).into_bytes()
}

/// Frame a reply the way a display does.
///
/// On NAK `data` is the single error code byte and the subcode is never echoed.
pub fn pack_response(code: u8, subcode: Option<u8>, display_id: u8, ack: bool, data: &[u8]) -> Vec<u8> {
    debug_assert!(ack || data.len() == 1, "NAK carries exactly one error byte");
    let mut payload = Vec::with_capacity(data.len() + 3);
    if ack {
        payload.extend([ACK, code]);
        payload.extend(subcode);
    } else {
        payload.extend([NAK, code]);
    }
    payload.extend_from_slice(data);
    Packet::new(RESPONSE_CMD, display_id, payload).into_bytes()
}

/// A decoded response envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// `true` on ACK, `false` on NAK
    pub ack: bool,
    /// Echoed command code
    pub code: u8,
    /// Echoed subcode, only split off on ACK to a request that carried one
    pub subcode: Option<u8>,
    /// Remaining payload (the error code on NAK)
    pub data: Vec<u8>
}

/// Check the 4 bytes header of a response, returning the payload length
pub fn check_response_header(header: &[u8], display_id: u8) -> Result<usize, Error> {
    let [head, command, id, length] = header else {
        return Err(Error::IncompleteInput);
    };
    if *head != HEADER {
        return Err(Error::InvalidHeader(*head));
    }
    if *command != RESPONSE_CMD {
        return Err(Error::UnexpectedCommand(*command));
    }
    if *id != display_id {
        return Err(Error::UnexpectedDisplayId { expected: display_id, got: *id });
    }
    Ok(*length as usize)
}

/// Parse a complete response frame sent by `display_id`.
///
/// `with_subcode` tells whether the request carried a subcode.
pub fn parse_response(bytes: &[u8], display_id: u8, with_subcode: bool) -> Result<Response, Error> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::IncompleteInput);
    }
    let length = check_response_header(&bytes[..HEADER_LEN], display_id)?;
    if bytes.len() < HEADER_LEN + length + 1 {
        return Err(Error::IncompleteInput);
    }
    if bytes.len() > HEADER_LEN + length + 1 {
        return Err(Error::TrailingBytes(bytes.len() - HEADER_LEN - length - 1));
    }

    let payload = &bytes[HEADER_LEN..HEADER_LEN + length];
    if checksum(bytes[1], bytes[2], payload) != bytes[HEADER_LEN + length] {
        return Err(Error::InvalidChecksum);
    }

    let [ack, code, rest @ ..] = payload else {
        return Err(Error::MissingAck);
    };
    let ack = match *ack {
        ACK => true,
        NAK => false,
        other => return Err(Error::UnexpectedAck(other)),
    };

    if ack && with_subcode {
        let [subcode, data @ ..] = rest else {
            return Err(Error::MissingSubcode);
        };
        return Ok(Response { ack, code: *code, subcode: Some(*subcode), data: data.to_vec() });
    }

    Ok(Response { ack, code: *code, subcode: None, data: rest.to_vec() })
}

/// Error that can occur during packet parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Packet do not start with 0xAA header
    #[error("Invalid header 0x{0:02X}: every packet should start with 0xAA")]
    InvalidHeader(u8),
    /// Input buffer was incomplete and do not contains a full packet (it can means that you should request more bytes)
    #[error("Incomplete input")]
    IncompleteInput,
    /// Checksum received is not valid, that can means a corrupted packet
    #[error("Invalid Checksum")]
    InvalidChecksum,
    /// Response frame is not a 0xFF response
    #[error("Unexpected response command 0x{0:02X}")]
    UnexpectedCommand(u8),
    /// Response comes from another display
    #[error("Unexpected display id: expected {expected}, got {got}")]
    UnexpectedDisplayId {
        /// Id the request was sent to
        expected: u8,
        /// Id echoed in the response
        got: u8
    },
    /// Payload too short to carry ACK/NAK and echoed command
    #[error("Missing ACK/NAK")]
    MissingAck,
    /// ACK/NAK byte is neither 'A' nor 'N'
    #[error("Unexpected ACK/NAK 0x{0:02X}")]
    UnexpectedAck(u8),
    /// ACK to a subcommand without the echoed subcode
    #[error("Missing echoed subcommand")]
    MissingSubcode,
    /// Bytes found after the checksum
    #[error("{0} bytes after checksum")]
    TrailingBytes(usize),
    /// ACK for another command than the one requested
    #[error("Unexpected echoed command: expected 0x{expected:02X}, got 0x{got:02X}")]
    UnexpectedEcho {
        /// Requested code
        expected: u8,
        /// Echoed code
        got: u8
    }
}
