//! Command descriptors and their invocation
//!
//! A [Command] is plain data: wire code, optional subcode, GET/SET capability
//! and the ordered fields of its payload. [Command::invoke] turns arguments
//! into a request through the fields, sends it and parses the response with
//! the same fields, in the same order.

use tracing::debug;

use crate::{
    client::MDCConnection,
    fields::{ArgumentError, DecodeError, Field, ParseMode, Value},
    proto, Error,
};

/// How a command finds its wire code
#[derive(Debug, Clone, Copy)]
pub enum Code {
    /// Same code for every call
    Fixed(u8),
    /// Code picked by the first argument (timer family)
    Indexed {
        /// Field the first argument is validated and packed with
        index: Field,
        /// Maps the index to the wire code
        resolve: fn(u8) -> u8
    }
}

/// Static description of one protocol operation
#[derive(Debug, Clone, Copy)]
pub struct Command {
    /// Lower case command name
    pub name: &'static str,
    /// Wire code
    pub code: Code,
    /// Subcode sent as first payload byte
    pub subcode: Option<u8>,
    /// Can be called without arguments to read the current value
    pub get: bool,
    /// Can be called with arguments to change the value
    pub set: bool,
    /// SET payload layout
    pub fields: &'static [Field],
    /// Response payload layout when it differs from `fields`
    pub response_fields: Option<&'static [Field]>,
    /// Payload length that identifies another revision of this command
    pub other_revision: Option<(usize, &'static str)>,
    /// One line description
    pub doc: &'static str
}

impl Command {
    /// Template for descriptor declarations
    pub const BASE: Command = Command {
        name: "",
        code: Code::Fixed(0),
        subcode: None,
        get: false,
        set: false,
        fields: &[],
        response_fields: None,
        other_revision: None,
        doc: ""
    };

    /// Fields expected in a response
    pub fn response_fields(&self) -> &'static [Field] {
        self.response_fields.unwrap_or(self.fields)
    }

    /// `(code, subcode)` for ordering, timer family sorts on its first code
    pub fn order(&self) -> (u8, u8) {
        let code = match self.code {
            Code::Fixed(code) => code,
            Code::Indexed { resolve, .. } => resolve(1)
        };
        (code, self.subcode.unwrap_or(0))
    }

    /// Pick the wire code, returning the arguments left for the payload
    pub fn resolve<'a>(&self, args: &'a [Value]) -> Result<(u8, &'a [Value]), ArgumentError> {
        match self.code {
            Code::Fixed(code) => Ok((code, args)),
            Code::Indexed { index, resolve } => {
                let Some((first, rest)) = args.split_first() else {
                    return Err(ArgumentError::ArgumentCount {
                        command: self.name,
                        expected: self.fields.len() + 1,
                        got: 0
                    });
                };
                let packed = index.pack(first)?;
                Ok((resolve(packed[0]), rest))
            }
        }
    }

    /// Build the SET payload, or an empty GET payload when `args` is empty
    pub fn pack(&self, args: &[Value]) -> Result<Vec<u8>, ArgumentError> {
        if args.is_empty() {
            if self.get || self.fields.is_empty() {
                return Ok(Vec::new());
            }
            return Err(ArgumentError::MissingArguments { command: self.name });
        }
        if !self.set {
            return Err(ArgumentError::ReadOnly { command: self.name });
        }
        if args.len() != self.fields.len() {
            return Err(ArgumentError::ArgumentCount {
                command: self.name,
                expected: self.fields.len(),
                got: args.len()
            });
        }

        let mut payload = Vec::new();
        for (field, value) in self.fields.iter().zip(args) {
            payload.extend(field.pack(value)?);
        }
        Ok(payload)
    }

    /// Parse an ACK payload through the response fields
    pub fn parse(&self, data: &[u8], mode: ParseMode) -> Result<Vec<Value>, DecodeError> {
        if let Some((length, hint)) = self.other_revision
            && data.len() == length {
            return Err(DecodeError::VersionMismatch { command: self.name, length, hint });
        }

        let mut values = Vec::new();
        let mut cursor = 0;
        for field in self.response_fields() {
            let (value, used) = field.parse(&data[cursor..], mode)?;
            values.push(value);
            cursor += used;
            if field.is_open_ended() {
                return Ok(values);
            }
        }

        if cursor < data.len() {
            return Err(DecodeError::UnparsedData(data[cursor..].to_vec()));
        }
        Ok(values)
    }

    /// Send this command to `display_id` and parse the response, strict enums
    pub async fn invoke(&self, connection: &mut MDCConnection, display_id: u8, args: &[Value]) -> Result<Vec<Value>, Error> {
        self.invoke_with_mode(connection, display_id, args, ParseMode::Strict).await
    }

    /// Same as [Command::invoke] with an explicit enum parsing mode
    pub async fn invoke_with_mode(
        &self,
        connection: &mut MDCConnection,
        display_id: u8,
        args: &[Value],
        mode: ParseMode
    ) -> Result<Vec<Value>, Error> {
        let (code, args) = self.resolve(args)?;
        let payload = self.pack(args)?;
        debug!(command = self.name, display_id, "Invoking 0x{code:02X}");

        let response = connection.send(code, self.subcode, display_id, &payload).await?;
        if !response.ack {
            return Err(Error::Nak(response.data.first().copied().unwrap_or_default()));
        }
        if response.code != code || response.subcode != self.subcode {
            return Err(Error::InvalidResponse {
                source: proto::Error::UnexpectedEcho { expected: code, got: response.code },
                raw: response.data
            });
        }
        Ok(self.parse(&response.data, mode)?)
    }
}
