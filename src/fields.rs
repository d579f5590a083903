//! Typed pack/parse units for command payloads
//!
//! A [Field] describes how one value is laid out on the wire. Fields are plain
//! `const` data so that command tables can be declared as statics, and every
//! field converts between bytes and a dynamic [Value].

use std::{fmt, net::Ipv4Addr};

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use thiserror::Error;

/// Byte order of multi-byte integers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Most significant byte first (MDC default)
    Big,
    /// Least significant byte first
    Little
}

/// How many bytes an integer field occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    /// Always `n` bytes
    Fixed(usize),
    /// Whatever is left in the payload, big endian. Only valid as last field.
    Remainder
}

/// A closed set of named byte values
#[derive(Debug, PartialEq, Eq)]
pub struct EnumDef {
    /// Enumeration name, as rendered in `<NAME.MEMBER:value>`
    pub name: &'static str,
    /// Member names and their wire value
    pub members: &'static [(&'static str, u8)]
}

impl EnumDef {
    /// Find member by wire value
    pub fn member(&'static self, value: u8) -> Option<Member> {
        self.members.iter()
            .find(|(_, v)| *v == value)
            .map(|(name, value)| Member { def: self, name, value: *value })
    }

    /// Find member by name, ignoring case
    pub fn member_named(&'static self, name: &str) -> Option<Member> {
        self.members.iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(name, value)| Member { def: self, name, value: *value })
    }

    /// Decode a byte: a member, or the raw byte when permitted
    pub fn decode(&'static self, field: &'static str, value: u8, mode: ParseMode) -> Result<EnumValue, DecodeError> {
        match (self.member(value), mode) {
            (Some(member), _) => Ok(EnumValue::Member(member)),
            (None, ParseMode::Permissive) => Ok(EnumValue::Raw(value)),
            (None, ParseMode::Strict) => Err(DecodeError::UnknownEnumValue { field, value })
        }
    }
}

/// One named value of an [EnumDef]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Member {
    /// Owning enumeration
    pub def: &'static EnumDef,
    /// Member name
    pub name: &'static str,
    /// Wire value
    pub value: u8
}

/// Result of decoding an enumeration byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumValue {
    /// Known member
    Member(Member),
    /// Byte with no matching member (permissive parsing only)
    Raw(u8)
}

impl EnumValue {
    /// Wire byte of this value
    pub fn value(&self) -> u8 {
        match self {
            EnumValue::Member(member) => member.value,
            EnumValue::Raw(value) => *value
        }
    }
}

/// How unknown enumeration bytes are handled while parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Unknown bytes are a [DecodeError]
    #[default]
    Strict,
    /// Unknown bytes are kept as [EnumValue::Raw]
    Permissive
}

/// A decoded or to-be-encoded field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Unsigned integer
    Int(u64),
    /// Boolean
    Bool(bool),
    /// Enumeration
    Enum(EnumValue),
    /// UTF-8 text
    Str(String),
    /// Time of day (12 hour and 24 hour fields)
    Time(NaiveTime),
    /// Date and time
    DateTime(NaiveDateTime),
    /// Set of enumeration members, one bit each
    Bitmask(Vec<EnumValue>),
    /// IPv4 address
    Ip(Ipv4Addr),
    /// Video wall layout, `x` columns by `y` rows
    VideoWall {
        /// Horizontal axis (0-15)
        x: u8,
        /// Vertical axis (0-15)
        y: u8
    }
}

impl From<Member> for Value {
    fn from(member: Member) -> Self {
        Value::Enum(EnumValue::Member(member))
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_owned())
    }
}

impl From<Ipv4Addr> for Value {
    fn from(value: Ipv4Addr) -> Self {
        Value::Ip(value)
    }
}

impl From<NaiveTime> for Value {
    fn from(value: NaiveTime) -> Self {
        Value::Time(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

impl fmt::Display for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnumValue::Member(m) => write!(f, "<{}.{}:{}>", m.def.name, m.name, m.value),
            EnumValue::Raw(value) => write!(f, "{value}")
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Enum(v) => write!(f, "{v}"),
            Value::Str(v) => f.write_str(v),
            Value::Time(v) => write!(f, "{}", v.format("%H:%M:%S")),
            Value::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%dT%H:%M:%S")),
            Value::Bitmask(members) => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{member}")?;
                }
                Ok(())
            }
            Value::Ip(v) => write!(f, "{v}"),
            Value::VideoWall { x, y } => write!(f, "{x},{y}")
        }
    }
}

/// Wire layout of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Unsigned integer, optionally range checked on pack
    Int {
        /// Bytes taken
        width: IntWidth,
        /// Byte order for multi-byte widths
        order: ByteOrder,
        /// Inclusive allowed range
        range: Option<(u64, u64)>
    },
    /// 0 or 1
    Bool,
    /// One byte mapped through an enumeration
    Enum(&'static EnumDef),
    /// UTF-8 text padded with NUL; `None` length takes the rest of the payload
    Str {
        /// Fixed byte length
        length: Option<usize>
    },
    /// `code, length, bytes` text
    StrCoded {
        /// Discriminator byte expected first
        code: u8
    },
    /// `hour(1-12), minute, AM=1/PM=0`
    Time12H,
    /// `hour, minute[, second]`
    Time {
        /// Whether a seconds byte follows
        seconds: bool
    },
    /// `day, hour(1-12), minute, [second], month, year(2), AM=1/PM=0`
    DateTime {
        /// Whether a seconds byte is present
        seconds: bool
    },
    /// One bit per enumeration member, member value is the bit position
    Bitmask(&'static EnumDef),
    /// Four octets
    Ip,
    /// Both axes in one byte: high nibble `y`, low nibble `x`
    VideoWall
}

/// A named, typed pack/parse unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Stable field name, shown in help and errors
    pub name: &'static str,
    /// Wire layout
    pub kind: FieldKind
}

impl Field {
    /// One byte integer
    pub const fn int(name: &'static str) -> Self {
        Self::int_wide(name, 1)
    }

    /// One byte integer restricted to `min..=max`
    pub const fn int_range(name: &'static str, min: u64, max: u64) -> Self {
        Self {
            name,
            kind: FieldKind::Int { width: IntWidth::Fixed(1), order: ByteOrder::Big, range: Some((min, max)) }
        }
    }

    /// Big endian integer of `length` bytes
    pub const fn int_wide(name: &'static str, length: usize) -> Self {
        Self {
            name,
            kind: FieldKind::Int { width: IntWidth::Fixed(length), order: ByteOrder::Big, range: None }
        }
    }

    /// Little endian integer of `length` bytes
    pub const fn int_le(name: &'static str, length: usize) -> Self {
        Self {
            name,
            kind: FieldKind::Int { width: IntWidth::Fixed(length), order: ByteOrder::Little, range: None }
        }
    }

    /// Big endian integer taking the rest of the payload
    pub const fn int_remainder(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Int { width: IntWidth::Remainder, order: ByteOrder::Big, range: None }
        }
    }

    /// Boolean
    pub const fn boolean(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Bool }
    }

    /// Enumeration named after its definition
    pub const fn enumeration(def: &'static EnumDef) -> Self {
        Self { name: def.name, kind: FieldKind::Enum(def) }
    }

    /// Enumeration with an explicit field name
    pub const fn named_enum(name: &'static str, def: &'static EnumDef) -> Self {
        Self { name, kind: FieldKind::Enum(def) }
    }

    /// Text taking the rest of the payload
    pub const fn string(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Str { length: None } }
    }

    /// Text of `length` bytes
    pub const fn fixed_string(name: &'static str, length: usize) -> Self {
        Self { name, kind: FieldKind::Str { length: Some(length) } }
    }

    /// Length-prefixed text introduced by `code`
    pub const fn coded_string(name: &'static str, code: u8) -> Self {
        Self { name, kind: FieldKind::StrCoded { code } }
    }

    /// 12 hour time with AM/PM flag
    pub const fn time12h(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Time12H }
    }

    /// 24 hour time
    pub const fn time(name: &'static str, seconds: bool) -> Self {
        Self { name, kind: FieldKind::Time { seconds } }
    }

    /// Date and 12 hour time
    pub const fn datetime(name: &'static str, seconds: bool) -> Self {
        Self { name, kind: FieldKind::DateTime { seconds } }
    }

    /// Set of enumeration members packed as bits
    pub const fn bitmask(name: &'static str, def: &'static EnumDef) -> Self {
        Self { name, kind: FieldKind::Bitmask(def) }
    }

    /// Dotted IPv4 address
    pub const fn ip(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Ip }
    }

    /// Video wall layout
    pub const fn video_wall(name: &'static str) -> Self {
        Self { name, kind: FieldKind::VideoWall }
    }

    /// Whether this field swallows everything left in the payload
    pub fn is_open_ended(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::Str { length: None } | FieldKind::Int { width: IntWidth::Remainder, .. }
        )
    }

    /// Name of the value type this field takes, for help output
    pub fn value_type(&self) -> &'static str {
        match self.kind {
            FieldKind::Int { .. } => "int",
            FieldKind::Bool => "bool",
            FieldKind::Enum(_) => "enum",
            FieldKind::Str { .. } | FieldKind::StrCoded { .. } => "str",
            FieldKind::Time12H | FieldKind::Time { .. } => "time",
            FieldKind::DateTime { .. } => "datetime",
            FieldKind::Bitmask(_) => "list(enum)",
            FieldKind::Ip => "ip",
            FieldKind::VideoWall => "x,y"
        }
    }

    /// Encode `value` into wire bytes
    pub fn pack(&self, value: &Value) -> Result<Vec<u8>, ArgumentError> {
        let name = self.name;
        match (self.kind, value) {
            (FieldKind::Int { width, order, range }, Value::Int(v)) => {
                if let Some((min, max)) = range
                    && !(min..=max).contains(v) {
                    return Err(ArgumentError::OutOfRange { field: name, value: *v, min, max });
                }
                let length = match width {
                    IntWidth::Fixed(length) => length,
                    IntWidth::Remainder => (8 - v.leading_zeros() as usize / 8).max(1)
                };
                if length < 8 && *v >> (length * 8) != 0 {
                    let max = (1_u64 << (length * 8)) - 1;
                    return Err(ArgumentError::OutOfRange { field: name, value: *v, min: 0, max });
                }
                let bytes = v.to_be_bytes();
                let mut packed = if length <= 8 {
                    bytes[8 - length..].to_vec()
                } else {
                    let mut padded = vec![0; length - 8];
                    padded.extend_from_slice(&bytes);
                    padded
                };
                if order == ByteOrder::Little {
                    packed.reverse();
                }
                Ok(packed)
            }
            (FieldKind::Bool, Value::Bool(v)) => Ok(vec![*v as u8]),
            (FieldKind::Bool, Value::Int(v @ (0 | 1))) => Ok(vec![*v as u8]),
            (FieldKind::Bool, Value::Int(v)) => {
                Err(ArgumentError::OutOfRange { field: name, value: *v, min: 0, max: 1 })
            }
            (FieldKind::Enum(def), Value::Enum(v)) => Ok(vec![enum_byte(name, def, v.value())?]),
            (FieldKind::Enum(def), Value::Int(v)) => {
                let byte = u8::try_from(*v).map_err(|_| unknown_member(name, v))?;
                Ok(vec![enum_byte(name, def, byte)?])
            }
            (FieldKind::Str { length }, Value::Str(v)) => {
                if let Some(max) = length
                    && v.len() > max {
                    return Err(ArgumentError::TooLong { field: name, length: v.len(), max });
                }
                let mut packed = v.as_bytes().to_vec();
                if let Some(length) = length {
                    packed.resize(length, 0);
                }
                Ok(packed)
            }
            (FieldKind::StrCoded { code }, Value::Str(v)) => {
                let length = u8::try_from(v.len())
                    .map_err(|_| ArgumentError::TooLong { field: name, length: v.len(), max: 255 })?;
                let mut packed = vec![code, length];
                packed.extend_from_slice(v.as_bytes());
                Ok(packed)
            }
            (FieldKind::Time12H, Value::Time(t)) => {
                let (pm, hour) = t.hour12();
                Ok(vec![hour as u8, t.minute() as u8, day_part(pm)])
            }
            (FieldKind::Time { seconds }, Value::Time(t)) => {
                let mut packed = vec![t.hour() as u8, t.minute() as u8];
                if seconds {
                    packed.push(t.second() as u8);
                }
                Ok(packed)
            }
            (FieldKind::DateTime { seconds }, Value::DateTime(dt)) => {
                let year = u16::try_from(dt.year()).map_err(|_| ArgumentError::OutOfRange {
                    field: name,
                    value: dt.year().max(0) as u64,
                    min: 0,
                    max: u16::MAX as u64
                })?;
                let (pm, hour) = dt.hour12();
                let mut packed = vec![dt.day() as u8, hour as u8, dt.minute() as u8];
                if seconds {
                    packed.push(dt.second() as u8);
                }
                packed.push(dt.month() as u8);
                packed.extend_from_slice(&year.to_be_bytes());
                packed.push(day_part(pm));
                Ok(packed)
            }
            (FieldKind::Bitmask(def), Value::Bitmask(members)) => {
                let mut mask = 0_u8;
                for member in members {
                    let bit = enum_byte(name, def, member.value())?;
                    if bit > 7 {
                        return Err(ArgumentError::OutOfRange { field: name, value: bit as u64, min: 0, max: 7 });
                    }
                    mask |= 1 << bit;
                }
                Ok(vec![mask])
            }
            (FieldKind::Ip, Value::Ip(ip)) => Ok(ip.octets().to_vec()),
            (FieldKind::VideoWall, Value::VideoWall { x, y }) => {
                for axis in [*x, *y] {
                    if axis > 15 {
                        return Err(ArgumentError::OutOfRange { field: name, value: axis as u64, min: 0, max: 15 });
                    }
                }
                Ok(vec![(y << 4) | x])
            }
            _ => Err(ArgumentError::WrongType { field: name, expected: self.value_type() })
        }
    }

    /// Decode one value from the start of `data`.
    ///
    /// Returns the value and the number of bytes consumed.
    pub fn parse(&self, data: &[u8], mode: ParseMode) -> Result<(Value, usize), DecodeError> {
        let name = self.name;
        let take = |needed: usize| {
            data.get(..needed).ok_or(DecodeError::ShortResponse { field: name, needed, available: data.len() })
        };

        match self.kind {
            FieldKind::Int { width, order, .. } => {
                let bytes = match width {
                    IntWidth::Fixed(length) => take(length)?,
                    IntWidth::Remainder if data.is_empty() => take(1)?,
                    IntWidth::Remainder if data.len() > 8 => {
                        return Err(DecodeError::IntTooWide { field: name, length: data.len() });
                    }
                    IntWidth::Remainder => data
                };
                let fold = |acc: u64, b: &u8| (acc << 8) | *b as u64;
                let value = match order {
                    ByteOrder::Big => bytes.iter().fold(0, fold),
                    ByteOrder::Little => bytes.iter().rev().fold(0, fold)
                };
                Ok((Value::Int(value), bytes.len()))
            }
            FieldKind::Bool => Ok((Value::Bool(take(1)?[0] != 0), 1)),
            FieldKind::Enum(def) => Ok((Value::Enum(def.decode(name, take(1)?[0], mode)?), 1)),
            FieldKind::Str { length } => {
                let bytes = match length {
                    Some(length) => take(length)?,
                    None => data
                };
                Ok((Value::Str(decode_str(name, bytes)?), bytes.len()))
            }
            FieldKind::StrCoded { code } => {
                let head = take(2)?;
                if head[0] != code {
                    return Err(DecodeError::CodeMismatch { field: name, expected: code, got: head[0] });
                }
                let length = head[1] as usize;
                let bytes = &take(2 + length)?[2..];
                Ok((Value::Str(decode_str(name, bytes)?), 2 + length))
            }
            FieldKind::Time12H => {
                let bytes = take(3)?;
                Ok((Value::Time(time_from_12h(name, bytes[2], bytes[0], bytes[1], 0)?), 3))
            }
            FieldKind::Time { seconds } => {
                let length = if seconds { 3 } else { 2 };
                let bytes = take(length)?;
                let second = if seconds { bytes[2] } else { 0 };
                let time = NaiveTime::from_hms_opt(bytes[0] as u32, bytes[1] as u32, second as u32)
                    .ok_or_else(|| DecodeError::InvalidTime { field: name, bytes: bytes.to_vec() })?;
                Ok((Value::Time(time), length))
            }
            FieldKind::DateTime { seconds } => {
                let length = if seconds { 8 } else { 7 };
                let bytes = take(length)?;
                let (second, rest) = if seconds { (bytes[3], &bytes[4..]) } else { (0, &bytes[3..]) };
                let time = time_from_12h(name, rest[3], bytes[1], bytes[2], second)?;
                let year = u16::from_be_bytes([rest[1], rest[2]]);
                let date = NaiveDate::from_ymd_opt(year as i32, rest[0] as u32, bytes[0] as u32)
                    .ok_or_else(|| DecodeError::InvalidTime { field: name, bytes: bytes.to_vec() })?;
                Ok((Value::DateTime(date.and_time(time)), length))
            }
            FieldKind::Bitmask(def) => {
                let mask = take(1)?[0];
                let members = (0..8_u8)
                    .filter(|bit| mask & (1 << bit) != 0)
                    .map(|bit| def.decode(name, bit, mode))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((Value::Bitmask(members), 1))
            }
            FieldKind::Ip => {
                let bytes = take(4)?;
                Ok((Value::Ip(Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3])), 4))
            }
            FieldKind::VideoWall => {
                let byte = take(1)?[0];
                Ok((Value::VideoWall { x: byte & 0x0F, y: byte >> 4 }, 1))
            }
        }
    }
}

fn unknown_member(field: &'static str, value: impl ToString) -> ArgumentError {
    ArgumentError::UnknownMember { field, value: value.to_string() }
}

fn enum_byte(field: &'static str, def: &'static EnumDef, value: u8) -> Result<u8, ArgumentError> {
    def.member(value).map(|m| m.value).ok_or_else(|| unknown_member(field, value))
}

// AM is 1, PM is 0
fn day_part(pm: bool) -> u8 {
    if pm { 0 } else { 1 }
}

fn time_from_12h(field: &'static str, day_part: u8, hour: u8, minute: u8, second: u8) -> Result<NaiveTime, DecodeError> {
    let invalid = || DecodeError::InvalidTime { field, bytes: vec![hour, minute, day_part] };
    if !(1..=12).contains(&hour) || day_part > 1 {
        return Err(invalid());
    }
    let hour = hour % 12 + if day_part == 0 { 12 } else { 0 };
    NaiveTime::from_hms_opt(hour as u32, minute as u32, second as u32).ok_or_else(invalid)
}

fn decode_str(field: &'static str, bytes: &[u8]) -> Result<String, DecodeError> {
    let text = std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8 { field })?;
    Ok(text.trim_end_matches('\0').to_owned())
}

/// Caller supplied a value that cannot be encoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    /// Number outside of the declared range
    #[error("{field}: {value} not in range {min}-{max}")]
    OutOfRange {
        /// Field name
        field: &'static str,
        /// Rejected value
        value: u64,
        /// Lowest accepted value
        min: u64,
        /// Highest accepted value
        max: u64
    },
    /// Text longer than the field allows
    #[error("{field}: length {length} exceeds {max}")]
    TooLong {
        /// Field name
        field: &'static str,
        /// Supplied length in bytes
        length: usize,
        /// Maximum length in bytes
        max: usize
    },
    /// Value of the wrong kind for this field
    #[error("{field}: expected {expected}")]
    WrongType {
        /// Field name
        field: &'static str,
        /// Expected value type
        expected: &'static str
    },
    /// Not a member of the field enumeration
    #[error("{field}: unknown value {value}")]
    UnknownMember {
        /// Field name
        field: &'static str,
        /// Rejected value or name
        value: String
    },
    /// Text argument that does not convert to the field type
    #[error("{field}: invalid {expected} \"{value}\"")]
    InvalidText {
        /// Field name
        field: &'static str,
        /// Expected value type
        expected: &'static str,
        /// Supplied text
        value: String
    },
    /// Number of arguments does not match the command fields
    #[error("{command}: expected {expected} arguments, got {got}")]
    ArgumentCount {
        /// Command name
        command: &'static str,
        /// Declared field count
        expected: usize,
        /// Supplied argument count
        got: usize
    },
    /// Arguments supplied to a command that only supports GET
    #[error("{command}: readonly command doesn't accept any arguments")]
    ReadOnly {
        /// Command name
        command: &'static str
    },
    /// No arguments supplied to a command that only supports SET
    #[error("{command}: arguments required")]
    MissingArguments {
        /// Command name
        command: &'static str
    }
}

/// Response payload that does not match the command fields
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Not enough bytes left for a field
    #[error("short response: {field} needs {needed} bytes, {available} available")]
    ShortResponse {
        /// Field name
        field: &'static str,
        /// Bytes required
        needed: usize,
        /// Bytes left
        available: usize
    },
    /// Open ended integer wider than 64 bits
    #[error("{field}: {length} bytes do not fit a 64 bit integer")]
    IntTooWide {
        /// Field name
        field: &'static str,
        /// Bytes received
        length: usize
    },
    /// Bytes left after the last field
    #[error("unparsed data remaining: {0:02X?}")]
    UnparsedData(Vec<u8>),
    /// Byte with no matching enumeration member
    #[error("{field}: unknown value 0x{value:02X}")]
    UnknownEnumValue {
        /// Field name
        field: &'static str,
        /// Received byte
        value: u8
    },
    /// Coded string with an unexpected discriminator
    #[error("{field}: expected code 0x{expected:02X}, got 0x{got:02X}")]
    CodeMismatch {
        /// Field name
        field: &'static str,
        /// Declared code
        expected: u8,
        /// Received code
        got: u8
    },
    /// Text that is not UTF-8
    #[error("{field}: invalid UTF-8")]
    InvalidUtf8 {
        /// Field name
        field: &'static str
    },
    /// Time or date components out of bounds
    #[error("{field}: invalid time {bytes:02X?}")]
    InvalidTime {
        /// Field name
        field: &'static str,
        /// Received bytes
        bytes: Vec<u8>
    },
    /// Payload length matches another revision of the command
    #[error("{command}: unexpected data length {length}, looks like {hint} version")]
    VersionMismatch {
        /// Command name
        command: &'static str,
        /// Received payload length
        length: usize,
        /// Command matching that length
        hint: &'static str
    }
}
