//! Text front end: command arguments, targets and script files

use std::{fs, net::Ipv4Addr, path::Path, time::Duration};

use chrono::{NaiveDateTime, NaiveTime};
use thiserror::Error;

use crate::{
    client::ConnectionMode,
    command::{Code, Command},
    commands,
    executor::{Script, Step},
    fields::{ArgumentError, EnumDef, EnumValue, Field, FieldKind, Value},
};

const DATETIME_FORMATS: [&str; 4] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"];

/// Text that could not be turned into targets, arguments or script steps
#[derive(Debug, Error)]
pub enum ParseError {
    /// Malformed target
    #[error("{0}")]
    Target(String),
    /// Malformed command argument
    #[error(transparent)]
    Argument(#[from] ArgumentError),
    /// Script line names no known command
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    /// Malformed script line
    #[error("{0}")]
    Script(String),
    /// Error located in a file
    #[error("{file}:{line_number}: \"{line}\": {reason}")]
    Line {
        /// File name
        file: String,
        /// One based line number
        line_number: usize,
        /// Trimmed line
        line: String,
        /// What was wrong
        reason: Box<ParseError>
    },
    /// File could not be read
    #[error("{file}: {source}")]
    Io {
        /// File name
        file: String,
        /// Underlying error
        source: std::io::Error
    },
    /// File with no entries
    #[error("FILENAME \"{0}\" is empty")]
    Empty(String)
}

/// Decimal or `0x` prefixed hexadecimal
pub fn parse_int(text: &str) -> Option<u64> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok()
    }
}

/// Hex bytes, optionally separated by `:` or spaces (`a1:b2`, `a1b2`)
pub fn parse_hex(text: &str) -> Result<Vec<u8>, ParseError> {
    let digits: String = text.chars().filter(|c| *c != ':' && !c.is_whitespace()).collect();
    let invalid = || ParseError::Script(format!("Invalid hex \"{text}\""));
    if digits.len() % 2 != 0 {
        return Err(invalid());
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| digits.get(i..i + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()).ok_or_else(invalid))
        .collect()
}

fn invalid(field: &Field, expected: &'static str, text: &str) -> ArgumentError {
    ArgumentError::InvalidText { field: field.name, expected, value: text.to_owned() }
}

fn parse_member(field: &Field, def: &'static EnumDef, text: &str) -> Result<EnumValue, ArgumentError> {
    def.member_named(text)
        .or_else(|| parse_int(text).and_then(|v| u8::try_from(v).ok()).and_then(|v| def.member(v)))
        .map(EnumValue::Member)
        .ok_or_else(|| ArgumentError::UnknownMember { field: field.name, value: text.to_owned() })
}

fn parse_time(text: &str) -> Option<NaiveTime> {
    let parts = text.split(':').map(|p| p.parse::<u32>().ok()).collect::<Option<Vec<_>>>()?;
    match parts[..] {
        [h, m] => NaiveTime::from_hms_opt(h, m, 0),
        [h, m, s] => NaiveTime::from_hms_opt(h, m, s),
        _ => None
    }
}

/// Convert one command line argument to the value `field` packs
pub fn parse_value(field: &Field, text: &str) -> Result<Value, ArgumentError> {
    match field.kind {
        FieldKind::Int { .. } => parse_int(text).map(Value::Int).ok_or_else(|| invalid(field, "int", text)),
        FieldKind::Bool => match text.to_ascii_lowercase().as_str() {
            "1" | "true" | "on" | "yes" => Ok(Value::Bool(true)),
            "0" | "false" | "off" | "no" => Ok(Value::Bool(false)),
            _ => Err(invalid(field, "bool", text))
        },
        FieldKind::Enum(def) => Ok(Value::Enum(parse_member(field, def, text)?)),
        FieldKind::Str { .. } | FieldKind::StrCoded { .. } => Ok(Value::Str(text.to_owned())),
        FieldKind::Time12H | FieldKind::Time { .. } => {
            parse_time(text).map(Value::Time).ok_or_else(|| invalid(field, "time", text))
        }
        FieldKind::DateTime { .. } => DATETIME_FORMATS.iter()
            .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
            .map(Value::DateTime)
            .ok_or_else(|| invalid(field, "datetime", text)),
        FieldKind::Bitmask(def) => text.split(',')
            .filter(|name| !name.is_empty())
            .map(|name| parse_member(field, def, name))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Bitmask),
        FieldKind::Ip => text.parse::<Ipv4Addr>().map(Value::Ip).map_err(|_| invalid(field, "ip", text)),
        FieldKind::VideoWall => {
            let axis = |part: Option<&str>| part.and_then(|p| p.trim().parse::<u8>().ok());
            let mut parts = text.split(',');
            match (axis(parts.next()), axis(parts.next()), parts.next()) {
                (Some(x), Some(y), None) => Ok(Value::VideoWall { x, y }),
                _ => Err(invalid(field, "x,y", text))
            }
        }
    }
}

/// Convert the text arguments of a command invocation.
///
/// The timer index comes first for indexed commands. No data arguments is a
/// GET call.
pub fn parse_args(command: &Command, texts: &[String]) -> Result<Vec<Value>, ArgumentError> {
    let mut values = Vec::new();
    let mut texts = texts;
    if let Code::Indexed { index, .. } = command.code {
        let Some((first, rest)) = texts.split_first() else {
            return Err(ArgumentError::ArgumentCount { command: command.name, expected: command.fields.len() + 1, got: 0 });
        };
        values.push(parse_value(&index, first)?);
        texts = rest;
    }

    if texts.is_empty() {
        return Ok(values);
    }
    if !command.set {
        return Err(ArgumentError::ReadOnly { command: command.name });
    }
    if texts.len() != command.fields.len() {
        return Err(ArgumentError::ArgumentCount {
            command: command.name,
            expected: command.fields.len(),
            got: texts.len()
        });
    }
    for (field, text) in command.fields.iter().zip(texts) {
        values.push(parse_value(field, text)?);
    }
    Ok(values)
}

/// A display to reach, before any connection is made
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    /// Display id
    pub display_id: u8,
    /// `host[:port]` or serial port
    pub address: String,
    /// Transport guessed from the address
    pub mode: ConnectionMode
}

fn is_com_port(text: &str) -> bool {
    text.get(..3).is_some_and(|prefix| prefix.eq_ignore_ascii_case("COM"))
        && text[3..].starts_with(|c: char| c.is_ascii_digit())
}

fn looks_like_serial(address: &str) -> bool {
    address.contains('/') || address.starts_with('.') || is_com_port(address)
}

/// Parse `DISPLAY_ID@HOST[:PORT]` or `DISPLAY_ID@SERIAL_PORT`
pub fn parse_target(text: &str) -> Result<TargetSpec, ParseError> {
    let Some((display_id, address)) = text.split_once('@') else {
        return Err(ParseError::Target("DISPLAY_ID required (try 0, 1)".to_owned()));
    };
    let display_id = parse_int(display_id)
        .and_then(|id| u8::try_from(id).ok())
        .ok_or_else(|| ParseError::Target(format!(
            "Invalid DISPLAY_ID \"{display_id}\" (int or hex, example: 1, 0x01, 254, 0xFE)"
        )))?;

    if let Some((_, port)) = address.split_once(':') {
        if port.parse::<u16>().is_err() {
            return Err(ParseError::Target(format!("Invalid PORT \"{port}\"")));
        }
        return Ok(TargetSpec { display_id, address: address.to_owned(), mode: ConnectionMode::Tcp });
    }
    let mode = if looks_like_serial(address) { ConnectionMode::Serial } else { ConnectionMode::Tcp };
    Ok(TargetSpec { display_id, address: address.to_owned(), mode })
}

/// Non blank lines that are not `#` comments, with their one based number
fn meaningful_lines(contents: &str) -> impl Iterator<Item = (usize, &str)> {
    contents.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

fn at_line(file: &str, line_number: usize, line: &str, reason: ParseError) -> ParseError {
    ParseError::Line { file: file.to_owned(), line_number, line: line.to_owned(), reason: Box::new(reason) }
}

/// Parse a target list, one target per line
pub fn parse_target_list(file: &str, contents: &str) -> Result<Vec<TargetSpec>, ParseError> {
    let targets = meaningful_lines(contents)
        .map(|(n, line)| parse_target(line).map_err(|e| at_line(file, n, line, e)))
        .collect::<Result<Vec<_>, _>>()?;
    if targets.is_empty() {
        return Err(ParseError::Empty(file.to_owned()));
    }
    Ok(targets)
}

/// Resolve the TARGET argument: a single target or a file listing targets
pub fn load_targets(argument: &str) -> Result<Vec<TargetSpec>, ParseError> {
    if argument.contains('@') {
        return Ok(vec![parse_target(argument)?]);
    }
    if is_com_port(argument) || argument.starts_with("/dev/") {
        return Err(ParseError::Target(
            "Looks like you want to use serial port, but DISPLAY_ID required (try 0, 1)".to_owned()
        ));
    }
    let contents = fs::read_to_string(Path::new(argument))
        .map_err(|source| ParseError::Io { file: argument.to_owned(), source })?;
    parse_target_list(argument, &contents)
}

fn parse_step(words: &[String]) -> Result<Step, ParseError> {
    let Some((name, args)) = words.split_first() else {
        return Err(ParseError::Script("Empty command".to_owned()));
    };
    match name.to_ascii_lowercase().as_str() {
        "sleep" => {
            let [seconds] = args else {
                return Err(ParseError::Script("Sleep command accept exactly one argument".to_owned()));
            };
            seconds.parse::<f64>()
                .ok()
                .and_then(|s| Duration::try_from_secs_f64(s).ok())
                .map(Step::Sleep)
                .ok_or_else(|| ParseError::Script(format!("Sleep argument must be int/float: \"{seconds}\"")))
        }
        "disconnect" if args.is_empty() => Ok(Step::Disconnect),
        "disconnect" => Err(ParseError::Script("Disconnect command does not accept arguments".to_owned())),
        name => {
            let command = commands::find(name).ok_or_else(|| ParseError::UnknownCommand(name.to_owned()))?;
            Ok(Step::Command { command, args: parse_args(command, args)? })
        }
    }
}

/// Parse a script: one command per line, shell quoting, `#` comments,
/// plus `sleep SECONDS` and `disconnect`
pub fn parse_script(file: &str, contents: &str) -> Result<Script, ParseError> {
    let steps = meaningful_lines(contents)
        .map(|(n, line)| {
            shlex::split(line)
                .ok_or_else(|| ParseError::Script("No closing quotation".to_owned()))
                .and_then(|words| parse_step(&words))
                .map_err(|e| at_line(file, n, line, e))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Script { steps })
}
