//! On-disk message encoding
//!
//! A message file is UTF-8 text with one field per line, in this order:
//!
//! ```text
//! <id>
//! <correlation id, or blank>
//! <reply-to address as queue@machine, or blank>
//! True | False              (blank or missing means True)
//! <RFC 3339 expiry, or blank for never>
//! {"header":"value",...}    (single-line JSON object)
//! <base64 body, or blank for none>
//! ```

use crate::schema::{Address, AddressError, Expiry, Message};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;
use thiserror::Error;

/// Formats accepted for the expiry line besides RFC 3339. Naive values are UTC.
const NAIVE_EXPIRY_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M:%S",
];

/// Malformed message file
#[derive(Debug, Error)]
pub enum CodecError {
    /// The file is not valid UTF-8
    #[error("message file is not valid UTF-8")]
    NotUtf8,

    /// First line missing or blank
    #[error("message id line is missing")]
    MissingId,

    #[error("invalid reply-to address: {0}")]
    InvalidReplyTo(#[from] AddressError),

    #[error("invalid expiry timestamp '{0}'")]
    InvalidExpiry(String),

    /// Headers line is not a JSON object of strings
    #[error("invalid headers line: {0}")]
    InvalidHeaders(serde_json::Error),

    #[error("invalid base64 body: {0}")]
    InvalidBody(#[from] base64::DecodeError),

    /// Headers could not be serialized
    #[error("failed to encode headers: {0}")]
    Encode(serde_json::Error),

    /// A single-line field contains a line break
    #[error("{field} contains a line break")]
    LineBreak { field: &'static str },
}

/// Serialize a message to its file representation.
///
/// Fails with [`CodecError::LineBreak`] when the id, correlation id or
/// reply-to would spill onto another line. Headers and body are escaped by
/// their encodings.
pub fn encode(message: &Message) -> Result<Vec<u8>, CodecError> {
    let headers = serde_json::to_string(&message.headers).map_err(CodecError::Encode)?;
    let correlation_id = message.correlation_id.clone().unwrap_or_default();
    let reply_to = message
        .reply_to
        .as_ref()
        .map(Address::to_string)
        .unwrap_or_default();

    single_line("id", &message.id)?;
    single_line("correlation id", &correlation_id)?;
    single_line("reply-to", &reply_to)?;

    let mut lines: Vec<String> = Vec::with_capacity(7);
    lines.push(message.id.clone());
    lines.push(correlation_id);
    lines.push(reply_to);
    lines.push(if message.recoverable { "True" } else { "False" }.to_string());
    lines.push(match message.expiry {
        Expiry::Never => String::new(),
        Expiry::At(at) => at.to_rfc3339_opts(SecondsFormat::Millis, true),
    });
    lines.push(headers);
    lines.push(
        message
            .body
            .as_ref()
            .map(|body| STANDARD.encode(body))
            .unwrap_or_default(),
    );

    let mut out = lines.join("\n");
    out.push('\n');
    Ok(out.into_bytes())
}

fn single_line(field: &'static str, value: &str) -> Result<(), CodecError> {
    if value.contains(['\n', '\r']) {
        return Err(CodecError::LineBreak { field });
    }
    Ok(())
}

/// Parse a message file.
///
/// Missing trailing lines are tolerated: recoverable defaults to true,
/// expiry to never, headers to empty and body to none. The id and
/// correlation id are kept verbatim; the structured fields ignore
/// surrounding whitespace.
pub fn decode(bytes: &[u8]) -> Result<Message, CodecError> {
    let text = std::str::from_utf8(bytes).map_err(|_| CodecError::NotUtf8)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut lines = text.lines().map(|line| line.strip_suffix('\r').unwrap_or(line));

    let id = match lines.next() {
        Some(id) if !id.trim().is_empty() => id.to_string(),
        _ => return Err(CodecError::MissingId),
    };
    let correlation_id = lines.next().unwrap_or_default();
    let reply_to = lines.next().unwrap_or_default().trim();
    let recoverable = lines.next().unwrap_or_default().trim();
    let expiry = lines.next().unwrap_or_default().trim();
    let headers = lines.next().unwrap_or_default().trim();
    let body = lines.next().unwrap_or_default().trim();

    Ok(Message {
        id,
        correlation_id: (!correlation_id.is_empty()).then(|| correlation_id.to_string()),
        reply_to: if reply_to.is_empty() {
            None
        } else {
            Some(Address::parse(reply_to)?)
        },
        recoverable: parse_recoverable(recoverable),
        expiry: parse_expiry(expiry)?,
        headers: parse_headers(headers)?,
        body: if body.is_empty() {
            None
        } else {
            Some(STANDARD.decode(body)?)
        },
    })
}

/// Anything but an explicit "false" is recoverable.
fn parse_recoverable(line: &str) -> bool {
    !line.eq_ignore_ascii_case("false")
}

fn parse_expiry(line: &str) -> Result<Expiry, CodecError> {
    if line.is_empty() {
        return Ok(Expiry::Never);
    }

    if let Ok(at) = DateTime::parse_from_rfc3339(line) {
        return Ok(Expiry::At(at.with_timezone(&Utc)));
    }

    NAIVE_EXPIRY_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(line, format).ok())
        .map(|naive| Expiry::At(naive.and_utc()))
        .ok_or_else(|| CodecError::InvalidExpiry(line.to_string()))
}

fn parse_headers(line: &str) -> Result<BTreeMap<String, String>, CodecError> {
    if line.is_empty() {
        return Ok(BTreeMap::new());
    }

    let headers: Option<BTreeMap<String, String>> =
        serde_json::from_str(line).map_err(CodecError::InvalidHeaders)?;
    Ok(headers.unwrap_or_default())
}
