//! Text response grammar for each protocol step.
//!
//! Bodies are newline-separated fields. They are trimmed of surrounding
//! whitespace before splitting, so a trailing newline never adds a field.
//! Parsers return `None` when the body does not match; the caller turns
//! that into [`ProtocolError::MalformedResponse`](super::ProtocolError).

use super::constants::{PROGRESS_MARKER, SUCCESS_MARKER};
use super::session::{Session, SessionCookie};
use super::types::{ImportStatus, TransferParameters};

const SESSID_PREFIX: &str = "sessid=";
const TIMESTAMP_PREFIX: &str = "timestamp=";
const ZIP_PREFIX: &str = "zip=";
const FILE_LIMIT_PREFIX: &str = "file_limit=";

/// Splits a response body into its fields.
#[must_use]
pub fn fields(body: &str) -> Vec<&str> {
    body.trim().split('\n').collect()
}

/// Parses a checkauth body into the session it establishes.
///
/// ```text
/// success
/// <cookie name>
/// <cookie value>
/// sessid=<id>          (optional)
/// timestamp=<token>    (optional)
/// ```
#[must_use]
pub fn parse_checkauth(body: &str) -> Option<Session> {
    let fields = fields(body);
    if fields.len() < 3 || fields[0] != SUCCESS_MARKER {
        return None;
    }

    let cookie = SessionCookie::new(fields[1], fields[2]);
    let session_id = prefixed_value(fields.get(3).copied(), SESSID_PREFIX);
    let timestamp = prefixed_value(fields.get(4).copied(), TIMESTAMP_PREFIX);

    Some(Session::established(cookie, session_id, timestamp))
}

/// Parses an init body: exactly `zip=<yes|..>` then `file_limit=<integer>`.
#[must_use]
pub fn parse_init(body: &str) -> Option<TransferParameters> {
    let fields = fields(body);
    let [zip, file_limit] = fields.as_slice() else {
        return None;
    };

    let zip = zip.strip_prefix(ZIP_PREFIX)?;
    let file_limit = file_limit.strip_prefix(FILE_LIMIT_PREFIX)?;
    if file_limit.is_empty() || !file_limit.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let chunk_byte_limit = file_limit.parse::<u64>().ok()?;

    Some(TransferParameters {
        use_compression: zip == "yes",
        chunk_byte_limit,
    })
}

/// Returns true if a file-mode body acknowledges the chunk.
#[must_use]
pub fn parse_file_ack(body: &str) -> bool {
    fields(body).first() == Some(&SUCCESS_MARKER)
}

/// Parses an import body into the import status it reports.
#[must_use]
pub fn parse_import(body: &str) -> Option<ImportStatus> {
    match fields(body).first().copied() {
        Some(SUCCESS_MARKER) => Some(ImportStatus::Finished),
        Some(PROGRESS_MARKER) => Some(ImportStatus::InProgress),
        _ => None,
    }
}

fn prefixed_value(field: Option<&str>, prefix: &str) -> String {
    field
        .and_then(|field| field.strip_prefix(prefix))
        .unwrap_or_default()
        .to_string()
}
