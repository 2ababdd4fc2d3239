//! Value rendering
//!
//! Textual form of a [`Value`], shared by the formatter, the console print
//! and `Display`:
//!
//! | kind  | rendering                                   |
//! |-------|---------------------------------------------|
//! | Int   | signed decimal                              |
//! | Float | fixed point, six decimals (`1.500000`)      |
//! | Text  | the raw text                                |
//! | Array | `Array[` elements joined by `, ` `]`        |
//! | Null  | `NULL`                                      |
//!
//! Arrays render recursively. A failed value anywhere in the tree aborts the
//! rendering.

use crate::error::{EassError, ErrorKind, last_error, raise};
use crate::value::{Payload, Value};
use std::fmt::{self, Write};

/// Error for a failed value found while rendering.
///
/// The error channel already explains the original failure, so it is reused
/// as-is rather than overwritten. An empty channel gets a fresh entry.
pub fn failed_value_error() -> EassError {
    match last_error() {
        Some(record) => EassError::from_record(&record),
        None => raise(unexplained_failure()),
    }
}

/// Same error as [`failed_value_error`], leaving the channel untouched
fn peek_failed_value_error() -> EassError {
    match last_error() {
        Some(record) => EassError::from_record(&record),
        None => unexplained_failure(),
    }
}

fn unexplained_failure() -> EassError {
    EassError::invalid_argument("failed value cannot be rendered")
}

/// `Error: <code> - <message>` for the current channel entry
pub fn failure_description() -> String {
    match last_error() {
        Some(record) => record.describe(),
        None => format!(
            "Error: {} - failed value",
            ErrorKind::InvalidArgument.default_code()
        ),
    }
}

/// Append the rendering of `value` to `out`.
pub fn render_into<W: Write>(out: &mut W, value: &Value) -> Result<(), EassError> {
    render_with(out, value, failed_value_error)
}

fn render_with<W: Write>(
    out: &mut W,
    value: &Value,
    on_failed: fn() -> EassError,
) -> Result<(), EassError> {
    let payload = match value.payload() {
        Some(p) => p,
        None => return Err(on_failed()),
    };
    let written = match payload {
        Payload::Int(v) => write!(out, "{}", v),
        Payload::Float(v) => write!(out, "{:.6}", v),
        Payload::Text(t) => out.write_str(t.as_str()),
        Payload::Null => out.write_str("NULL"),
        Payload::Array(arr) => {
            out.write_str("Array[").map_err(sink_error)?;
            for (i, element) in arr.iter().enumerate() {
                if i > 0 {
                    out.write_str(", ").map_err(sink_error)?;
                }
                render_with(&mut *out, element, on_failed)?;
            }
            out.write_str("]")
        }
    };
    written.map_err(sink_error)
}

/// Render `value` into a fresh `String`.
pub fn render(value: &Value) -> Result<String, EassError> {
    let mut out = String::new();
    render_into(&mut out, value)?;
    Ok(out)
}

pub(crate) fn sink_error(_: fmt::Error) -> EassError {
    raise(EassError::io_failure("write to output sink failed"))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_failed() {
            return f.write_str(&failure_description());
        }
        // A failed element nested in an array shows as its description.
        let mut out = String::new();
        match render_with(&mut out, self, peek_failed_value_error) {
            Ok(()) => f.write_str(&out),
            Err(e) => write!(f, "Error: {} - {}", e.code(), e.message()),
        }
    }
}
