//! Console I/O for eass values
//!
//! The output sink is any `io::Write` and the line source any `io::BufRead`,
//! so everything here can run against stdout/stdin or in-memory buffers.
//!
//! # Printing
//!
//! `print_to` is the streaming counterpart of `string_format`: it renders
//! straight into the sink without building the whole string first. Output
//! written before a failed argument stays written; the failure is then
//! described on the same line and the line is always terminated.
//!
//! # Input
//!
//! A line is classified after stripping its terminator:
//!
//! | line                       | value          |
//! |----------------------------|----------------|
//! | empty                      | empty Text     |
//! | whole trimmed text is i32  | Int            |
//! | whole trimmed text is f32  | Float          |
//! | anything else              | Text (raw)     |
//!
//! End of input and read errors are `IoFailure`.

use eass_core::error::{EassError, raise};
use eass_core::render::{failed_value_error, failure_description, render_into};
use eass_core::{Template, Value};
use std::fmt;
use std::io::{self, BufRead, Write};

/// `fmt::Write` over an `io::Write`, keeping the first I/O error
struct SinkAdapter<'a, W: Write> {
    inner: &'a mut W,
    error: Option<io::Error>,
}

impl<'a, W: Write> SinkAdapter<'a, W> {
    fn new(inner: &'a mut W) -> Self {
        Self { inner, error: None }
    }
}

impl<W: Write> fmt::Write for SinkAdapter<'_, W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.inner.write_all(s.as_bytes()).map_err(|e| {
            self.error = Some(e);
            fmt::Error
        })
    }
}

fn write_error(context: &str) -> impl Fn(io::Error) -> EassError + '_ {
    move |e| raise(EassError::io(&e, context))
}

/// Format `template` with `args` straight into `out`, then end the line.
///
/// On a failed or missing argument the text rendered so far is followed by
/// `Error: <code> - <message>` and a newline, and the error is returned.
pub fn print_to<W: Write>(out: &mut W, template: &str, args: &[Value]) -> Result<(), EassError> {
    let template = Template::parse(template);
    let mut sink = SinkAdapter::new(out);
    let written = template.write_to(&mut sink, args);
    let result = match (written, sink.error.take()) {
        (Ok(()), _) => Ok(()),
        // The sink itself is broken: nothing more can be written.
        (Err(_), Some(io_err)) => {
            return Err(raise(EassError::io(&io_err, "write failed in print")));
        }
        (Err(err), None) => {
            write!(out, "Error: {} - {}", err.code(), err.message())
                .map_err(write_error("write failed in print"))?;
            Err(err)
        }
    };
    out.write_all(b"\n")
        .map_err(write_error("write failed in print"))?;
    out.flush().map_err(write_error("flush failed in print"))?;
    result
}

/// [`print_to`] on stdout
pub fn print(template: &str, args: &[Value]) -> Result<(), EassError> {
    let stdout = io::stdout();
    let mut lock = stdout.lock();
    print_to(&mut lock, template, args)
}

/// Print with literal arguments, converting each one with `Value::from`.
#[macro_export]
macro_rules! eass_print {
    ($template:expr $(, $arg:expr)* $(,)?) => {
        $crate::io::print($template, &[$($crate::eass_core::Value::from($arg)),*])
    };
}

/// Debug printer: the rendering of `value` on its own line.
///
/// A failed value prints its error description instead.
pub fn print_value<W: Write>(out: &mut W, value: &Value) -> Result<(), EassError> {
    if value.is_failed() {
        writeln!(out, "{}", failure_description()).map_err(write_error("write failed in print"))?;
        return Err(failed_value_error());
    }
    let mut sink = SinkAdapter::new(out);
    if let Err(err) = render_into(&mut sink, value) {
        return Err(match sink.error.take() {
            Some(io_err) => raise(EassError::io(&io_err, "write failed in print")),
            None => err,
        });
    }
    out.write_all(b"\n")
        .map_err(write_error("write failed in print"))
}

/// Classify one line of input (terminator already removed).
pub fn convert_line(line: &str) -> Value {
    if line.is_empty() {
        return Value::text("");
    }
    let trimmed = line.trim();
    if let Ok(v) = trimmed.parse::<i32>() {
        return Value::int(v);
    }
    if let Ok(v) = trimmed.parse::<f32>() {
        return Value::float(v);
    }
    Value::text(line)
}

/// Read one line from `input` and convert it.
pub fn read_value<R: BufRead>(input: &mut R) -> Result<Value, EassError> {
    let mut buf = Vec::new();
    let n = input
        .read_until(b'\n', &mut buf)
        .map_err(|e| raise(EassError::io(&e, "getline failed")))?;
    if n == 0 {
        return Err(raise(EassError::io_failure("end of input")));
    }
    if buf.ends_with(b"\n") {
        buf.pop();
        if buf.ends_with(b"\r") {
            buf.pop();
        }
    }
    // Bytes that are not UTF-8 still make a Text line.
    let line = String::from_utf8_lossy(&buf);
    tracing::trace!(len = buf.len(), "input line read");
    let value = convert_line(&line);
    if value.is_failed() {
        return Err(failed_value_error());
    }
    Ok(value)
}

/// Write `prompt` to `out`, flush, then read and convert one line.
pub fn input_from<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    prompt: &str,
) -> Result<Value, EassError> {
    out.write_all(prompt.as_bytes())
        .map_err(write_error("write failed in input"))?;
    out.flush().map_err(write_error("flush failed in input"))?;
    read_value(input)
}

/// Prompt on stdout and read from stdin.
///
/// Any failure comes back as a failed Text value; the error channel has the
/// details.
pub fn input(prompt: &str) -> Value {
    let stdin = io::stdin();
    let stdout = io::stdout();
    input_from(&mut stdin.lock(), &mut stdout.lock(), prompt)
        .unwrap_or_else(|_| Value::failed_text())
}

/// `Hex: 0x<hex> | Binary: 0b<32 bits>` with a space after every fourth bit.
///
/// Negative numbers show their two's complement bits.
pub fn hex_binary(number: i32) -> String {
    let bits = number as u32;
    let mut out = format!("Hex: 0x{:x} | Binary: 0b", bits);
    for i in (0..32).rev() {
        out.push(if (bits >> i) & 1 == 1 { '1' } else { '0' });
        if i % 4 == 0 && i != 0 {
            out.push(' ');
        }
    }
    out
}

pub fn printhd_to<W: Write>(out: &mut W, number: i32) -> Result<(), EassError> {
    writeln!(out, "{}", hex_binary(number)).map_err(write_error("write failed in printhd"))
}

/// [`printhd_to`] on stdout
pub fn printhd(number: i32) -> Result<(), EassError> {
    let stdout = io::stdout();
    let mut lock = stdout.lock();
    printhd_to(&mut lock, number)
}
