//! Template formatting
//!
//! A template is literal text with positional placeholders:
//!
//! - `{}` takes the next argument, left to right
//! - `{N}` (decimal, any number of digits) takes argument `N` of the list
//!   supplied to the call, independent of how many `{}` came before
//!
//! Anything else in braces is copied through unchanged, as are a lone `}`
//! and an unmatched `{` at the end of the template.
//!
//! Formatting runs in two passes. [`Template::parse`] scans once, splitting
//! the template into segments, counting placeholders and computing a size
//! hint (literal bytes plus a fixed allowance per placeholder, since a value's
//! rendered length is unknown until it is rendered). The second pass walks
//! the segments and renders each designated argument.

use crate::alloc::{AllocHandle, default_allocator};
use crate::error::{EassError, raise};
use crate::render::render_into;
use crate::value::{Text, Value};
use std::fmt::Write;

/// Bytes reserved per placeholder when sizing the output
pub const PLACEHOLDER_ALLOWANCE: usize = 128;

/// One piece of a parsed template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'t> {
    Literal(&'t str),
    /// `{}`
    Next,
    /// `{N}`
    Index(usize),
}

/// A template split into segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template<'t> {
    segments: Vec<Segment<'t>>,
    placeholders: usize,
    size_hint: usize,
}

impl<'t> Template<'t> {
    pub fn parse(src: &'t str) -> Self {
        let bytes = src.as_bytes();
        let mut segments = Vec::new();
        let mut placeholders = 0;
        let mut literal_start = 0;
        let mut i = 0;

        while i < bytes.len() {
            if bytes[i] != b'{' {
                i += 1;
                continue;
            }
            let (segment, end) = match bytes.get(i + 1) {
                Some(b'}') => (Some(Segment::Next), i + 2),
                Some(b) if b.is_ascii_digit() => {
                    let digits_end = i + 1 + bytes[i + 1..]
                        .iter()
                        .take_while(|b| b.is_ascii_digit())
                        .count();
                    let index = src[i + 1..digits_end].parse::<usize>().ok();
                    match (bytes.get(digits_end), index) {
                        (Some(b'}'), Some(n)) => (Some(Segment::Index(n)), digits_end + 1),
                        _ => (None, i + 1),
                    }
                }
                _ => (None, i + 1),
            };
            // Not a placeholder: the brace stays in the literal run.
            if let Some(segment) = segment {
                if literal_start < i {
                    segments.push(Segment::Literal(&src[literal_start..i]));
                }
                segments.push(segment);
                placeholders += 1;
                literal_start = end;
            }
            i = end;
        }
        if literal_start < bytes.len() {
            segments.push(Segment::Literal(&src[literal_start..]));
        }

        let literal_bytes: usize = segments
            .iter()
            .map(|s| match s {
                Segment::Literal(text) => text.len(),
                _ => 0,
            })
            .sum();

        Self {
            segments,
            placeholders,
            size_hint: literal_bytes + placeholders * PLACEHOLDER_ALLOWANCE,
        }
    }

    pub fn segments(&self) -> &[Segment<'t>] {
        &self.segments
    }

    pub fn placeholders(&self) -> usize {
        self.placeholders
    }

    /// Upper-bound guess for the rendered length
    pub fn size_hint(&self) -> usize {
        self.size_hint
    }

    /// Render the template with `args` into `out`.
    ///
    /// Stops at the first failed argument, missing argument or sink error;
    /// whatever was written before that stays in `out`.
    pub fn write_to<W: Write>(&self, out: &mut W, args: &[Value]) -> Result<(), EassError> {
        let mut next = 0;
        for segment in &self.segments {
            let value = match *segment {
                Segment::Literal(text) => {
                    out.write_str(text).map_err(crate::render::sink_error)?;
                    continue;
                }
                Segment::Next => {
                    let value = args.get(next).ok_or_else(|| {
                        raise(EassError::invalid_argument(format!(
                            "placeholder {} has no argument ({} supplied)",
                            next,
                            args.len()
                        )))
                    })?;
                    next += 1;
                    value
                }
                Segment::Index(n) => args.get(n).ok_or_else(|| {
                    raise(EassError::invalid_argument(format!(
                        "argument index {} out of range ({} supplied)",
                        n,
                        args.len()
                    )))
                })?,
            };
            render_into(&mut *out, value)?;
        }
        Ok(())
    }
}

/// Format `template` with `args` into a new text owned by the caller.
pub fn string_format(template: &str, args: &[Value]) -> Result<Text, EassError> {
    string_format_in(template, args, &default_allocator())
}

/// Like [`string_format`], charging the output to `alloc`.
///
/// A failed argument aborts the whole call: nothing is returned and the
/// error channel is left describing the original failure.
pub fn string_format_in(
    template: &str,
    args: &[Value],
    alloc: &AllocHandle,
) -> Result<Text, EassError> {
    let template = Template::parse(template);
    let scratch = template.size_hint();

    let mut out = String::new();
    alloc
        .request(scratch)
        .map_err(|_| raise(EassError::out_of_memory("allocation failed in string_format")))?;
    if out.try_reserve_exact(scratch).is_err() {
        alloc.release(scratch);
        return Err(raise(EassError::out_of_memory(
            "allocation failed in string_format",
        )));
    }

    let written = template.write_to(&mut out, args);
    alloc.release(scratch);
    if let Err(e) = written {
        tracing::debug!(code = e.code(), message = e.message(), "string_format aborted");
        return Err(e);
    }
    out.shrink_to_fit();
    Text::adopt_in(out, alloc)
}

/// Format with literal arguments, converting each one with `Value::from`.
///
/// ```ignore
/// let text = eass_format!("{} and {}", 1, "x")?;
/// assert_eq!(text.as_str(), "1 and x");
/// ```
#[macro_export]
macro_rules! eass_format {
    ($template:expr $(, $arg:expr)* $(,)?) => {
        $crate::format::string_format($template, &[$($crate::value::Value::from($arg)),*])
    };
}
