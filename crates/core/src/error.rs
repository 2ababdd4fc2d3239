//! Error Handling
//!
//! Every fallible operation in eass returns `Result<_, EassError>`. Before the
//! error is handed back it is also recorded in a thread-local *error channel*
//! so callers that only look at a `failed` flag (on a [`Value`] or
//! [`DynamicArray`]) can still find out what went wrong.
//!
//! # Usage
//!
//! ```ignore
//! let mut arr = DynamicArray::new();
//! if arr.remove(3).is_err() {
//!     let rec = last_error().unwrap();
//!     assert_eq!(rec.code, libc::EINVAL);
//! }
//! ```
//!
//! # Threads
//!
//! The channel is a `thread_local!`, so concurrent callers on different
//! threads never see each other's errors. Targets without thread-local
//! storage are not supported.
//!
//! [`Value`]: crate::value::Value
//! [`DynamicArray`]: crate::array::DynamicArray

use std::cell::RefCell;
use std::fmt;
use std::io;

/// Maximum bytes kept from an error message in the channel.
pub const MESSAGE_CAPACITY: usize = 255;

/// Failure taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The allocator refused a request
    OutOfMemory,
    /// Bad index or otherwise unusable argument
    InvalidArgument,
    /// A read/write collaborator failed
    IoFailure,
}

impl ErrorKind {
    /// errno-compatible default code for this kind
    pub fn default_code(self) -> i32 {
        match self {
            ErrorKind::OutOfMemory => libc::ENOMEM,
            ErrorKind::InvalidArgument => libc::EINVAL,
            ErrorKind::IoFailure => libc::EIO,
        }
    }

    /// Inverse of [`ErrorKind::default_code`]; unknown codes are I/O failures.
    pub fn from_code(code: i32) -> Self {
        match code {
            libc::ENOMEM => ErrorKind::OutOfMemory,
            libc::EINVAL => ErrorKind::InvalidArgument,
            _ => ErrorKind::IoFailure,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::OutOfMemory => write!(f, "out of memory"),
            ErrorKind::InvalidArgument => write!(f, "invalid argument"),
            ErrorKind::IoFailure => write!(f, "I/O failure"),
        }
    }
}

/// Error returned by every fallible eass operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EassError {
    kind: ErrorKind,
    code: i32,
    message: String,
}

impl EassError {
    pub fn new(kind: ErrorKind, code: i32, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
        }
    }

    pub fn out_of_memory(message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::OutOfMemory,
            ErrorKind::OutOfMemory.default_code(),
            message,
        )
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::InvalidArgument,
            ErrorKind::InvalidArgument.default_code(),
            message,
        )
    }

    pub fn io_failure(message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::IoFailure,
            ErrorKind::IoFailure.default_code(),
            message,
        )
    }

    /// I/O failure carrying the OS error code when there is one.
    pub fn io(err: &io::Error, context: &str) -> Self {
        let code = err
            .raw_os_error()
            .unwrap_or_else(|| ErrorKind::IoFailure.default_code());
        Self::new(ErrorKind::IoFailure, code, format!("{}: {}", context, err))
    }

    /// Rebuild an error from a channel record.
    pub fn from_record(record: &ErrorRecord) -> Self {
        Self::new(
            ErrorKind::from_code(record.code),
            record.code,
            record.message.clone(),
        )
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for EassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.kind, self.code, self.message)
    }
}

impl std::error::Error for EassError {}

/// Contents of the error channel: numeric code plus a short message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorRecord {
    pub code: i32,
    pub message: String,
}

impl ErrorRecord {
    /// `Error: <code> - <message>`, the text printed in place of a failed value
    pub fn describe(&self) -> String {
        format!("Error: {} - {}", self.code, self.message)
    }
}

thread_local! {
    /// Last error recorded on this thread
    static LAST_ERROR: RefCell<Option<ErrorRecord>> = const { RefCell::new(None) };
}

/// Record `code`/`message` as the last error on this thread
pub fn set_last_error(code: i32, message: &str) {
    let message = truncate(message, MESSAGE_CAPACITY).to_string();
    LAST_ERROR.with(|e| *e.borrow_mut() = Some(ErrorRecord { code, message }));
}

/// Record `err` in the channel and hand it back.
///
/// Failure sites write `return Err(raise(EassError::...))`.
pub fn raise(err: EassError) -> EassError {
    set_last_error(err.code, &err.message);
    err
}

/// Copy of the last error, if any
pub fn last_error() -> Option<ErrorRecord> {
    LAST_ERROR.with(|e| e.borrow().clone())
}

/// Borrowed access to the current slot without cloning the message
pub fn with_last_error<R>(f: impl FnOnce(Option<&ErrorRecord>) -> R) -> R {
    LAST_ERROR.with(|e| f(e.borrow().as_ref()))
}

/// Take (and clear) the last error
pub fn take_last_error() -> Option<ErrorRecord> {
    LAST_ERROR.with(|e| e.borrow_mut().take())
}

/// Check if an error has been recorded on this thread
pub fn has_error() -> bool {
    LAST_ERROR.with(|e| e.borrow().is_some())
}

/// Clear any recorded error
pub fn clear_last_error() {
    LAST_ERROR.with(|e| *e.borrow_mut() = None);
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raise_records_and_take_clears() {
        clear_last_error();
        assert!(!has_error());

        let err = raise(EassError::invalid_argument("index out of bounds"));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(has_error());

        let rec = take_last_error().unwrap();
        assert_eq!(rec.code, libc::EINVAL);
        assert_eq!(rec.message, "index out of bounds");
        assert!(!has_error());
    }

    #[test]
    fn test_channel_is_overwritten() {
        raise(EassError::invalid_argument("first"));
        raise(EassError::out_of_memory("second"));
        let rec = last_error().unwrap();
        assert_eq!(rec.code, libc::ENOMEM);
        assert_eq!(rec.message, "second");
        clear_last_error();
    }

    #[test]
    fn test_channel_is_per_thread() {
        raise(EassError::invalid_argument("main thread"));
        let other = std::thread::spawn(last_error).join().unwrap();
        assert!(other.is_none());
        assert_eq!(last_error().unwrap().message, "main thread");
        clear_last_error();
    }

    #[test]
    fn test_message_truncated_on_char_boundary() {
        let long = "é".repeat(200);
        set_last_error(1, &long);
        let len = with_last_error(|rec| rec.unwrap().message.len());
        assert!(len <= MESSAGE_CAPACITY);
        assert_eq!(len % 2, 0);
        clear_last_error();
    }

    #[test]
    fn test_io_error_keeps_os_code() {
        let io_err = io::Error::from_raw_os_error(libc::ENOENT);
        let err = EassError::io(&io_err, "read_file");
        assert_eq!(err.kind(), ErrorKind::IoFailure);
        assert_eq!(err.code(), libc::ENOENT);
        assert!(err.message().starts_with("read_file: "));
    }

    #[test]
    fn test_from_record_roundtrips_kind() {
        let rec = ErrorRecord {
            code: libc::ENOMEM,
            message: "grow".into(),
        };
        let err = EassError::from_record(&rec);
        assert_eq!(err.kind(), ErrorKind::OutOfMemory);
        assert_eq!(rec.describe(), format!("Error: {} - grow", libc::ENOMEM));
    }
}
