//! File read/write
//!
//! Whole-file helpers. Failures carry the OS error code and are recorded in
//! the error channel.
//!
//! # Example
//!
//! ```ignore
//! write_file("output.txt", b"This is some text to write to the file.")?;
//! let content = read_file_text("output.txt")?;
//! ```

use eass_core::error::{EassError, raise};
use std::fs;
use std::path::Path;

/// Entire contents of `path`
pub fn read_file(path: impl AsRef<Path>) -> Result<Vec<u8>, EassError> {
    let path = path.as_ref();
    fs::read(path).map_err(|e| {
        tracing::debug!(path = %path.display(), error = %e, "read_file failed");
        raise(EassError::io(&e, "read failed in read_file"))
    })
}

/// Entire contents of `path` as text; invalid UTF-8 is replaced.
pub fn read_file_text(path: impl AsRef<Path>) -> Result<String, EassError> {
    let bytes = read_file(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

/// Create or truncate `path` and write `content` to it.
pub fn write_file(path: impl AsRef<Path>, content: impl AsRef<[u8]>) -> Result<(), EassError> {
    let path = path.as_ref();
    fs::write(path, content).map_err(|e| {
        tracing::debug!(path = %path.display(), error = %e, "write_file failed");
        raise(EassError::io(&e, "write failed in write_file"))
    })
}
