//! Eass Core: dynamic runtime values for a small C-like scripting target
//!
//! This crate provides the value model and the pieces that only need memory
//! and the error channel. Console, files and clocks live in `eass-runtime`.
//!
//! Key design principles:
//! - Value: a tagged datum (Int, Float, Text, Array, Null) plus a failed flag
//! - DynamicArray: ordered, growable collection of Values with sticky failure
//! - Errors: every fallible call returns `Result` and also records the last
//!   error in a per-thread channel that callers may inspect later
//!
//! # Modules
//!
//! - `error`: Error kinds, `EassError` and the thread-local error channel
//! - `alloc`: The allocator strategy every charged buffer goes through
//! - `memory_stats`: Counting allocator with an optional byte budget
//! - `value`: Value, Payload, Text and numeric literal dispatch
//! - `array`: DynamicArray and its growth policies
//! - `render`: Textual form of a Value
//! - `format`: `{}` / `{N}` template formatting

pub mod alloc;
pub mod array;
pub mod error;
pub mod format;
pub mod memory_stats;
pub mod render;
pub mod value;

pub use alloc::{AllocHandle, Allocator, SystemAllocator, default_allocator, set_default_allocator};
pub use array::{DynamicArray, MIN_GROWTH_CAPACITY, Rejected};
pub use format::{Segment, Template, string_format, string_format_in};
pub use memory_stats::{DebugAllocator, MemoryStats};
pub use render::{render, render_into};
pub use value::{Kind, NumLit, Payload, Text, Value, numlit};

// Error handling
pub use error::{
    EassError, ErrorKind, ErrorRecord, clear_last_error, has_error, last_error, raise,
    set_last_error, take_last_error, with_last_error,
};
