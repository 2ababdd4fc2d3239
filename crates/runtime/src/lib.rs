//! Eass Runtime: the collaborator side of eass values
//!
//! Everything that touches the outside world lives here, on top of
//! `eass-core`:
//!
//! - `io`: console print, line input with conversion, hex/binary print
//! - `file`: whole-file read and write
//! - `time_ops`: wall and monotonic clocks
//! - `config`: environment-driven configuration (`EASS_*` variables)
//! - `report`: the at-exit memory report
//!
//! # Usage
//!
//! ```ignore
//! fn main() {
//!     let _report = RuntimeConfig::from_env().install();
//!     let age = input("Enter your age: ");
//!     eass_print!("You entered: {}", age).ok();
//! }
//! ```

pub use eass_core;

pub mod config;
pub mod file;
pub mod io;
pub mod report;
pub mod time_ops;

pub use config::{ReportGuard, RuntimeConfig};
pub use file::{read_file, read_file_text, write_file};
pub use io::{
    convert_line, hex_binary, input, input_from, print, print_to, print_value, printhd,
    printhd_to, read_value,
};
pub use report::{MemoryReport, ReportConfig, ReportDestination, ReportFormat};
pub use time_ops::{monotonic_seconds, time_in_seconds};
