//! At-exit memory report
//!
//! Dumps the debug allocator's counters when the program finishes,
//! controlled by the `EASS_REPORT` env var:
//! - Unset or `0` → no report
//! - `1` → human-readable to stderr
//! - `json` → JSON to stderr
//! - `json:/path` → JSON to file
//!
//! ## Feature Flag
//!
//! JSON output requires the `report-json` feature (enabled by default).
//! Without it the human format is written instead.

use eass_core::{DebugAllocator, MemoryStats};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

// =============================================================================
// Report Configuration (parsed from EASS_REPORT)
// =============================================================================

/// Output format
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportFormat {
    Human,
    Json,
}

/// Output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportDestination {
    Stderr,
    File(PathBuf),
}

/// Parsed report configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportConfig {
    pub format: ReportFormat,
    pub destination: ReportDestination,
}

impl ReportConfig {
    /// Parse an `EASS_REPORT` value. Unrecognized values are ignored with a warning.
    pub fn parse(val: &str) -> Option<Self> {
        match val {
            "" | "0" => None,
            "1" => Some(ReportConfig {
                format: ReportFormat::Human,
                destination: ReportDestination::Stderr,
            }),
            "json" => Some(ReportConfig {
                format: ReportFormat::Json,
                destination: ReportDestination::Stderr,
            }),
            s if s.starts_with("json:") && s.len() > 5 => Some(ReportConfig {
                format: ReportFormat::Json,
                destination: ReportDestination::File(PathBuf::from(&s[5..])),
            }),
            _ => {
                tracing::warn!(value = val, "EASS_REPORT not recognized, ignoring");
                None
            }
        }
    }
}

// =============================================================================
// Report Data
// =============================================================================

/// What the report says
#[derive(Debug, Clone, Serialize)]
pub struct MemoryReport {
    pub wall_clock_ms: u64,
    #[serde(flatten)]
    pub stats: MemoryStats,
    pub outstanding_bytes: u64,
    pub limit_bytes: Option<u64>,
}

impl MemoryReport {
    pub fn collect(alloc: &DebugAllocator, elapsed: Duration) -> Self {
        let stats = alloc.stats();
        Self {
            wall_clock_ms: elapsed.as_millis() as u64,
            outstanding_bytes: stats.outstanding(),
            stats,
            limit_bytes: alloc.limit(),
        }
    }
}

// =============================================================================
// Formatting
// =============================================================================

pub fn format_human(data: &MemoryReport) -> String {
    let mut out = String::new();
    out.push_str("=== EASS MEMORY REPORT ===\n");
    out.push_str(&format!("Wall clock:      {} ms\n", data.wall_clock_ms));
    out.push_str(&format!("Allocations:     {}\n", data.stats.allocations));
    out.push_str(&format!("Releases:        {}\n", data.stats.releases));
    out.push_str(&format!("Refused:         {}\n", data.stats.refused));
    out.push_str(&format!(
        "Bytes allocated: {} bytes\n",
        data.stats.bytes_allocated
    ));
    out.push_str(&format!(
        "Bytes released:  {} bytes\n",
        data.stats.bytes_released
    ));
    out.push_str(&format!("Peak:            {} bytes\n", data.stats.peak_bytes));
    match data.limit_bytes {
        Some(limit) => out.push_str(&format!("Limit:           {} bytes\n", limit)),
        None => out.push_str("Limit:           none\n"),
    }
    if data.outstanding_bytes > 0 {
        out.push_str(&format!(
            "LEAKED:          {} bytes\n",
            data.outstanding_bytes
        ));
    } else {
        out.push_str("No leaks detected\n");
    }
    out.push_str("==========================\n");
    out
}

#[cfg(feature = "report-json")]
pub fn format_json(data: &MemoryReport) -> String {
    serde_json::to_string(data).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(not(feature = "report-json"))]
pub fn format_json(data: &MemoryReport) -> String {
    tracing::warn!("EASS_REPORT=json requires the 'report-json' feature, using human format");
    format_human(data)
}

pub fn render(config: &ReportConfig, data: &MemoryReport) -> String {
    match config.format {
        ReportFormat::Human => format_human(data),
        ReportFormat::Json => format_json(data),
    }
}

// =============================================================================
// Emit
// =============================================================================

/// Write the report where `config` says. Never fails: a report that cannot
/// be written to its file goes to stderr instead.
pub fn emit(config: &ReportConfig, data: &MemoryReport) {
    let output = render(config, data);

    match &config.destination {
        ReportDestination::Stderr => {
            let _ = std::io::stderr().write_all(output.as_bytes());
        }
        ReportDestination::File(path) => {
            if let Err(e) = std::fs::write(path, output.as_bytes()) {
                tracing::warn!(path = %path.display(), error = %e, "could not write report");
                let _ = std::io::stderr().write_all(output.as_bytes());
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
