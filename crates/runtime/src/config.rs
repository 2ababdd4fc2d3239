//! Environment-driven configuration
//!
//! | variable            | effect                                           |
//! |---------------------|--------------------------------------------------|
//! | `EASS_DEBUG_MEMORY` | `1`/`true`: install a counting debug allocator   |
//! | `EASS_MEMORY_LIMIT` | byte budget for that allocator (implies debug)   |
//! | `EASS_REPORT`       | at-exit memory report, see [`crate::report`]     |
//!
//! Configuration is parsed once into a [`RuntimeConfig`]. [`RuntimeConfig::install`]
//! applies it and returns a [`ReportGuard`]; the report is written when the
//! guard is dropped, so keep it alive for the whole of `main`.

use crate::report::{self, MemoryReport, ReportConfig};
use eass_core::DebugAllocator;
use eass_core::alloc::{AllocHandle, set_default_allocator};
use std::sync::Arc;
use std::time::Instant;

pub const DEBUG_MEMORY_VAR: &str = "EASS_DEBUG_MEMORY";
pub const MEMORY_LIMIT_VAR: &str = "EASS_MEMORY_LIMIT";
pub const REPORT_VAR: &str = "EASS_REPORT";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub debug_memory: bool,
    /// Maximum outstanding bytes (None = unlimited)
    pub memory_limit: Option<u64>,
    pub report: Option<ReportConfig>,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self::parse(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unreadable values are ignored with a warning.
    pub fn parse(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let debug_memory = match lookup(DEBUG_MEMORY_VAR).as_deref() {
            None | Some("") | Some("0") => false,
            Some(v) if v == "1" || v.eq_ignore_ascii_case("true") => true,
            Some(v) if v.eq_ignore_ascii_case("false") => false,
            Some(v) => {
                tracing::warn!(value = v, "{} not recognized, ignoring", DEBUG_MEMORY_VAR);
                false
            }
        };

        let memory_limit = lookup(MEMORY_LIMIT_VAR).and_then(|v| match v.trim().parse::<u64>() {
            Ok(limit) => Some(limit),
            Err(_) => {
                tracing::warn!(value = %v, "{} is not a byte count, ignoring", MEMORY_LIMIT_VAR);
                None
            }
        });

        let report = lookup(REPORT_VAR).and_then(|v| ReportConfig::parse(&v));

        Self {
            debug_memory,
            memory_limit,
            report,
        }
    }

    /// A limit or a report needs the counting allocator too.
    pub fn wants_debug_allocator(&self) -> bool {
        self.debug_memory || self.memory_limit.is_some() || self.report.is_some()
    }

    /// Apply the configuration to the process.
    ///
    /// When a debug allocator is wanted it becomes the default allocator until
    /// the returned guard is dropped.
    pub fn install(&self) -> ReportGuard {
        if !self.wants_debug_allocator() {
            return ReportGuard::inactive();
        }

        let debug = Arc::new(match self.memory_limit {
            Some(limit) => DebugAllocator::with_limit(limit),
            None => DebugAllocator::new(),
        });
        let previous = set_default_allocator(debug.clone());
        tracing::debug!(limit = ?self.memory_limit, "debug allocator installed");

        ReportGuard {
            debug: Some(debug),
            previous: Some(previous),
            report: self.report.clone(),
            started: Instant::now(),
        }
    }
}

/// Emits the memory report (if configured) and restores the previous default
/// allocator when dropped.
#[derive(Debug)]
pub struct ReportGuard {
    debug: Option<Arc<DebugAllocator>>,
    previous: Option<AllocHandle>,
    report: Option<ReportConfig>,
    started: Instant,
}

impl ReportGuard {
    fn inactive() -> Self {
        Self {
            debug: None,
            previous: None,
            report: None,
            started: Instant::now(),
        }
    }

    /// The installed debug allocator, if any
    pub fn allocator(&self) -> Option<&Arc<DebugAllocator>> {
        self.debug.as_ref()
    }

    /// Counters gathered so far, without emitting anything
    pub fn snapshot(&self) -> Option<MemoryReport> {
        self.debug
            .as_ref()
            .map(|debug| MemoryReport::collect(debug, self.started.elapsed()))
    }
}

impl Drop for ReportGuard {
    fn drop(&mut self) {
        if let (Some(config), Some(data)) = (&self.report, self.snapshot()) {
            report::emit(config, &data);
        }
        if let Some(previous) = self.previous.take() {
            set_default_allocator(previous);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{ReportDestination, ReportFormat};
    use std::collections::HashMap;

    fn parse(vars: &[(&str, &str)]) -> RuntimeConfig {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RuntimeConfig::parse(|key| map.get(key).cloned())
    }

    #[test]
    fn test_empty_environment() {
        let config = parse(&[]);
        assert_eq!(config, RuntimeConfig::default());
        assert!(!config.wants_debug_allocator());
    }

    #[test]
    fn test_debug_memory_values() {
        assert!(parse(&[(DEBUG_MEMORY_VAR, "1")]).debug_memory);
        assert!(parse(&[(DEBUG_MEMORY_VAR, "TRUE")]).debug_memory);
        assert!(!parse(&[(DEBUG_MEMORY_VAR, "0")]).debug_memory);
        assert!(!parse(&[(DEBUG_MEMORY_VAR, "maybe")]).debug_memory);
    }

    #[test]
    fn test_memory_limit() {
        let config = parse(&[(MEMORY_LIMIT_VAR, " 4096 ")]);
        assert_eq!(config.memory_limit, Some(4096));
        assert!(config.wants_debug_allocator());
        assert_eq!(parse(&[(MEMORY_LIMIT_VAR, "lots")]).memory_limit, None);
    }

    #[test]
    fn test_report_variable() {
        let config = parse(&[(REPORT_VAR, "json:/tmp/eass.json")]);
        let report = config.report.unwrap();
        assert_eq!(report.format, ReportFormat::Json);
        assert_eq!(
            report.destination,
            ReportDestination::File("/tmp/eass.json".into())
        );
    }
}
