//! Debug allocator and memory statistics
//!
//! [`DebugAllocator`] is the instrumented [`Allocator`]: it tallies every
//! grant and release with atomics, logs each one at `trace` level and can
//! enforce a byte budget for constrained targets. A [`MemoryStats`] snapshot
//! is what the at-exit report prints.
//!
//! # Performance
//!
//! - **Request/release**: a CAS loop on the outstanding counter (so the
//!   budget holds across threads) plus relaxed tallies, no locks
//! - **Snapshot**: reads each counter once, only when a report is produced

use crate::alloc::Allocator;
use crate::error::EassError;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counting allocator with an optional budget
#[derive(Debug, Default)]
pub struct DebugAllocator {
    allocations: AtomicU64,
    releases: AtomicU64,
    refused: AtomicU64,
    bytes_allocated: AtomicU64,
    bytes_released: AtomicU64,
    /// Granted and not yet released; the budget is checked against this
    outstanding: AtomicU64,
    peak_bytes: AtomicU64,
    /// Maximum outstanding bytes (None = unlimited)
    limit: Option<u64>,
}

impl DebugAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse any request that would push outstanding bytes past `limit`.
    pub fn with_limit(limit: u64) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            allocations: self.allocations.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            refused: self.refused.load(Ordering::Relaxed),
            bytes_allocated: self.bytes_allocated.load(Ordering::Relaxed),
            bytes_released: self.bytes_released.load(Ordering::Relaxed),
            peak_bytes: self.peak_bytes.load(Ordering::Relaxed),
        }
    }

    fn update_peak(&self, current: u64) {
        let mut peak = self.peak_bytes.load(Ordering::Relaxed);
        while current > peak {
            match self.peak_bytes.compare_exchange_weak(
                peak,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => peak = actual,
            }
        }
    }
}

impl Allocator for DebugAllocator {
    fn request(&self, bytes: usize) -> Result<(), EassError> {
        let bytes = bytes as u64;
        let mut outstanding = self.outstanding.load(Ordering::Relaxed);
        let now = loop {
            let wanted = outstanding.saturating_add(bytes);
            if let Some(limit) = self.limit.filter(|&l| wanted > l) {
                self.refused.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(bytes, outstanding, limit, "allocation refused");
                return Err(EassError::out_of_memory(format!(
                    "memory limit of {} bytes exceeded",
                    limit
                )));
            }
            match self.outstanding.compare_exchange_weak(
                outstanding,
                wanted,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break wanted,
                Err(actual) => outstanding = actual,
            }
        };

        self.allocations.fetch_add(1, Ordering::Relaxed);
        self.bytes_allocated.fetch_add(bytes, Ordering::Relaxed);
        self.update_peak(now);
        tracing::trace!(bytes, outstanding = now, "allocated");
        Ok(())
    }

    fn release(&self, bytes: usize) {
        let bytes = bytes as u64;
        self.releases.fetch_add(1, Ordering::Relaxed);
        self.bytes_released.fetch_add(bytes, Ordering::Relaxed);
        let previous = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(bytes))
            })
            .unwrap_or_default();
        tracing::trace!(bytes, outstanding = previous.saturating_sub(bytes), "released");
    }
}

/// Point-in-time allocator counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    pub allocations: u64,
    pub releases: u64,
    pub refused: u64,
    pub bytes_allocated: u64,
    pub bytes_released: u64,
    pub peak_bytes: u64,
}

impl MemoryStats {
    /// Bytes granted but never released
    pub fn outstanding(&self) -> u64 {
        self.bytes_allocated.saturating_sub(self.bytes_released)
    }

    pub fn has_leaks(&self) -> bool {
        self.outstanding() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tallies_requests_and_releases() {
        let alloc = DebugAllocator::new();
        alloc.request(100).unwrap();
        alloc.request(28).unwrap();
        alloc.release(100);

        let stats = alloc.stats();
        assert_eq!(stats.allocations, 2);
        assert_eq!(stats.releases, 1);
        assert_eq!(stats.bytes_allocated, 128);
        assert_eq!(stats.outstanding(), 28);
        assert_eq!(stats.peak_bytes, 128);
        assert!(stats.has_leaks());
    }

    #[test]
    fn test_limit_refuses_and_counts() {
        let alloc = DebugAllocator::with_limit(64);
        alloc.request(60).unwrap();
        let err = alloc.request(8).unwrap_err();
        assert_eq!(err.code(), libc::ENOMEM);
        alloc.release(60);
        alloc.request(64).unwrap();

        let stats = alloc.stats();
        assert_eq!(stats.refused, 1);
        assert_eq!(stats.allocations, 2);
        assert_eq!(stats.outstanding(), 64);
    }

    #[test]
    fn test_concurrent_requests_balance() {
        use std::sync::Arc;
        use std::thread;

        let alloc = Arc::new(DebugAllocator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let alloc = Arc::clone(&alloc);
                thread::spawn(move || {
                    for _ in 0..100 {
                        alloc.request(16).unwrap();
                        alloc.release(16);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let stats = alloc.stats();
        assert_eq!(stats.allocations, 400);
        assert_eq!(stats.releases, 400);
        assert!(!stats.has_leaks());
        assert!(stats.peak_bytes >= 16);
    }

    #[test]
    fn test_limit_holds_across_threads() {
        use std::sync::Arc;
        use std::thread;

        let alloc = Arc::new(DebugAllocator::with_limit(50));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let alloc = Arc::clone(&alloc);
                thread::spawn(move || {
                    for _ in 0..100 {
                        let _ = alloc.request(1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let stats = alloc.stats();
        assert_eq!(stats.allocations, 50);
        assert_eq!(stats.refused, 750);
        assert_eq!(stats.outstanding(), 50);
        assert_eq!(stats.peak_bytes, 50);
    }
}
