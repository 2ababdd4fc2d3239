//! Clock reads
//!
//! # Example: measuring execution time
//!
//! ```ignore
//! let start = monotonic_seconds();
//! do_work();
//! let elapsed = monotonic_seconds() - start;
//! print("Elapsed: {} s", &[Value::from(elapsed)])?;
//! ```

use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Wall clock: seconds since the Unix epoch.
///
/// Good for timestamps. For measuring durations, prefer
/// [`monotonic_seconds`], which never goes backwards.
pub fn time_in_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Seconds elapsed since the first call in this process.
///
/// Values start near zero for easier arithmetic.
pub fn monotonic_seconds() -> f64 {
    static BASE: OnceLock<Instant> = OnceLock::new();
    let base = BASE.get_or_init(Instant::now);
    base.elapsed().as_secs_f64()
}
