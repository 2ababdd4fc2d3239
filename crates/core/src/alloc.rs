//! Allocator strategy
//!
//! Dynamic arrays and text payloads never talk to the global allocator
//! directly for bookkeeping: each one holds an [`AllocHandle`] and asks it
//! for permission (`request`) before reserving storage, then gives the same
//! byte count back (`release`) when the storage goes away.
//!
//! The real memory still comes from `Vec`/`String`, reserved with
//! `try_reserve_exact`, so a refusal from either side surfaces as
//! `OutOfMemory` instead of an abort.
//!
//! ```text
//!  DynamicArray::append ──request(n)──▶ Allocator ──▶ Ok / OutOfMemory
//!          │                                ▲
//!          └────── Drop ──release(n)────────┘
//! ```

use crate::error::{EassError, raise};
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

/// Pluggable allocation policy
pub trait Allocator: Send + Sync + fmt::Debug {
    /// Ask for `bytes` more bytes. Refusal is reported as `OutOfMemory`.
    fn request(&self, bytes: usize) -> Result<(), EassError>;

    /// Return `bytes` previously granted by `request`.
    fn release(&self, bytes: usize);
}

/// Shared handle to an allocator
pub type AllocHandle = Arc<dyn Allocator>;

/// Grants every request; the real allocator is the only limit.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl Allocator for SystemAllocator {
    #[inline]
    fn request(&self, _bytes: usize) -> Result<(), EassError> {
        Ok(())
    }

    #[inline]
    fn release(&self, _bytes: usize) {}
}

/// Shared system allocator handle
pub fn system() -> AllocHandle {
    static SYSTEM: OnceLock<AllocHandle> = OnceLock::new();
    SYSTEM.get_or_init(|| Arc::new(SystemAllocator)).clone()
}

fn default_slot() -> &'static RwLock<AllocHandle> {
    static DEFAULT: OnceLock<RwLock<AllocHandle>> = OnceLock::new();
    DEFAULT.get_or_init(|| RwLock::new(system()))
}

/// Allocator used by the convenience constructors
/// (`Value::from`, `DynamicArray::with_capacity`, `string_format`).
pub fn default_allocator() -> AllocHandle {
    match default_slot().read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Replace the process-wide default allocator, returning the previous one.
///
/// Objects already created keep the handle they were created with.
pub fn set_default_allocator(alloc: AllocHandle) -> AllocHandle {
    let mut guard = match default_slot().write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    std::mem::replace(&mut *guard, alloc)
}

/// Reserve room for `additional` elements in `vec`, charging `alloc`.
///
/// On refusal nothing is charged and `vec` is untouched.
pub(crate) fn reserve_vec<T>(
    alloc: &AllocHandle,
    vec: &mut Vec<T>,
    additional: usize,
    site: &str,
) -> Result<usize, EassError> {
    let bytes = additional.saturating_mul(std::mem::size_of::<T>());
    alloc
        .request(bytes)
        .map_err(|_| raise(EassError::out_of_memory(format!("allocation failed in {}", site))))?;
    if vec.try_reserve_exact(additional).is_err() {
        alloc.release(bytes);
        return Err(raise(EassError::out_of_memory(format!(
            "allocation failed in {}",
            site
        ))));
    }
    Ok(bytes)
}

/// Copy `text` into a fresh `String` charged to `alloc`.
pub(crate) fn copy_text(alloc: &AllocHandle, text: &str, site: &str) -> Result<String, EassError> {
    let mut buf = String::new();
    if text.is_empty() {
        return Ok(buf);
    }
    alloc
        .request(text.len())
        .map_err(|_| raise(EassError::out_of_memory(format!("allocation failed in {}", site))))?;
    if buf.try_reserve_exact(text.len()).is_err() {
        alloc.release(text.len());
        return Err(raise(EassError::out_of_memory(format!(
            "allocation failed in {}",
            site
        ))));
    }
    buf.push_str(text);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_stats::DebugAllocator;
    use serial_test::serial;

    #[test]
    fn test_system_always_grants() {
        let alloc = system();
        assert!(alloc.request(usize::MAX / 2).is_ok());
        alloc.release(usize::MAX / 2);
    }

    #[test]
    fn test_reserve_vec_charges_allocator() {
        let debug = Arc::new(DebugAllocator::new());
        let handle: AllocHandle = debug.clone();
        let mut v: Vec<u64> = Vec::new();
        let bytes = reserve_vec(&handle, &mut v, 4, "test").unwrap();
        assert_eq!(bytes, 32);
        assert!(v.capacity() >= 4);
        assert_eq!(debug.stats().outstanding(), 32);
    }

    #[test]
    fn test_reserve_vec_refused_leaves_vec_alone() {
        let debug = Arc::new(DebugAllocator::with_limit(8));
        let handle: AllocHandle = debug.clone();
        let mut v: Vec<u64> = Vec::new();
        let err = reserve_vec(&handle, &mut v, 4, "test").unwrap_err();
        assert_eq!(err.code(), libc::ENOMEM);
        assert_eq!(v.capacity(), 0);
        assert_eq!(debug.stats().outstanding(), 0);
    }

    #[test]
    fn test_copy_text_empty_is_free() {
        let debug = Arc::new(DebugAllocator::with_limit(0));
        let handle: AllocHandle = debug.clone();
        assert_eq!(copy_text(&handle, "", "test").unwrap(), "");
        assert!(copy_text(&handle, "x", "test").is_err());
    }

    #[test]
    #[serial]
    fn test_set_default_allocator_swaps() {
        let debug: AllocHandle = Arc::new(DebugAllocator::new());
        let previous = set_default_allocator(debug.clone());
        assert!(Arc::ptr_eq(&default_allocator(), &debug));
        set_default_allocator(previous);
        assert!(!Arc::ptr_eq(&default_allocator(), &debug));
    }
}
