//! DynamicArray - owning, growable sequence of Values
//!
//! Capacity is tracked explicitly and charged to the array's allocator in
//! bytes (`capacity * size_of::<Value>()`), so a budgeted allocator sees
//! exactly what the array holds on to.
//!
//! # Growth
//!
//! - `append`: `capacity + capacity / 2`, at least 4
//! - `insert`: `capacity * 2`, at least 4
//!
//! # Sticky failure
//!
//! Once a growth request is refused the array is marked failed. Every later
//! mutation is refused with the same error and the contents stay as they were
//! before the failure. Reads keep working.

use crate::alloc::{AllocHandle, default_allocator, reserve_vec};
use crate::error::{EassError, raise};
use crate::value::Value;
use std::fmt;
use std::mem::size_of;

/// Smallest capacity after any growth
pub const MIN_GROWTH_CAPACITY: usize = 4;

/// Owning, contiguous, growable array of [`Value`]s
pub struct DynamicArray {
    items: Vec<Value>,
    /// Logical capacity; what has been charged to `alloc`
    capacity: usize,
    failure: Option<EassError>,
    alloc: AllocHandle,
}

/// A value handed back by a refused `append`/`insert`.
///
/// The caller still owns `value`.
#[derive(Debug)]
pub struct Rejected {
    pub error: EassError,
    pub value: Value,
}

impl Rejected {
    pub fn into_value(self) -> Value {
        self.value
    }
}

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "value rejected: {}", self.error)
    }
}

impl std::error::Error for Rejected {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<Rejected> for EassError {
    fn from(r: Rejected) -> Self {
        r.error
    }
}

impl DynamicArray {
    /// Empty array with no storage, on the default allocator
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Array with room for `capacity` values, on the default allocator.
    ///
    /// If the allocation is refused the array comes back failed and empty;
    /// check [`DynamicArray::is_failed`].
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_in(capacity, default_allocator())
    }

    pub fn with_capacity_in(capacity: usize, alloc: AllocHandle) -> Self {
        let mut arr = Self {
            items: Vec::new(),
            capacity: 0,
            failure: None,
            alloc,
        };
        if capacity > 0 {
            match reserve_vec(&arr.alloc, &mut arr.items, capacity, "array") {
                Ok(_) => arr.capacity = capacity,
                Err(e) => arr.failure = Some(e),
            }
        }
        arr
    }

    /// Like [`DynamicArray::with_capacity_in`], but refusal is an `Err`.
    pub fn try_with_capacity_in(capacity: usize, alloc: AllocHandle) -> Result<Self, EassError> {
        let arr = Self::with_capacity_in(capacity, alloc);
        match &arr.failure {
            Some(e) => Err(e.clone()),
            None => Ok(arr),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// The error that made this array failed
    pub fn failure(&self) -> Option<&EassError> {
        self.failure.as_ref()
    }

    pub fn allocator(&self) -> &AllocHandle {
        &self.alloc
    }

    /// Append `value`, growing by 1.5x when full.
    pub fn append(&mut self, value: Value) -> Result<(), Rejected> {
        if let Some(error) = &self.failure {
            return Err(Rejected {
                error: error.clone(),
                value,
            });
        }
        if self.items.len() == self.capacity {
            let new_capacity = (self.capacity + (self.capacity >> 1)).max(MIN_GROWTH_CAPACITY);
            if let Err(error) = self.grow_to(new_capacity, "array_append") {
                return Err(Rejected { error, value });
            }
        }
        self.items.push(value);
        Ok(())
    }

    /// Insert `value` at `index` (`0..=len`), shifting later values right.
    pub fn insert(&mut self, index: usize, value: Value) -> Result<(), Rejected> {
        if let Some(error) = &self.failure {
            return Err(Rejected {
                error: error.clone(),
                value,
            });
        }
        if index > self.items.len() {
            let error = raise(EassError::invalid_argument(format!(
                "index {} out of bounds in array_insert (len {})",
                index,
                self.items.len()
            )));
            return Err(Rejected { error, value });
        }
        if self.items.len() == self.capacity {
            let new_capacity = (self.capacity * 2).max(MIN_GROWTH_CAPACITY);
            if let Err(error) = self.grow_to(new_capacity, "array_insert") {
                return Err(Rejected { error, value });
            }
        }
        self.items.insert(index, value);
        Ok(())
    }

    /// Remove and return the value at `index`, shifting later values left.
    pub fn remove(&mut self, index: usize) -> Result<Value, EassError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        self.check_index(index, "array_remove")?;
        Ok(self.items.remove(index))
    }

    /// Borrow the value at `index`.
    ///
    /// The view lives as long as the borrow of the array; take ownership with
    /// `remove` or `Value::try_clone`. Reads still work once the array has
    /// failed: only mutation is refused, so a failed array's contents can be
    /// inspected and released.
    pub fn get(&self, index: usize) -> Result<&Value, EassError> {
        self.check_index(index, "array_get")?;
        Ok(&self.items[index])
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut Value, EassError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        self.check_index(index, "array_get")?;
        Ok(&mut self.items[index])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.items
    }

    /// Release every contained value (recursively) and the storage.
    ///
    /// Safe to call more than once; the array is left empty with capacity 0.
    /// The failed flag is kept.
    pub fn release(&mut self) {
        self.items = Vec::new();
        if self.capacity > 0 {
            self.alloc.release(self.capacity * size_of::<Value>());
            self.capacity = 0;
        }
    }

    /// Deep copy on the same allocator
    pub fn try_clone(&self) -> Result<Self, EassError> {
        let mut copy = Self::try_with_capacity_in(self.items.len(), self.alloc.clone())?;
        for value in &self.items {
            copy.append(value.try_clone()?)?;
        }
        copy.failure = self.failure.clone();
        Ok(copy)
    }

    fn check_index(&self, index: usize, site: &str) -> Result<(), EassError> {
        if index >= self.items.len() {
            return Err(raise(EassError::invalid_argument(format!(
                "index {} out of bounds in {} (len {})",
                index,
                site,
                self.items.len()
            ))));
        }
        Ok(())
    }

    /// Grow storage to `new_capacity`; marks the array failed on refusal.
    #[cold]
    fn grow_to(&mut self, new_capacity: usize, site: &str) -> Result<(), EassError> {
        let charge = (new_capacity - self.capacity) * size_of::<Value>();
        let granted = self.alloc.request(charge).is_ok();
        let reserved = granted
            && self
                .items
                .try_reserve_exact(new_capacity - self.items.len())
                .is_ok();
        if !reserved {
            if granted {
                self.alloc.release(charge);
            }
            let error = raise(EassError::out_of_memory(format!(
                "allocation failed in {}",
                site
            )));
            self.failure = Some(error.clone());
            return Err(error);
        }
        tracing::debug!(from = self.capacity, to = new_capacity, site, "array grown");
        self.capacity = new_capacity;
        Ok(())
    }
}

impl Default for DynamicArray {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DynamicArray {
    fn drop(&mut self) {
        self.release();
    }
}

impl PartialEq for DynamicArray {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl fmt::Debug for DynamicArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicArray")
            .field("items", &self.items)
            .field("capacity", &self.capacity)
            .field("failure", &self.failure)
            .finish()
    }
}

impl<'a> IntoIterator for &'a DynamicArray {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, last_error};
    use crate::memory_stats::DebugAllocator;
    use crate::value::Kind;
    use std::sync::Arc;

    fn debug_array(capacity: usize) -> (Arc<DebugAllocator>, DynamicArray) {
        let debug = Arc::new(DebugAllocator::new());
        let arr = DynamicArray::with_capacity_in(capacity, debug.clone());
        (debug, arr)
    }

    #[test]
    fn test_zero_capacity_allocates_nothing() {
        let (debug, arr) = debug_array(0);
        assert_eq!(arr.capacity(), 0);
        assert!(!arr.is_failed());
        assert_eq!(debug.stats().allocations, 0);
    }

    #[test]
    fn test_append_growth_sequence() {
        let (_debug, mut arr) = debug_array(0);
        let mut seen = Vec::new();
        for i in 0..20 {
            arr.append(Value::int(i)).unwrap();
            if seen.last() != Some(&arr.capacity()) {
                seen.push(arr.capacity());
            }
        }
        assert_eq!(seen, vec![4, 6, 9, 13, 19, 28]);
        assert_eq!(arr.len(), 20);
    }

    #[test]
    fn test_insert_doubles() {
        let (_debug, mut arr) = debug_array(0);
        for i in 0..5 {
            arr.insert(0, Value::int(i)).unwrap();
        }
        assert_eq!(arr.capacity(), 8);
        let order: Vec<i32> = arr.iter().filter_map(Value::as_int).collect();
        assert_eq!(order, vec![4, 3, 2, 1, 0]);
    }

    #[test]
    fn test_insert_middle_without_growth() {
        let (_debug, mut arr) = debug_array(8);
        for i in [1, 2, 4] {
            arr.append(Value::int(i)).unwrap();
        }
        arr.insert(2, Value::int(3)).unwrap();
        arr.insert(4, Value::int(5)).unwrap();
        let order: Vec<i32> = arr.iter().filter_map(Value::as_int).collect();
        assert_eq!(order, vec![1, 2, 3, 4, 5]);
        assert_eq!(arr.capacity(), 8);
    }

    #[test]
    fn test_insert_out_of_bounds_returns_value() {
        let (_debug, mut arr) = debug_array(0);
        arr.append(Value::int(1)).unwrap();
        let rejected = arr.insert(3, Value::text("keep")).unwrap_err();
        assert_eq!(rejected.error.kind(), ErrorKind::InvalidArgument);
        assert_eq!(rejected.into_value().as_text(), Some("keep"));
        assert_eq!(arr.len(), 1);
        assert!(!arr.is_failed());
        assert_eq!(last_error().unwrap().code, libc::EINVAL);
    }

    #[test]
    fn test_get_and_remove_bounds() {
        let (_debug, mut arr) = debug_array(0);
        arr.append(Value::int(10)).unwrap();
        arr.append(Value::text("x")).unwrap();

        assert_eq!(arr.get(1).unwrap().as_text(), Some("x"));
        assert_eq!(arr.get(2).unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(arr.remove(5).unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(arr.len(), 2);

        let removed = arr.remove(0).unwrap();
        assert_eq!(removed.as_int(), Some(10));
        assert_eq!(arr.len(), 1);
        assert_eq!(arr.get(0).unwrap().as_text(), Some("x"));
    }

    #[test]
    fn test_get_mut_edits_in_place() {
        let (_debug, mut arr) = debug_array(0);
        arr.append(Value::int(1)).unwrap();
        *arr.get_mut(0).unwrap() = Value::float(1.5);
        assert_eq!(arr.get(0).unwrap().kind(), Kind::Float);
    }

    #[test]
    fn test_create_refused_gives_failed_array() {
        let alloc = Arc::new(DebugAllocator::with_limit(8));
        let arr = DynamicArray::with_capacity_in(16, alloc.clone());
        assert!(arr.is_failed());
        assert_eq!(arr.capacity(), 0);
        assert_eq!(arr.failure().unwrap().kind(), ErrorKind::OutOfMemory);
        assert!(DynamicArray::try_with_capacity_in(16, alloc).is_err());
    }

    #[test]
    fn test_growth_refused_is_sticky() {
        let limit = (4 * size_of::<Value>()) as u64;
        let alloc = Arc::new(DebugAllocator::with_limit(limit));
        let mut arr = DynamicArray::with_capacity_in(0, alloc.clone());
        for i in 0..4 {
            arr.append(Value::int(i)).unwrap();
        }

        let rejected = arr.append(Value::int(4)).unwrap_err();
        assert_eq!(rejected.error.kind(), ErrorKind::OutOfMemory);
        assert_eq!(rejected.value.as_int(), Some(4));
        assert!(arr.is_failed());
        assert_eq!(arr.len(), 4);
        assert_eq!(arr.capacity(), 4);

        // Further mutation is refused with the same failure, reads still work.
        let again = arr.insert(0, Value::int(9)).unwrap_err();
        assert_eq!(again.error, rejected.error);
        assert!(arr.remove(0).is_err());
        assert_eq!(arr.len(), 4);
        assert_eq!(arr.iter().count(), 4);
        assert_eq!(arr.get(3).unwrap().as_int(), Some(3));
    }

    #[test]
    fn test_release_returns_every_byte() {
        let (debug, mut arr) = debug_array(2);
        arr.append(Value::text_in("abc", &(debug.clone() as AllocHandle)).unwrap())
            .unwrap();

        let mut inner = DynamicArray::with_capacity_in(0, debug.clone());
        inner
            .append(Value::text_in("nested", &(debug.clone() as AllocHandle)).unwrap())
            .unwrap();
        arr.append(Value::array(inner)).unwrap();
        arr.append(Value::int(3)).unwrap();
        assert!(debug.stats().has_leaks());

        arr.release();
        assert_eq!(arr.len(), 0);
        assert_eq!(arr.capacity(), 0);
        arr.release();
        drop(arr);

        assert!(!debug.stats().has_leaks());
    }

    #[test]
    fn test_try_clone_deep() {
        let (debug, mut arr) = debug_array(0);
        arr.append(Value::int(1)).unwrap();
        arr.append(Value::text_in("two", &(debug.clone() as AllocHandle)).unwrap())
            .unwrap();
        let copy = arr.try_clone().unwrap();
        assert_eq!(copy, arr);
        drop(arr);
        assert_eq!(copy.get(1).unwrap().as_text(), Some("two"));
        drop(copy);
        assert!(!debug.stats().has_leaks());
    }
}
