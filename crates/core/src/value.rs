use crate::alloc::{AllocHandle, copy_text, default_allocator, system};
use crate::array::DynamicArray;
use crate::error::{EassError, raise};

/// Which payload a [`Value`] carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Int,
    Float,
    Text,
    Array,
    Null,
}

/// Payload of a [`Value`]
///
/// The variant is the discriminant: only the active payload can be reached.
#[derive(Debug, PartialEq)]
pub enum Payload {
    /// 32-bit signed integer
    Int(i32),

    /// 32-bit float
    Float(f32),

    /// Owned text, charged to the allocator it was created with
    Text(Text),

    /// Owned nested array
    Array(DynamicArray),

    /// No payload
    Null,
}

/// Value: the dynamic datum everything else talks about
///
/// A `Value` is either healthy or *failed*. A failed value is what a fallible
/// operation hands back when it cannot produce a real one (for instance an
/// out-of-range `remove`, or a line read that hit end of input). Its payload
/// is meaningless, so the typed accessors return `None`; it is still safe to
/// drop or release.
#[derive(Debug, PartialEq)]
pub struct Value {
    payload: Payload,
    failed: bool,
}

impl Value {
    #[inline]
    pub fn int(v: i32) -> Self {
        Self::from_payload(Payload::Int(v))
    }

    #[inline]
    pub fn float(v: f32) -> Self {
        Self::from_payload(Payload::Float(v))
    }

    #[inline]
    pub fn null() -> Self {
        Self::from_payload(Payload::Null)
    }

    /// Text charged to the default allocator.
    ///
    /// A refused allocation yields a failed Text value (the error channel says why).
    pub fn text(s: &str) -> Self {
        Self::text_in(s, &default_allocator()).unwrap_or_else(|_| Self::failed_text())
    }

    /// Text charged to `alloc`
    pub fn text_in(s: &str, alloc: &AllocHandle) -> Result<Self, EassError> {
        Ok(Self::from_payload(Payload::Text(Text::new_in(s, alloc)?)))
    }

    pub fn array(arr: DynamicArray) -> Self {
        Self::from_payload(Payload::Array(arr))
    }

    /// Failed value of kind `Null`, returned by rejected array accessors
    pub fn failed_null() -> Self {
        Self {
            payload: Payload::Null,
            failed: true,
        }
    }

    /// Failed value of kind `Text` with an empty payload, returned by input on read failure
    pub fn failed_text() -> Self {
        Self {
            payload: Payload::Text(Text::empty()),
            failed: true,
        }
    }

    #[inline]
    fn from_payload(payload: Payload) -> Self {
        Self {
            payload,
            failed: false,
        }
    }

    pub fn kind(&self) -> Kind {
        match self.payload {
            Payload::Int(_) => Kind::Int,
            Payload::Float(_) => Kind::Float,
            Payload::Text(_) => Kind::Text,
            Payload::Array(_) => Kind::Array,
            Payload::Null => Kind::Null,
        }
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// The payload, or `None` for a failed value
    pub fn payload(&self) -> Option<&Payload> {
        if self.failed {
            None
        } else {
            Some(&self.payload)
        }
    }

    pub fn payload_mut(&mut self) -> Option<&mut Payload> {
        if self.failed {
            None
        } else {
            Some(&mut self.payload)
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self.payload() {
            Some(Payload::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self.payload() {
            Some(Payload::Float(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self.payload() {
            Some(Payload::Text(t)) => Some(t.as_str()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&DynamicArray> {
        match self.payload() {
            Some(Payload::Array(a)) => Some(a),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut DynamicArray> {
        match self.payload_mut() {
            Some(Payload::Array(a)) => Some(a),
            _ => None,
        }
    }

    /// Consume the value, yielding its array payload
    pub fn into_array(self) -> Option<DynamicArray> {
        match self.payload {
            Payload::Array(a) if !self.failed => Some(a),
            _ => None,
        }
    }

    /// Release the payload now and turn the value into `Null`.
    ///
    /// Calling it again (or dropping afterwards) does nothing more.
    pub fn release(&mut self) {
        self.payload = Payload::Null;
    }

    /// Deep copy, charging text and array storage to the original allocators
    pub fn try_clone(&self) -> Result<Self, EassError> {
        let payload = match &self.payload {
            Payload::Int(v) => Payload::Int(*v),
            Payload::Float(v) => Payload::Float(*v),
            Payload::Text(t) => Payload::Text(t.try_clone()?),
            Payload::Array(a) => Payload::Array(a.try_clone()?),
            Payload::Null => Payload::Null,
        };
        Ok(Self {
            payload,
            failed: self.failed,
        })
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::null()
    }
}

/// Owned text buffer charged to an allocator
#[derive(Debug)]
pub struct Text {
    buf: String,
    charged: usize,
    alloc: AllocHandle,
}

impl Text {
    /// Copy `s` into storage granted by `alloc`
    pub fn new_in(s: &str, alloc: &AllocHandle) -> Result<Self, EassError> {
        let buf = copy_text(alloc, s, "text")?;
        Ok(Self {
            charged: buf.len(),
            buf,
            alloc: alloc.clone(),
        })
    }

    /// Take over an existing `String`, charging its whole capacity to `alloc`
    pub fn adopt_in(buf: String, alloc: &AllocHandle) -> Result<Self, EassError> {
        let charged = buf.capacity();
        if charged > 0 {
            alloc
                .request(charged)
                .map_err(|e| raise(EassError::out_of_memory(e.message().to_string())))?;
        }
        Ok(Self {
            charged,
            buf,
            alloc: alloc.clone(),
        })
    }

    /// Empty text; costs nothing
    pub fn empty() -> Self {
        Self {
            buf: String::new(),
            charged: 0,
            alloc: system(),
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Bytes charged to the allocator for this text
    pub fn charged(&self) -> usize {
        self.charged
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn try_clone(&self) -> Result<Self, EassError> {
        Self::new_in(&self.buf, &self.alloc)
    }

    /// Give the charge back to the allocator and keep the plain `String`
    pub fn into_string(mut self) -> String {
        let buf = std::mem::take(&mut self.buf);
        if self.charged > 0 {
            self.alloc.release(self.charged);
            self.charged = 0;
        }
        buf
    }
}

impl std::ops::Deref for Text {
    type Target = str;

    fn deref(&self) -> &str {
        &self.buf
    }
}

impl std::fmt::Display for Text {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.buf)
    }
}

impl PartialEq for Text {
    fn eq(&self, other: &Self) -> bool {
        self.buf == other.buf
    }
}

impl Drop for Text {
    fn drop(&mut self) {
        if self.charged > 0 {
            self.alloc.release(self.charged);
            self.charged = 0;
        }
    }
}

/// Static dispatch from a numeric literal to a `Value`
///
/// The *declared* type of the argument decides the kind: every integral type
/// becomes `Int` (truncated to 32 bits like a C `(int)` cast), every floating
/// type becomes `Float`. `3.0_f64` is therefore `Float`, never `Int`.
pub trait NumLit: Copy {
    fn numlit(self) -> Value;
}

macro_rules! int_numlit {
    ($($t:ty),*) => {
        $(
            impl NumLit for $t {
                #[inline]
                fn numlit(self) -> Value {
                    Value::int(self as i32)
                }
            }
        )*
    };
}

macro_rules! float_numlit {
    ($($t:ty),*) => {
        $(
            impl NumLit for $t {
                #[inline]
                fn numlit(self) -> Value {
                    Value::float(self as f32)
                }
            }
        )*
    };
}

int_numlit!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
float_numlit!(f32, f64);

/// Wrap a numeric literal, picking `Int` or `Float` from its static type
#[inline]
pub fn numlit<N: NumLit>(n: N) -> Value {
    n.numlit()
}

macro_rules! from_lossless_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                #[inline]
                fn from(v: $t) -> Self {
                    Value::int(i32::from(v))
                }
            }
        )*
    };
}

from_lossless_int!(i8, i16, i32, u8, u16);

impl From<f32> for Value {
    #[inline]
    fn from(v: f32) -> Self {
        Value::float(v)
    }
}

impl From<f64> for Value {
    #[inline]
    fn from(v: f64) -> Self {
        Value::float(v as f32)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::text(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        match Text::adopt_in(s, &default_allocator()) {
            Ok(t) => Value::from_payload(Payload::Text(t)),
            Err(_) => Value::failed_text(),
        }
    }
}

impl From<Text> for Value {
    fn from(t: Text) -> Self {
        Value::from_payload(Payload::Text(t))
    }
}

impl From<DynamicArray> for Value {
    fn from(arr: DynamicArray) -> Self {
        Value::array(arr)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::null()
    }
}

/// A failed lookup becomes a failed `Null`, so results can be handed straight
/// to the formatter.
impl From<Result<Value, EassError>> for Value {
    fn from(result: Result<Value, EassError>) -> Self {
        result.unwrap_or_else(|_| Value::failed_null())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_stats::DebugAllocator;
    use std::sync::Arc;

    #[test]
    fn test_numlit_dispatches_on_static_type() {
        assert_eq!(numlit(10).kind(), Kind::Int);
        assert_eq!(numlit(0x1A_u8).as_int(), Some(26));
        assert_eq!(numlit(3.14_f32).kind(), Kind::Float);

        let whole: f64 = 3.0;
        let v = numlit(whole);
        assert_eq!(v.kind(), Kind::Float);
        assert_eq!(v.as_float(), Some(3.0));
    }

    #[test]
    fn test_numlit_truncates_wide_ints() {
        assert_eq!(numlit(u32::MAX).as_int(), Some(-1));
        assert_eq!(numlit(1_i64 << 32).as_int(), Some(0));
    }

    #[test]
    fn test_from_impls() {
        assert_eq!(Value::from(7_i16).as_int(), Some(7));
        assert_eq!(Value::from(2.5_f64).as_float(), Some(2.5));
        assert_eq!(Value::from("hi").as_text(), Some("hi"));
        assert_eq!(Value::from(String::from("owned")).as_text(), Some("owned"));
        assert_eq!(Value::from(()).kind(), Kind::Null);
    }

    #[test]
    fn test_failed_value_hides_payload() {
        let v = Value::failed_text();
        assert!(v.is_failed());
        assert_eq!(v.kind(), Kind::Text);
        assert!(v.payload().is_none());
        assert!(v.as_text().is_none());

        let v: Value = Err(EassError::invalid_argument("nope")).into();
        assert!(v.is_failed());
        assert_eq!(v.kind(), Kind::Null);
    }

    #[test]
    fn test_release_is_idempotent() {
        let debug = Arc::new(DebugAllocator::new());
        let handle: AllocHandle = debug.clone();

        let mut v = Value::text_in("hello", &handle).unwrap();
        assert_eq!(debug.stats().outstanding(), 5);

        v.release();
        assert_eq!(v.kind(), Kind::Null);
        v.release();
        drop(v);

        let stats = debug.stats();
        assert_eq!(stats.releases, 1);
        assert!(!stats.has_leaks());
    }

    #[test]
    fn test_release_failed_value_is_safe() {
        let mut v = Value::failed_null();
        v.release();
        v.release();
        assert!(v.is_failed());
    }

    #[test]
    fn test_text_refused_by_allocator() {
        let handle: AllocHandle = Arc::new(DebugAllocator::with_limit(2));
        let err = Value::text_in("too long", &handle).unwrap_err();
        assert_eq!(err.code(), libc::ENOMEM);
    }

    #[test]
    fn test_adopted_text_charges_capacity() {
        let debug = Arc::new(DebugAllocator::new());
        let handle: AllocHandle = debug.clone();

        let mut buf = String::with_capacity(64);
        buf.push_str("ab");
        let capacity = buf.capacity();
        let text = Text::adopt_in(buf, &handle).unwrap();
        assert_eq!(text.charged(), capacity);
        assert_eq!(debug.stats().outstanding(), capacity as u64);

        drop(text);
        assert!(!debug.stats().has_leaks());
    }

    #[test]
    fn test_adopt_refused_past_limit() {
        let handle: AllocHandle = Arc::new(DebugAllocator::with_limit(16));
        let mut buf = String::with_capacity(64);
        buf.push('x');
        let err = Text::adopt_in(buf, &handle).unwrap_err();
        assert_eq!(err.code(), libc::ENOMEM);
    }

    #[test]
    fn test_try_clone_is_deep() {
        let debug = Arc::new(DebugAllocator::new());
        let handle: AllocHandle = debug.clone();

        let original = Value::text_in("abc", &handle).unwrap();
        let copy = original.try_clone().unwrap();
        assert_eq!(original, copy);
        assert_eq!(debug.stats().outstanding(), 6);

        drop(original);
        assert_eq!(copy.as_text(), Some("abc"));
        drop(copy);
        assert!(!debug.stats().has_leaks());
    }
}
