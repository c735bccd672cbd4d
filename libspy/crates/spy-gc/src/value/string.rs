//! String Value - Immutable length-prefixed UTF-8
//!
//! Payload layout (what generated code sees through a `spy_Str *`):
//!
//! ```text
//! ┌──────────────┬───────────────────────────┐
//! │ length (W)   │ utf8 bytes (length)       │   no terminator
//! └──────────────┴───────────────────────────┘
//! ```
//!
//! Strings never change after construction. Every operation that produces
//! a different string allocates a new one.
//!
//! # Example
//!
//! ```rust
//! use spy_gc::{Heap, HeapConfig, SpyStr};
//!
//! let mut heap = Heap::new(HeapConfig::default()).unwrap();
//! let a = SpyStr::from_str(&mut heap, "hello ").unwrap();
//! let b = SpyStr::from_str(&mut heap, "world").unwrap();
//! let c = SpyStr::concat(&mut heap, a, b).unwrap();
//! assert_eq!(c.as_str(&heap).unwrap(), "hello world");
//! ```

use super::{read_word, with_pinned};
use crate::error::{GcError, Result};
use crate::heap::Heap;
use crate::object::{DescriptorId, ObjRef};
use crate::util::constants::WORD_SIZE;

/// Offset of the first UTF-8 byte in the payload
const DATA_OFFSET: usize = WORD_SIZE;

/// Reference to a heap string
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpyStr(ObjRef);

impl SpyStr {
    /// Build a string from UTF-8 bytes
    pub fn new(heap: &mut Heap, bytes: &[u8]) -> Result<SpyStr> {
        std::str::from_utf8(bytes).map_err(|e| GcError::InvalidUtf8 {
            valid_up_to: e.valid_up_to(),
        })?;
        let s = Self::alloc(heap, bytes.len())?;
        // SAFETY: fresh string with room for bytes.len() bytes
        unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), s.data_ptr(), bytes.len()) };
        Ok(s)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(heap: &mut Heap, s: &str) -> Result<SpyStr> {
        Self::new(heap, s.as_bytes())
    }

    /// Wrap a reference after checking it is a live string
    pub fn from_ref(heap: &Heap, obj: ObjRef) -> Result<SpyStr> {
        heap.expect_kind(obj, DescriptorId::STR)?;
        Ok(SpyStr(obj))
    }

    pub fn obj(self) -> ObjRef {
        self.0
    }

    /// Length in bytes
    pub fn len(self, heap: &Heap) -> Result<usize> {
        heap.expect_kind(self.0, DescriptorId::STR)?;
        // SAFETY: live string
        Ok(unsafe { self.raw_len() })
    }

    pub fn is_empty(self, heap: &Heap) -> Result<bool> {
        Ok(self.len(heap)? == 0)
    }

    /// UTF-8 bytes, borrowed from the heap
    pub fn bytes(self, heap: &Heap) -> Result<&[u8]> {
        let len = self.len(heap)?;
        // SAFETY: live string of `len` bytes; &Heap blocks mutation and collection
        Ok(unsafe { std::slice::from_raw_parts(self.data_ptr(), len) })
    }

    pub fn as_str(self, heap: &Heap) -> Result<&str> {
        let bytes = self.bytes(heap)?;
        std::str::from_utf8(bytes).map_err(|e| GcError::InvalidUtf8 {
            valid_up_to: e.valid_up_to(),
        })
    }

    /// `a + b`
    pub fn concat(heap: &mut Heap, a: SpyStr, b: SpyStr) -> Result<SpyStr> {
        let la = a.len(heap)?;
        let lb = b.len(heap)?;
        let total = la.checked_add(lb).ok_or(GcError::OutOfMemory {
            requested: usize::MAX,
            available: 0,
        })?;

        let s = with_pinned(heap, &[a.0, b.0], |heap| Self::alloc(heap, total))?;
        // SAFETY: operands stayed rooted; destination is a fresh object
        unsafe {
            std::ptr::copy_nonoverlapping(a.data_ptr(), s.data_ptr(), la);
            std::ptr::copy_nonoverlapping(b.data_ptr(), s.data_ptr().add(la), lb);
        }
        Ok(s)
    }

    /// `s * n`; `n <= 0` gives the empty string
    pub fn repeat(heap: &mut Heap, s: SpyStr, n: i64) -> Result<SpyStr> {
        let len = s.len(heap)?;
        let count = usize::try_from(n).unwrap_or(0);
        let total = len.checked_mul(count).ok_or(GcError::OutOfMemory {
            requested: usize::MAX,
            available: 0,
        })?;

        let out = with_pinned(heap, &[s.0], |heap| Self::alloc(heap, total))?;
        // SAFETY: source rooted during allocation; destination has `total` bytes
        unsafe {
            for i in 0..count {
                std::ptr::copy_nonoverlapping(s.data_ptr(), out.data_ptr().add(i * len), len);
            }
        }
        Ok(out)
    }

    /// Copy of bytes `start..end`
    ///
    /// Requires `start <= end <= len` and both bounds on character
    /// boundaries. `slice(s, i, i)` is the empty string.
    pub fn slice(heap: &mut Heap, s: SpyStr, start: usize, end: usize) -> Result<SpyStr> {
        let text = s.as_str(heap)?;
        let length = text.len();
        if start > end || end > length {
            return Err(GcError::OutOfBounds { start, end, length });
        }
        for index in [start, end] {
            if !text.is_char_boundary(index) {
                return Err(GcError::NotCharBoundary { index });
            }
        }

        let count = end - start;
        let out = with_pinned(heap, &[s.0], |heap| Self::alloc(heap, count))?;
        // SAFETY: source rooted during allocation; range checked above
        unsafe {
            std::ptr::copy_nonoverlapping(s.data_ptr().add(start), out.data_ptr(), count);
        }
        Ok(out)
    }

    /// `a == b`, byte-wise
    pub fn equals(heap: &Heap, a: SpyStr, b: SpyStr) -> Result<bool> {
        if a == b {
            heap.expect_kind(a.0, DescriptorId::STR)?;
            return Ok(true);
        }
        Ok(a.bytes(heap)? == b.bytes(heap)?)
    }

    /// `a != b`
    pub fn not_equals(heap: &Heap, a: SpyStr, b: SpyStr) -> Result<bool> {
        Ok(!Self::equals(heap, a, b)?)
    }

    fn alloc(heap: &mut Heap, len: usize) -> Result<SpyStr> {
        heap.allocate(DescriptorId::STR, len).map(SpyStr)
    }

    unsafe fn raw_len(self) -> usize {
        read_word(self.0, 0)
    }

    fn data_ptr(self) -> *mut u8 {
        (self.0.addr() + DATA_OFFSET) as *mut u8
    }
}
