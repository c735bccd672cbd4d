//! Raw Buffer Value - Mutable byte buffer for host data interchange
//!
//! ```text
//! ┌──────────┬────────────┬─────────────────────────────┐
//! │ len (W)  │ cap (W)    │ bytes (cap)                 │
//! └──────────┴────────────┴─────────────────────────────┘
//! ```
//!
//! `len <= cap` always holds. Appending past `cap` allocates a bigger
//! buffer and copies; the old object is left for the collector.

use super::{read_word, with_pinned, write_word};
use crate::error::{GcError, Result};
use crate::heap::Heap;
use crate::object::{DescriptorId, ObjRef};
use crate::util::constants::WORD_SIZE;

const LEN_OFFSET: usize = 0;
const CAP_OFFSET: usize = WORD_SIZE;
const DATA_OFFSET: usize = 2 * WORD_SIZE;

/// Smallest capacity chosen when a buffer grows
const MIN_GROWTH: usize = 8;

/// Reference to a heap raw buffer
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawBuffer(ObjRef);

impl RawBuffer {
    /// Empty buffer with room for `capacity` bytes
    pub fn new(heap: &mut Heap, capacity: usize) -> Result<RawBuffer> {
        // the allocator stores `capacity` into the length field of the descriptor
        heap.allocate(DescriptorId::RAW_BUFFER, capacity).map(RawBuffer)
    }

    /// Buffer holding a copy of `data`
    pub fn from_bytes(heap: &mut Heap, data: &[u8]) -> Result<RawBuffer> {
        let buf = Self::new(heap, data.len())?;
        // SAFETY: fresh buffer with capacity data.len()
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), buf.data_ptr(), data.len());
            buf.set_raw_len(data.len());
        }
        Ok(buf)
    }

    pub fn from_ref(heap: &Heap, obj: ObjRef) -> Result<RawBuffer> {
        heap.expect_kind(obj, DescriptorId::RAW_BUFFER)?;
        Ok(RawBuffer(obj))
    }

    pub fn obj(self) -> ObjRef {
        self.0
    }

    pub fn len(self, heap: &Heap) -> Result<usize> {
        heap.expect_kind(self.0, DescriptorId::RAW_BUFFER)?;
        // SAFETY: live buffer
        Ok(unsafe { self.raw_len() })
    }

    pub fn is_empty(self, heap: &Heap) -> Result<bool> {
        Ok(self.len(heap)? == 0)
    }

    pub fn capacity(self, heap: &Heap) -> Result<usize> {
        heap.expect_kind(self.0, DescriptorId::RAW_BUFFER)?;
        // SAFETY: live buffer
        Ok(unsafe { self.raw_capacity() })
    }

    /// The first `len` bytes
    pub fn bytes(self, heap: &Heap) -> Result<&[u8]> {
        let len = self.len(heap)?;
        // SAFETY: live buffer; &Heap blocks mutation and collection
        Ok(unsafe { std::slice::from_raw_parts(self.data_ptr(), len) })
    }

    /// Append `data`, returning the buffer that now holds the result
    ///
    /// The returned buffer is `buf` itself when the bytes fit, otherwise a
    /// new buffer of capacity `max(required, 2 * capacity, 8)`.
    pub fn append(heap: &mut Heap, buf: RawBuffer, data: &[u8]) -> Result<RawBuffer> {
        let len = buf.len(heap)?;
        // SAFETY: kind checked by len()
        let capacity = unsafe { buf.raw_capacity() };
        let required = len.checked_add(data.len()).ok_or(GcError::OutOfMemory {
            requested: usize::MAX,
            available: 0,
        })?;

        if required <= capacity {
            // SAFETY: required <= capacity
            unsafe {
                std::ptr::copy_nonoverlapping(data.as_ptr(), buf.data_ptr().add(len), data.len());
                buf.set_raw_len(required);
            }
            return Ok(buf);
        }

        let new_capacity = required.max(capacity.saturating_mul(2)).max(MIN_GROWTH);
        let grown = with_pinned(heap, &[buf.0], |heap| Self::new(heap, new_capacity))?;
        log::trace!(
            target: "spy_gc",
            "raw buffer {} grown to {} bytes at {}",
            buf.0,
            new_capacity,
            grown.0
        );
        // SAFETY: old buffer stayed rooted; new buffer has room for `required`
        unsafe {
            std::ptr::copy_nonoverlapping(buf.data_ptr(), grown.data_ptr(), len);
            std::ptr::copy_nonoverlapping(data.as_ptr(), grown.data_ptr().add(len), data.len());
            grown.set_raw_len(required);
        }
        Ok(grown)
    }

    /// New buffer holding a copy of bytes `start..end`
    pub fn slice(heap: &mut Heap, buf: RawBuffer, start: usize, end: usize) -> Result<RawBuffer> {
        let length = buf.len(heap)?;
        if start > end || end > length {
            return Err(GcError::OutOfBounds { start, end, length });
        }

        let count = end - start;
        let out = with_pinned(heap, &[buf.0], |heap| Self::new(heap, count))?;
        // SAFETY: range checked; source rooted across the allocation
        unsafe {
            std::ptr::copy_nonoverlapping(buf.data_ptr().add(start), out.data_ptr(), count);
            out.set_raw_len(count);
        }
        Ok(out)
    }

    pub fn byte_at(self, heap: &Heap, index: usize) -> Result<u8> {
        let bytes = self.bytes(heap)?;
        bytes.get(index).copied().ok_or(GcError::IndexOutOfBounds {
            index,
            length: bytes.len(),
        })
    }

    pub fn set_byte(self, heap: &mut Heap, index: usize, value: u8) -> Result<()> {
        self.write_at(heap, index, &[value])
    }

    pub fn get_i32(self, heap: &Heap, offset: usize) -> Result<i32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.read_at(heap, offset, 4)?);
        Ok(i32::from_le_bytes(raw))
    }

    pub fn set_i32(self, heap: &mut Heap, offset: usize, value: i32) -> Result<()> {
        self.write_at(heap, offset, &value.to_le_bytes())
    }

    pub fn get_f64(self, heap: &Heap, offset: usize) -> Result<f64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.read_at(heap, offset, 8)?);
        Ok(f64::from_le_bytes(raw))
    }

    pub fn set_f64(self, heap: &mut Heap, offset: usize, value: f64) -> Result<()> {
        self.write_at(heap, offset, &value.to_le_bytes())
    }

    fn read_at(self, heap: &Heap, offset: usize, width: usize) -> Result<&[u8]> {
        let bytes = self.bytes(heap)?;
        let length = bytes.len();
        match offset.checked_add(width) {
            Some(end) if end <= length => Ok(&bytes[offset..end]),
            _ => Err(GcError::IndexOutOfBounds {
                index: offset,
                length,
            }),
        }
    }

    fn write_at(self, heap: &mut Heap, offset: usize, data: &[u8]) -> Result<()> {
        let length = self.len(heap)?;
        match offset.checked_add(data.len()) {
            Some(end) if end <= length => {
                // SAFETY: in bounds of a live buffer; &mut Heap makes it exclusive
                unsafe {
                    std::ptr::copy_nonoverlapping(data.as_ptr(), self.data_ptr().add(offset), data.len())
                };
                Ok(())
            }
            _ => Err(GcError::IndexOutOfBounds {
                index: offset,
                length,
            }),
        }
    }

    unsafe fn raw_len(self) -> usize {
        read_word(self.0, LEN_OFFSET)
    }

    unsafe fn set_raw_len(self, len: usize) {
        write_word(self.0, LEN_OFFSET, len)
    }

    unsafe fn raw_capacity(self) -> usize {
        read_word(self.0, CAP_OFFSET)
    }

    fn data_ptr(self) -> *mut u8 {
        (self.0.addr() + DATA_OFFSET) as *mut u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeapConfig;
    use crate::util::constants::KB;

    fn heap() -> Heap {
        Heap::new(HeapConfig {
            initial_heap_size: 64 * KB,
            max_heap_size: 512 * KB,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_new_buffer_is_empty() {
        let mut heap = heap();
        let buf = RawBuffer::new(&mut heap, 16).unwrap();
        assert_eq!(buf.len(&heap).unwrap(), 0);
        assert_eq!(buf.capacity(&heap).unwrap(), 16);
        assert!(buf.bytes(&heap).unwrap().is_empty());
    }

    #[test]
    fn test_append_in_place() {
        let mut heap = heap();
        let buf = RawBuffer::new(&mut heap, 8).unwrap();
        let same = RawBuffer::append(&mut heap, buf, b"abc").unwrap();
        assert_eq!(same, buf);
        assert_eq!(buf.bytes(&heap).unwrap(), b"abc");
    }

    #[test]
    fn test_append_grows() {
        let mut heap = heap();
        let buf = RawBuffer::new(&mut heap, 4).unwrap();
        let grown = RawBuffer::append(&mut heap, buf, b"abcdef").unwrap();

        assert_ne!(grown, buf);
        assert_eq!(grown.len(&heap).unwrap(), 6);
        assert_eq!(grown.capacity(&heap).unwrap(), 8);
        assert_eq!(grown.bytes(&heap).unwrap(), b"abcdef");
        // the old buffer is untouched
        assert_eq!(buf.len(&heap).unwrap(), 0);
    }

    #[test]
    fn test_growth_doubles() {
        let mut heap = heap();
        let buf = RawBuffer::from_bytes(&mut heap, &[1; 20]).unwrap();
        let grown = RawBuffer::append(&mut heap, buf, &[2]).unwrap();
        assert_eq!(grown.capacity(&heap).unwrap(), 40);
    }

    #[test]
    fn test_byte_access() {
        let mut heap = heap();
        let buf = RawBuffer::from_bytes(&mut heap, b"xyz").unwrap();
        assert_eq!(buf.byte_at(&heap, 1).unwrap(), b'y');
        buf.set_byte(&mut heap, 1, b'Y').unwrap();
        assert_eq!(buf.bytes(&heap).unwrap(), b"xYz");
        assert_eq!(
            buf.byte_at(&heap, 3),
            Err(GcError::IndexOutOfBounds { index: 3, length: 3 })
        );
        assert!(buf.set_byte(&mut heap, 3, 0).is_err());
    }

    #[test]
    fn test_index_checks_length_not_capacity() {
        let mut heap = heap();
        let buf = RawBuffer::new(&mut heap, 16).unwrap();
        assert!(buf.byte_at(&heap, 0).is_err());
    }

    #[test]
    fn test_typed_access() {
        let mut heap = heap();
        let buf = RawBuffer::from_bytes(&mut heap, &[0; 16]).unwrap();
        buf.set_i32(&mut heap, 0, -42).unwrap();
        buf.set_f64(&mut heap, 8, 1.5).unwrap();

        assert_eq!(buf.get_i32(&heap, 0).unwrap(), -42);
        assert_eq!(buf.get_f64(&heap, 8).unwrap(), 1.5);
        assert_eq!(&buf.bytes(&heap).unwrap()[..4], &(-42i32).to_le_bytes());
        assert!(buf.get_f64(&heap, 9).is_err());
        assert!(buf.get_i32(&heap, usize::MAX).is_err());
    }

    #[test]
    fn test_slice_copies() {
        let mut heap = heap();
        let buf = RawBuffer::from_bytes(&mut heap, b"hello").unwrap();
        let part = RawBuffer::slice(&mut heap, buf, 1, 3).unwrap();
        assert_eq!(part.bytes(&heap).unwrap(), b"el");

        part.set_byte(&mut heap, 0, b'E').unwrap();
        assert_eq!(buf.bytes(&heap).unwrap(), b"hello");

        assert_eq!(
            RawBuffer::slice(&mut heap, buf, 4, 6),
            Err(GcError::OutOfBounds {
                start: 4,
                end: 6,
                length: 5
            })
        );
    }
}
