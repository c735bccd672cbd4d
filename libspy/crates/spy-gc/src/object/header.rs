//! Object Header - Metadata prefixing every heap allocation
//!
//! Object Header Layout (3 words, rounded up to 8 bytes):
//! ┌─────────────────────────────────────────┐
//! │         Mark Word (1 word)              │
//! │  - Bit 0: Marked                        │
//! │  - Bit 1: Free                          │
//! ├─────────────────────────────────────────┤
//! │         Type Word (1 word)              │
//! │  - live: descriptor id                  │
//! │  - free: address of next free chunk     │
//! ├─────────────────────────────────────────┤
//! │         Size (1 word)                   │  <- total size incl. header
//! └─────────────────────────────────────────┘
//!
//! References handed to generated code point at the payload, directly after
//! the header, so `header = reference - HEADER_SIZE`.
//!
//! There is exactly one mutator, so the mark word is a plain word rather than
//! an atomic.

use super::descriptor::DescriptorId;
use crate::util::Alignment;

/// Size of object header in bytes (24 on 64-bit targets, 16 on wasm32)
pub const HEADER_SIZE: usize = match Alignment::align_up(
    std::mem::size_of::<ObjectHeader>(),
    OBJECT_ALIGNMENT,
) {
    Some(size) => size,
    None => panic!("header size overflow"),
};

/// Minimum object alignment (bytes)
pub const OBJECT_ALIGNMENT: usize = Alignment::OBJECT;

/// Smallest chunk the heap ever carves: a bare header
pub const MIN_OBJECT_SIZE: usize = HEADER_SIZE;

/// Mark bit positions
pub const MARKED_BIT: usize = 0;
pub const FREE_BIT: usize = 1;

/// Masks for mark word fields
pub const MARKED_MASK: usize = 1 << MARKED_BIT;
pub const FREE_MASK: usize = 1 << FREE_BIT;

/// Object Header
#[repr(C)]
#[derive(Debug)]
pub struct ObjectHeader {
    mark_word: usize,
    type_word: usize,
    size: usize,
}

impl ObjectHeader {
    /// Header for a freshly allocated, unmarked object
    pub fn live(descriptor: DescriptorId, size: usize) -> Self {
        Self {
            mark_word: 0,
            type_word: descriptor.index() as usize,
            size,
        }
    }

    /// Header for a free chunk linked to `next` (0 ends the list)
    pub fn free(size: usize, next: usize) -> Self {
        Self {
            mark_word: FREE_MASK,
            type_word: next,
            size,
        }
    }

    // === Mark Bit Operations ===

    #[inline]
    pub fn is_marked(&self) -> bool {
        self.mark_word & MARKED_MASK != 0
    }

    /// Set the mark bit, returning true if it was already set
    #[inline]
    pub fn set_marked(&mut self) -> bool {
        let was_set = self.is_marked();
        self.mark_word |= MARKED_MASK;
        was_set
    }

    #[inline]
    pub fn clear_mark(&mut self) {
        self.mark_word &= !MARKED_MASK;
    }

    // === Free Chunk Operations ===

    #[inline]
    pub fn is_free(&self) -> bool {
        self.mark_word & FREE_MASK != 0
    }

    /// Next free chunk (header address), only meaningful when free
    #[inline]
    pub fn next_free(&self) -> usize {
        self.type_word
    }

    #[inline]
    pub fn set_next_free(&mut self, next: usize) {
        debug_assert!(self.is_free());
        self.type_word = next;
    }

    // === Type and Size ===

    /// Raw descriptor id, only meaningful when live
    #[inline]
    pub fn descriptor_raw(&self) -> usize {
        self.type_word
    }

    /// Object size including header
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Raw mark word, for diagnostics
    #[inline]
    pub fn mark_word(&self) -> usize {
        self.mark_word
    }
}

/// Read the header stored at `header_addr`
///
/// # Safety
/// `header_addr` must be an 8-byte aligned address inside the heap region
/// with at least `HEADER_SIZE` readable bytes.
#[inline]
pub unsafe fn header_at<'a>(header_addr: usize) -> &'a ObjectHeader {
    &*(header_addr as *const ObjectHeader)
}

/// Mutable access to the header stored at `header_addr`
///
/// # Safety
/// Same as [`header_at`], and no other reference to that header may be alive.
#[inline]
pub unsafe fn header_at_mut<'a>(header_addr: usize) -> &'a mut ObjectHeader {
    &mut *(header_addr as *mut ObjectHeader)
}

/// Write a header at `header_addr`
///
/// # Safety
/// Same as [`header_at_mut`].
#[inline]
pub unsafe fn write_header(header_addr: usize, header: ObjectHeader) {
    std::ptr::write(header_addr as *mut ObjectHeader, header);
}
