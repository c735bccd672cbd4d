//! Reference Map - Tells the tracer where reference fields sit inside a payload
//!
//! Each bit in the bitmap represents one pointer-sized slot of payload data.
//! - Bit = 1: slot holds a heap reference (or null)
//! - Bit = 0: opaque data (integers, floats, padding)
//!
//! Records larger than the bitmap keep their far reference slots in a
//! sorted list next to it.
//!
//! # Layout
//!
//! ```text
//! Payload Layout (64-bit):
//! ┌─────────┬─────────┬─────────┬─────────┐
//! │ 0-7     │ 8-15    │ 16-23   │ 24-31   │
//! │ (bit 0) │ (bit 1) │ (bit 2) │ (bit 3) │
//! ├─────────┼─────────┼─────────┼─────────┤
//! │ ref     │ i64     │ ref     │ f64     │
//! │ bit=1   │ bit=0   │ bit=1   │ bit=0   │
//! └─────────┴─────────┴─────────┴─────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use spy_gc::object::{ReferenceMap, SLOT_SIZE};
//!
//! let map = ReferenceMap::new(&[0, 2 * SLOT_SIZE]).unwrap();
//!
//! assert!(map.is_reference(0));
//! assert!(!map.is_reference(SLOT_SIZE));
//! assert!(map.is_reference(2 * SLOT_SIZE));
//! assert_eq!(map.count(), 2);
//! ```

use crate::error::{GcError, Result};
use crate::util::constants::WORD_SIZE;

/// Size of each slot tracked by the reference map (one pointer)
pub const SLOT_SIZE: usize = WORD_SIZE;

/// Slots held in the inline bitmap; references past them spill to a list
pub const INLINE_SLOTS: usize = 64;

/// Reference map for a fixed-shape type
///
/// Slots below [`INLINE_SLOTS`] live in a bitmap; the rare large record
/// keeps its remaining reference slots as a sorted list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReferenceMap {
    bitmap: u64,
    spilled: Box<[usize]>,
}

impl ReferenceMap {
    /// Create an empty reference map with no references
    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a reference map from payload byte offsets
    ///
    /// Offsets come from compiler-emitted descriptors, so they are validated
    /// rather than asserted: each must be slot aligned. Duplicates are
    /// counted once.
    pub fn new(offsets: &[usize]) -> Result<Self> {
        let mut bitmap: u64 = 0;
        let mut spilled = Vec::new();

        for &offset in offsets {
            if offset % SLOT_SIZE != 0 {
                return Err(GcError::Configuration(format!(
                    "reference offset {} is not aligned to {} bytes",
                    offset, SLOT_SIZE
                )));
            }

            let slot = offset / SLOT_SIZE;
            if slot < INLINE_SLOTS {
                bitmap |= 1u64 << slot;
            } else {
                spilled.push(slot);
            }
        }

        spilled.sort_unstable();
        spilled.dedup();
        Ok(Self {
            bitmap,
            spilled: spilled.into_boxed_slice(),
        })
    }

    /// Check if a given payload offset holds a reference
    ///
    /// Returns `false` for unaligned offsets.
    #[inline]
    pub fn is_reference(&self, offset: usize) -> bool {
        if offset % SLOT_SIZE != 0 {
            return false;
        }

        let slot = offset / SLOT_SIZE;
        if slot < INLINE_SLOTS {
            (self.bitmap & (1u64 << slot)) != 0
        } else {
            self.spilled.binary_search(&slot).is_ok()
        }
    }

    /// Number of reference slots
    #[inline]
    pub fn count(&self) -> usize {
        self.bitmap.count_ones() as usize + self.spilled.len()
    }

    /// Inline bitmap (slots below `INLINE_SLOTS`)
    #[inline]
    pub const fn bitmap(&self) -> u64 {
        self.bitmap
    }

    /// True when some reference sits past the inline bitmap
    #[inline]
    pub fn is_spilled(&self) -> bool {
        !self.spilled.is_empty()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bitmap == 0 && self.spilled.is_empty()
    }

    /// One past the highest referenced byte, 0 when empty
    pub fn extent(&self) -> usize {
        if let Some(&last) = self.spilled.last() {
            (last + 1) * SLOT_SIZE
        } else if self.bitmap == 0 {
            0
        } else {
            (INLINE_SLOTS - self.bitmap.leading_zeros() as usize) * SLOT_SIZE
        }
    }

    /// Iterate over all reference offsets in ascending order
    ///
    /// ```rust
    /// use spy_gc::object::{ReferenceMap, SLOT_SIZE};
    ///
    /// let map = ReferenceMap::new(&[0, 2 * SLOT_SIZE, 4 * SLOT_SIZE]).unwrap();
    /// let offsets: Vec<usize> = map.iter().collect();
    /// assert_eq!(offsets, vec![0, 2 * SLOT_SIZE, 4 * SLOT_SIZE]);
    /// ```
    #[inline]
    pub fn iter(&self) -> ReferenceMapIter<'_> {
        ReferenceMapIter {
            bitmap: self.bitmap,
            spilled: self.spilled.iter(),
        }
    }
}

/// Iterator over reference offsets in a ReferenceMap
#[derive(Debug, Clone)]
pub struct ReferenceMapIter<'a> {
    /// Inline bits not yet yielded
    bitmap: u64,
    spilled: std::slice::Iter<'a, usize>,
}

impl Iterator for ReferenceMapIter<'_> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.bitmap != 0 {
            let bit = self.bitmap.trailing_zeros() as usize;
            self.bitmap &= self.bitmap - 1;
            return Some(bit * SLOT_SIZE);
        }
        self.spilled.next().map(|&slot| slot * SLOT_SIZE)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.bitmap.count_ones() as usize + self.spilled.len();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ReferenceMapIter<'_> {}

impl std::iter::FusedIterator for ReferenceMapIter<'_> {}
