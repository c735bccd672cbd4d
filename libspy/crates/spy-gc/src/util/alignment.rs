//! Alignment Utilities
//!
//! Helper functions for memory alignment.

/// Alignment - utility for alignment operations
pub struct Alignment;

impl Alignment {
    /// Align value up to boundary
    ///
    /// Returns `None` when rounding would overflow.
    ///
    /// # Examples
    /// ```
    /// use spy_gc::util::Alignment;
    ///
    /// assert_eq!(Alignment::align_up(100, 8), Some(104));
    /// assert_eq!(Alignment::align_up(64, 8), Some(64));
    /// assert_eq!(Alignment::align_up(usize::MAX, 8), None);
    /// ```
    #[inline]
    pub const fn align_up(value: usize, alignment: usize) -> Option<usize> {
        match value.checked_add(alignment - 1) {
            Some(v) => Some(v & !(alignment - 1)),
            None => None,
        }
    }

    /// Align value down to boundary
    #[inline]
    pub const fn align_down(value: usize, alignment: usize) -> usize {
        value & !(alignment - 1)
    }

    /// Check if value is aligned
    #[inline]
    pub const fn is_aligned(value: usize, alignment: usize) -> bool {
        value & (alignment - 1) == 0
    }

    /// Object alignment (8 bytes on every target)
    pub const OBJECT: usize = 8;
}
