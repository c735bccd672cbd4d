//! Free List - Address-ordered chunks reclaimed by the sweeper
//!
//! The list is intrusive: each free chunk carries a header with the FREE bit
//! set and the address of the next free chunk in its type word. The sweeper
//! rebuilds it from scratch in address order, so a first-fit search always
//! returns the lowest suitable chunk.
//!
//! ```text
//! head ──► [FREE|next|48] ─────► [FREE|next|200] ─────► [FREE|0|24]
//!          0x1000                0x1400                 0x2000
//! ```

use crate::object::header::{header_at, header_at_mut, write_header, ObjectHeader, HEADER_SIZE};

/// Intrusive free list over the heap region
#[derive(Debug, Default)]
pub struct FreeList {
    head: usize,
    tail: usize,
    chunks: usize,
    bytes: usize,
}

impl FreeList {
    pub const fn new() -> Self {
        Self {
            head: 0,
            tail: 0,
            chunks: 0,
            bytes: 0,
        }
    }

    /// Forget every chunk (the sweeper is about to rebuild the list)
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Append a chunk at the end of the list
    ///
    /// Callers append in ascending address order.
    ///
    /// # Safety
    /// `header_addr..header_addr + size` must be heap memory no live object
    /// or other free chunk overlaps.
    pub unsafe fn append(&mut self, header_addr: usize, size: usize) {
        debug_assert!(size >= HEADER_SIZE);
        debug_assert!(self.tail < header_addr);

        write_header(header_addr, ObjectHeader::free(size, 0));
        if self.tail == 0 {
            self.head = header_addr;
        } else {
            header_at_mut(self.tail).set_next_free(header_addr);
        }
        self.tail = header_addr;
        self.chunks += 1;
        self.bytes += size;
    }

    /// Remove the first chunk that can hold `size` bytes
    ///
    /// A chunk fits when it is exactly `size` or leaves at least
    /// `HEADER_SIZE` behind; the remainder keeps the chunk's place in the
    /// list. Returns the header address of the carved chunk.
    ///
    /// # Safety
    /// Every chunk on the list must still carry its free header.
    pub unsafe fn take_first_fit(&mut self, size: usize) -> Option<usize> {
        let mut prev = 0usize;
        let mut cur = self.head;

        while cur != 0 {
            let header = header_at(cur);
            let chunk_size = header.size();
            let next = header.next_free();

            if chunk_size == size {
                self.unlink(prev, cur, next);
                self.chunks -= 1;
                self.bytes -= size;
                return Some(cur);
            }

            if chunk_size >= size + HEADER_SIZE {
                let rest = cur + size;
                write_header(rest, ObjectHeader::free(chunk_size - size, next));
                self.unlink(prev, cur, rest);
                if self.tail == cur {
                    self.tail = rest;
                }
                self.bytes -= size;
                return Some(cur);
            }

            prev = cur;
            cur = next;
        }

        None
    }

    /// Point `prev` (or the head) at `replacement` instead of `cur`
    unsafe fn unlink(&mut self, prev: usize, cur: usize, replacement: usize) {
        if prev == 0 {
            self.head = replacement;
        } else {
            header_at_mut(prev).set_next_free(replacement);
        }
        if self.tail == cur && replacement == header_at(cur).next_free() {
            self.tail = prev;
        }
    }

    /// Walk the list, yielding `(header_addr, size)`
    ///
    /// # Safety
    /// Same as [`FreeList::take_first_fit`].
    pub unsafe fn iter(&self) -> FreeListIter<'_> {
        FreeListIter {
            cur: self.head,
            _list: std::marker::PhantomData,
        }
    }

    pub fn head(&self) -> usize {
        self.head
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks
    }

    pub fn free_bytes(&self) -> usize {
        self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.head == 0
    }
}

/// Iterator over free chunks
pub struct FreeListIter<'a> {
    cur: usize,
    _list: std::marker::PhantomData<&'a FreeList>,
}

impl Iterator for FreeListIter<'_> {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<(usize, usize)> {
        if self.cur == 0 {
            return None;
        }
        let addr = self.cur;
        // SAFETY: guaranteed by the caller of `FreeList::iter`
        let header = unsafe { header_at(addr) };
        self.cur = header.next_free();
        Some((addr, header.size()))
    }
}
