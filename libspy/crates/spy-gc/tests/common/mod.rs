//! Test Utilities for the spy-gc Test Suite
//!
//! Fixtures build small heaps with verification and poisoning switched on,
//! so a broken invariant shows up at the collection that broke it.
//!
//! ============================================================================
//! Assertions here are STRICT: exact addresses, exact byte counts, no slack.
//! ============================================================================

#![allow(dead_code)]

use spy_gc::heap::HeapBlock;
use spy_gc::marker::Handle;
use spy_gc::object::HEADER_SIZE;
use spy_gc::{CollectionReport, GcState, Heap, HeapConfig, ObjRef, SpyStr};
use std::collections::HashSet;

/// Small initial heap so growth and reuse paths are exercised quickly
pub const SMALL_HEAP: usize = 64 * 1024;

/// Limit used by most fixtures
pub const DEFAULT_LIMIT: usize = 1024 * 1024;

/// Every object starts on this boundary
pub const OBJECT_ALIGNMENT: usize = 8;

/// ============================================================================
/// HEAP FIXTURE
/// ============================================================================

/// A heap plus the handle frame used to root test objects
pub struct HeapFixture {
    pub heap: Heap,
    pub config: HeapConfig,
}

impl HeapFixture {
    /// 64KB initial, 1MB limit, verification and poisoning on
    pub fn with_defaults() -> Self {
        Self::with_sizes(SMALL_HEAP, DEFAULT_LIMIT)
    }

    /// Custom initial size and limit; growth one page at a time
    pub fn with_sizes(initial: usize, max: usize) -> Self {
        let config = HeapConfig {
            initial_heap_size: initial,
            max_heap_size: max,
            grow_step: 4096,
            verbose: false,
            stats_enabled: true,
            verify_heap: true,
            poison_free_memory: true,
        };
        let heap = Heap::new(config.clone())
            .unwrap_or_else(|e| panic!("heap creation failed with valid config: {}", e));
        Self { heap, config }
    }

    /// Allocate a string, panicking with context on failure
    pub fn string(&mut self, text: &str) -> SpyStr {
        SpyStr::from_str(&mut self.heap, text)
            .unwrap_or_else(|e| panic!("allocating {:?} failed: {}", text, e))
    }

    /// Allocate a zeroed blob of `size` bytes
    pub fn blob(&mut self, size: usize) -> ObjRef {
        self.heap
            .allocate_blob(size)
            .unwrap_or_else(|e| panic!("blob of {} bytes failed: {}", size, e))
    }

    /// Root `obj` in the current handle frame
    pub fn root(&mut self, obj: ObjRef) -> Handle {
        self.heap.roots_mut().push(Some(obj))
    }

    /// Drop the root held by `handle`
    pub fn unroot(&mut self, handle: Handle) {
        self.heap.roots_mut().set(handle, None);
    }

    /// Fill the bump tail with one rooted blob so the next allocation must
    /// come from the free list
    pub fn exhaust_tail(&mut self) -> Option<ObjRef> {
        let tail = self.heap.tail_remaining();
        if tail < HEADER_SIZE {
            return None;
        }
        let filler = self.blob(tail - HEADER_SIZE);
        self.root(filler);
        assert_eq!(self.heap.tail_remaining(), 0, "filler must consume the tail exactly");
        Some(filler)
    }

    /// Collect and check the heap afterwards
    pub fn collect(&mut self) -> CollectionReport {
        let report = self
            .heap
            .collect()
            .unwrap_or_else(|e| panic!("collection failed: {}", e));
        assert_eq!(self.heap.gc_state(), GcState::Idle);
        assert_heap_tiled(&self.heap, "after collection");
        report
    }
}

/// ============================================================================
/// STRICT ASSERTION HELPERS
/// ============================================================================

/// Assert every live and free block is disjoint and together they cover
/// `[start, top)` with no gap
#[track_caller]
pub fn assert_heap_tiled(heap: &Heap, context: &str) {
    let blocks = heap
        .blocks()
        .unwrap_or_else(|e| panic!("{}: heap walk failed: {}", context, e));

    let mut cursor = heap.start();
    for block in &blocks {
        let (header_addr, size) = match *block {
            HeapBlock::Live { obj, size, .. } => (obj.header_addr(), size),
            HeapBlock::Free { header_addr, size } => (header_addr, size),
        };
        assert_eq!(
            header_addr, cursor,
            "{}: block at {:#x} does not start where the previous one ended ({:#x})",
            context, header_addr, cursor
        );
        assert_eq!(size % OBJECT_ALIGNMENT, 0, "{}: unaligned block size {}", context, size);
        cursor += size;
    }
    assert_eq!(cursor, heap.top(), "{}: blocks do not reach the bump cursor", context);

    heap.verify()
        .unwrap_or_else(|e| panic!("{}: heap verification failed: {}", context, e));
}

/// Assert `obj` is a live object
#[track_caller]
pub fn assert_live(heap: &Heap, obj: ObjRef, context: &str) {
    assert!(
        heap.is_live(obj),
        "{}: object {} was reclaimed while reachable",
        context,
        obj
    );
}

/// Assert the memory of `obj` is free: inside a free chunk or past the cursor
#[track_caller]
pub fn assert_reclaimed(heap: &Heap, obj: ObjRef, context: &str) {
    let header = obj.header_addr();
    let in_free_chunk = heap
        .free_ranges()
        .iter()
        .any(|&(addr, size)| header >= addr && header < addr + size);
    assert!(
        in_free_chunk || header >= heap.top(),
        "{}: unreachable object {} still occupies heap memory",
        context,
        obj
    );
}

/// Assert all addresses are distinct
#[track_caller]
pub fn assert_all_unique(objects: &[ObjRef], context: &str) {
    let unique: HashSet<_> = objects.iter().collect();
    assert_eq!(
        unique.len(),
        objects.len(),
        "{}: {} duplicate references among {} allocations",
        context,
        objects.len() - unique.len(),
        objects.len()
    );
}

/// Assert `obj` is aligned to the object boundary
#[track_caller]
pub fn assert_aligned(obj: ObjRef, context: &str) {
    assert_eq!(
        obj.addr() % OBJECT_ALIGNMENT,
        0,
        "{}: reference {} is not {}-byte aligned",
        context,
        obj,
        OBJECT_ALIGNMENT
    );
}
