//! Sweeper - Reclaim unmarked objects in address order
//!
//! ```text
//! before: [A*][B ][C ][F ][D*][E ]  top
//! after:  [A ][ free      ][D ]     top'   (* = marked, F = free chunk)
//! ```
//!
//! Adjacent garbage and free chunks are merged into one chunk. A run that
//! reaches the bump cursor is handed back to the bump tail instead of the
//! free list.

use crate::error::{GcError, Result};
use crate::heap::free_list::FreeList;
use crate::object::header::{header_at_mut, HEADER_SIZE, OBJECT_ALIGNMENT};
use crate::util::constants::POISON_BYTE;
use crate::util::debug::{format_address, hex_dump};
use crate::util::Alignment;

/// Outcome of one sweep
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepResult {
    pub live_objects: usize,
    pub live_bytes: usize,
    pub reclaimed_objects: usize,
    pub reclaimed_bytes: usize,
    pub free_chunks: usize,
    pub free_bytes: usize,
    /// Bump cursor after the sweep
    pub new_top: usize,
}

/// Sweep `[start, top)`, rebuilding `free_list` from scratch
///
/// # Safety
/// `[start, top)` must be heap memory tiled by headers, with every
/// reachable object marked.
pub unsafe fn sweep(
    start: usize,
    top: usize,
    free_list: &mut FreeList,
    poison: bool,
) -> Result<SweepResult> {
    free_list.clear();

    let mut result = SweepResult {
        new_top: top,
        ..Default::default()
    };
    let mut run_start: Option<usize> = None;
    let mut addr = start;

    while addr < top {
        let header = header_at_mut(addr);
        let size = header.size();

        if size < HEADER_SIZE || !Alignment::is_aligned(size, OBJECT_ALIGNMENT) || size > top - addr {
            return Err(corrupt(addr, header.descriptor_raw(), format!("invalid size {}", size)));
        }

        if header.is_free() {
            if header.is_marked() {
                return Err(corrupt(
                    addr,
                    header.descriptor_raw(),
                    "mark bit set on free chunk".to_string(),
                ));
            }
            run_start.get_or_insert(addr);
        } else if header.is_marked() {
            header.clear_mark();
            result.live_objects += 1;
            result.live_bytes += size;
            if let Some(run) = run_start.take() {
                flush_run(free_list, run, addr, poison);
            }
        } else {
            result.reclaimed_objects += 1;
            result.reclaimed_bytes += size;
            run_start.get_or_insert(addr);
        }

        addr += size;
    }

    if let Some(run) = run_start {
        if poison {
            poison_range(run, top);
        }
        result.new_top = run;
    }

    result.free_chunks = free_list.chunk_count();
    result.free_bytes = free_list.free_bytes();
    Ok(result)
}

unsafe fn flush_run(free_list: &mut FreeList, start: usize, end: usize, poison: bool) {
    if poison {
        poison_range(start + HEADER_SIZE, end);
    }
    free_list.append(start, end - start);
}

unsafe fn poison_range(start: usize, end: usize) {
    if end > start {
        std::ptr::write_bytes(start as *mut u8, POISON_BYTE, end - start);
    }
}

unsafe fn corrupt(addr: usize, descriptor: usize, reason: String) -> GcError {
    log::error!(
        target: "spy_gc",
        "corrupt header at {}: {}\n{}",
        format_address(addr),
        reason,
        hex_dump(addr, HEADER_SIZE)
    );
    GcError::CorruptHeader {
        address: addr,
        descriptor,
        reason,
    }
}
