//! Marker Module - Mark phase of the collector
//!
//! Marks everything reachable from the root set:
//!
//! ```text
//! roots ──► validate ──► set mark bit ──► push
//!                                          │
//!           ┌──────────────────────────────┘
//!           ▼
//!          pop ──► for each reference field ──► validate ──► set mark bit ──► push
//! ```
//!
//! An object is pushed only when its mark bit flips from clear to set, so
//! every object is scanned once and cycles terminate.

pub mod mark_queue;
pub mod roots;

pub use mark_queue::{MarkStack, MarkStackStats};
pub use roots::{Handle, HandleFrame, RootSet, ShadowFrame, ROOT_SET_VERSION};

use crate::error::{GcError, Result};
use crate::object::header::{header_at, header_at_mut, HEADER_SIZE, OBJECT_ALIGNMENT};
use crate::object::{DescriptorTable, TypeDescriptor};
use crate::util::Alignment;

/// Read-only view of the allocated part of the heap
#[derive(Clone, Copy)]
pub struct HeapView<'a> {
    /// First header
    pub start: usize,
    /// Bump cursor; `[start, top)` is tiled by headers
    pub top: usize,
    pub descriptors: &'a DescriptorTable,
}

impl<'a> HeapView<'a> {
    /// Check that `address` is the payload of a live object
    ///
    /// Returns the header address and the object's descriptor.
    ///
    /// The header, not the payload, must lie below `top`: an empty object
    /// at the end of the region has its payload address equal to `top`.
    pub fn validate_reference(&self, address: usize) -> Result<(usize, &'a TypeDescriptor)> {
        if address < self.start + HEADER_SIZE
            || address - HEADER_SIZE >= self.top
            || !Alignment::is_aligned(address, OBJECT_ALIGNMENT)
        {
            return Err(GcError::InvalidReference { address });
        }

        let header_addr = address - HEADER_SIZE;
        // SAFETY: header_addr is aligned and inside [start, top)
        let header = unsafe { header_at(header_addr) };

        if header.is_free() {
            return Err(GcError::InvalidReference { address });
        }

        let raw = header.descriptor_raw();
        let descriptor = self.descriptors.lookup(raw).ok_or_else(|| GcError::CorruptHeader {
            address: header_addr,
            descriptor: raw,
            reason: "unknown type descriptor".to_string(),
        })?;

        let size = header.size();
        let fits = size >= HEADER_SIZE
            && Alignment::is_aligned(size, OBJECT_ALIGNMENT)
            && size <= self.top - header_addr;
        // SAFETY: the object lies inside the allocated region
        if !fits || !unsafe { descriptor.size_matches(address, size) } {
            return Err(GcError::CorruptHeader {
                address: header_addr,
                descriptor: raw,
                reason: format!("size {} does not match type '{}'", size, descriptor.name()),
            });
        }

        Ok((header_addr, descriptor))
    }
}

/// Result of one mark phase
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MarkResult {
    /// Non-null roots visited
    pub roots: usize,
    /// Objects whose mark bit was set
    pub marked_objects: usize,
    /// Bytes of marked objects, headers included
    pub marked_bytes: usize,
    pub stack: MarkStackStats,
}

/// Mark phase driver
#[derive(Debug, Default)]
pub struct Marker {
    stack: MarkStack,
}

impl Marker {
    pub fn new() -> Self {
        Self {
            stack: MarkStack::with_capacity(256),
        }
    }

    /// Mark every object reachable from `roots`
    ///
    /// On error some objects may be left marked; the caller clears them.
    pub fn mark_from_roots(&mut self, view: HeapView<'_>, roots: &RootSet) -> Result<MarkResult> {
        self.stack.clear();
        let mut result = MarkResult::default();

        let stack = &mut self.stack;
        let visited = roots.for_each_root(|root| mark_and_push(view, root, stack, &mut result))?;
        result.roots = visited;

        while let Some(object) = self.stack.pop() {
            let (_, descriptor) = view.validate_reference(object)?;
            let stack = &mut self.stack;
            // SAFETY: validated as a live object of this descriptor
            unsafe {
                descriptor.for_each_reference(object, |child| {
                    mark_and_push(view, child, stack, &mut result)
                })?;
            }
        }

        result.stack = self.stack.stats();
        Ok(result)
    }
}

fn mark_and_push(
    view: HeapView<'_>,
    address: usize,
    stack: &mut MarkStack,
    result: &mut MarkResult,
) -> Result<()> {
    let (header_addr, _) = view.validate_reference(address)?;
    // SAFETY: validated above
    let header = unsafe { header_at_mut(header_addr) };
    if !header.set_marked() {
        result.marked_objects += 1;
        result.marked_bytes += header.size();
        stack.push(address);
    }
    Ok(())
}
