//! Object Module - Heap object model
//!
//! Every allocation is a header followed by a payload. References point at
//! the payload, which is what generated code sees as a `spy_Str *` or a
//! `spy_RawBuffer *`.

pub mod descriptor;
pub mod header;
pub mod refmap;

pub use descriptor::{DescriptorId, DescriptorTable, Layout, TypeDescriptor};
pub use header::{ObjectHeader, HEADER_SIZE, MIN_OBJECT_SIZE, OBJECT_ALIGNMENT};
pub use refmap::{ReferenceMap, INLINE_SLOTS, SLOT_SIZE};

use crate::util::debug::format_address;

/// Reference to a heap object (address of its payload)
///
/// Never null; nullable slots are `Option<ObjRef>` on the Rust side and a
/// zero word on the C side.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjRef(usize);

impl ObjRef {
    /// Wrap a payload address, `None` for null
    #[inline]
    pub const fn new(address: usize) -> Option<Self> {
        if address == 0 {
            None
        } else {
            Some(ObjRef(address))
        }
    }

    #[inline]
    pub(crate) const fn from_header(header_addr: usize) -> Self {
        ObjRef(header_addr + HEADER_SIZE)
    }

    /// Payload address
    #[inline]
    pub const fn addr(self) -> usize {
        self.0
    }

    /// Header address
    #[inline]
    pub const fn header_addr(self) -> usize {
        self.0 - HEADER_SIZE
    }

    #[inline]
    pub const fn as_ptr(self) -> *mut u8 {
        self.0 as *mut u8
    }
}

impl std::fmt::Display for ObjRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_address(self.0))
    }
}

/// Raw word for an optional reference (0 for `None`)
#[inline]
pub fn to_word(obj: Option<ObjRef>) -> usize {
    obj.map_or(0, ObjRef::addr)
}
