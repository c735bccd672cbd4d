//! Value Module - Builtin heap values
//!
//! Strings and raw buffers are ordinary heap objects; they differ from
//! compiler-emitted types only in descriptor and payload layout.
//!
//! Operations that allocate keep their operands rooted for the duration of
//! the call, so a collection triggered by that allocation cannot reclaim them.

pub mod rawbuffer;
pub mod string;

pub use rawbuffer::RawBuffer;
pub use string::SpyStr;

use crate::heap::Heap;
use crate::object::ObjRef;
use crate::util::constants::WORD_SIZE;

/// Run `f` with `objects` rooted in a fresh handle frame
pub fn with_pinned<T>(heap: &mut Heap, objects: &[ObjRef], f: impl FnOnce(&mut Heap) -> T) -> T {
    let frame = heap.roots_mut().enter_frame();
    for &obj in objects {
        heap.roots_mut().push(Some(obj));
    }
    let result = f(heap);
    heap.roots_mut().leave_frame(frame);
    result
}

/// Read the payload word at `offset`
///
/// # Safety
/// `obj` must be live with at least `offset + WORD_SIZE` payload bytes.
#[inline]
pub(crate) unsafe fn read_word(obj: ObjRef, offset: usize) -> usize {
    debug_assert_eq!(offset % WORD_SIZE, 0);
    *((obj.addr() + offset) as *const usize)
}

/// Write the payload word at `offset`
///
/// # Safety
/// Same as [`read_word`].
#[inline]
pub(crate) unsafe fn write_word(obj: ObjRef, offset: usize, value: usize) {
    debug_assert_eq!(offset % WORD_SIZE, 0);
    *((obj.addr() + offset) as *mut usize) = value;
}
