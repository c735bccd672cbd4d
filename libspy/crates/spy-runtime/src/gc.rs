//! GC Runtime - C FFI wrapper for spy-gc
//!
//! Owns the process-wide heap and exposes allocation, collection and root
//! registration to generated code. The heap is created lazily on first use
//! from `HeapConfig::from_env()`.

use crate::debug;
use crate::target::Target;
use parking_lot::Mutex;
use spy_gc::{DescriptorId, GcError, Heap, HeapConfig, ObjRef, ShadowFrame, TypeDescriptor};
use std::ffi::CStr;
use std::os::raw::c_char;

static HEAP: Mutex<Option<Heap>> = parking_lot::const_mutex(None);

/// Serializes tests that share the process heap
#[cfg(test)]
pub(crate) static TEST_LOCK: Mutex<()> = parking_lot::const_mutex(());

pub const SPY_OK: i32 = 0;
pub const SPY_ERR_OUT_OF_BOUNDS: i32 = 1;
pub const SPY_ERR_INVALID_UTF8: i32 = 2;
pub const SPY_ERR_NOT_CHAR_BOUNDARY: i32 = 3;
pub const SPY_ERR_NULL: i32 = 4;

/// Run `f` against the process heap, creating it on first use
///
/// Must not be re-entered from inside `f`.
pub fn with_heap<T>(f: impl FnOnce(&mut Heap) -> T) -> T {
    let mut guard = HEAP.lock();
    let heap = guard.get_or_insert_with(|| {
        Heap::new(HeapConfig::from_env()).unwrap_or_else(|e| fatal(&e))
    });
    f(heap)
}

/// Report `err` through the debug bridge and terminate
pub fn fatal(err: &GcError) -> ! {
    debug::panic_message(&err.to_string());
    std::process::abort()
}

/// Map a value-level error to its status code; anything else is fatal
pub(crate) fn status_of(err: GcError) -> i32 {
    match err {
        GcError::OutOfBounds { .. } | GcError::IndexOutOfBounds { .. } => SPY_ERR_OUT_OF_BOUNDS,
        GcError::InvalidUtf8 { .. } => SPY_ERR_INVALID_UTF8,
        GcError::NotCharBoundary { .. } => SPY_ERR_NOT_CHAR_BOUNDARY,
        other => fatal(&other),
    }
}

/// Write a successful result through `out`, or return the error status
///
/// # Safety
/// `out` must be null or valid for a write of `T`.
pub(crate) unsafe fn complete<T>(result: spy_gc::Result<T>, out: *mut T) -> i32 {
    if out.is_null() {
        return SPY_ERR_NULL;
    }
    match result {
        Ok(value) => {
            out.write(value);
            SPY_OK
        }
        Err(e) => status_of(e),
    }
}

/// Reference argument from generated code; null is fatal
pub(crate) fn obj_arg(ptr: *const u8) -> ObjRef {
    ObjRef::new(ptr as usize).unwrap_or_else(|| fatal(&GcError::InvalidReference { address: 0 }))
}

#[no_mangle]
pub extern "C" fn spy_runtime_init() -> bool {
    debug::install_logger();
    with_heap(|heap| {
        log::info!(
            "libspy runtime on {}: heap {:#x}..{:#x}",
            Target::current(),
            heap.start(),
            heap.end()
        );
    });
    true
}

/// Drop the process heap; every outstanding reference becomes invalid
#[no_mangle]
pub extern "C" fn spy_runtime_shutdown() {
    let heap = HEAP.lock().take();
    if let Some(heap) = heap {
        log::debug!("libspy shutdown after {} collections", heap.stats().cycles());
    }
}

/// Register a fixed-size type; returns its id, or 0 for an invalid layout
///
/// # Safety
/// `ref_offsets` must point at `ref_count` readable words (may be null when
/// `ref_count` is 0).
#[no_mangle]
pub unsafe extern "C" fn spy_gc_register_type(
    payload_size: usize,
    ref_offsets: *const usize,
    ref_count: usize,
) -> u32 {
    let offsets = if ref_count == 0 {
        &[][..]
    } else if ref_offsets.is_null() {
        return 0;
    } else {
        std::slice::from_raw_parts(ref_offsets, ref_count)
    };

    let result = TypeDescriptor::fixed("generated", payload_size, offsets)
        .and_then(|descriptor| with_heap(|heap| heap.register_type(descriptor)));
    match result {
        Ok(id) => id.index(),
        Err(e) => {
            log::warn!("spy_gc_register_type failed: {}", e);
            0
        }
    }
}

/// Allocate a zeroed object; `length` is the element count of variable types
#[no_mangle]
pub extern "C" fn spy_gc_alloc(type_id: u32, length: usize) -> *mut u8 {
    let id = DescriptorId::new(type_id).unwrap_or_else(|| fatal(&GcError::UnknownDescriptor(0)));
    with_heap(|heap| heap.allocate(id, length))
        .unwrap_or_else(|e| fatal(&e))
        .as_ptr()
}

/// Allocate `size` bytes of zeroed, untraced memory
#[no_mangle]
pub extern "C" fn spy_gc_alloc_mem(size: usize) -> *mut u8 {
    with_heap(|heap| heap.allocate_blob(size))
        .unwrap_or_else(|e| fatal(&e))
        .as_ptr()
}

#[no_mangle]
pub extern "C" fn spy_gc_collect() {
    let report = with_heap(|heap| heap.collect()).unwrap_or_else(|e| fatal(&e));
    log::debug!(
        "collected {} objects ({} bytes)",
        report.reclaimed_objects,
        report.reclaimed_bytes
    );
}

/// Install the innermost shadow frame, or null when no frame is active
///
/// # Safety
/// Every frame in the chain must stay valid until it is replaced.
#[no_mangle]
pub unsafe extern "C" fn spy_gc_set_shadow_stack(top: *const ShadowFrame) {
    with_heap(|heap| heap.roots_mut().set_shadow_stack(top));
}

/// Register a global slot holding a reference (or 0)
///
/// # Safety
/// `slot` must stay readable until unregistered.
#[no_mangle]
pub unsafe extern "C" fn spy_gc_register_root(slot: *const usize) {
    if slot.is_null() {
        fatal(&GcError::InvalidReference { address: 0 });
    }
    with_heap(|heap| heap.roots_mut().register_global(slot));
}

#[no_mangle]
pub extern "C" fn spy_gc_unregister_root(slot: *const usize) -> bool {
    with_heap(|heap| heap.roots_mut().unregister_global(slot))
}

/// Report `msg` and terminate
///
/// # Safety
/// `msg` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn spy_panic(msg: *const c_char) -> ! {
    if msg.is_null() {
        debug::panic_message("explicit panic");
    } else {
        debug::panic_message(&CStr::from_ptr(msg).to_string_lossy());
    }
    std::process::abort()
}
