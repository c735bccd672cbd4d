//! String Runtime - C entry points for `str`
//!
//! A string reference points at `{length, utf8[]}`. Operations that cannot
//! fail for well-formed programs return the result directly; slicing and
//! construction from raw bytes return a status code.

use crate::gc::{complete, fatal, obj_arg, with_heap, SPY_ERR_NULL};
use spy_gc::{Heap, SpyStr};

fn str_arg(heap: &Heap, ptr: *const u8) -> SpyStr {
    SpyStr::from_ref(heap, obj_arg(ptr)).unwrap_or_else(|e| fatal(&e))
}

/// Bytes of a (possibly null, possibly empty) C buffer
///
/// # Safety
/// Non-null `data` must be readable for `len` bytes.
pub(crate) unsafe fn input_bytes<'a>(data: *const u8, len: usize) -> Option<&'a [u8]> {
    if len == 0 {
        Some(&[])
    } else if data.is_null() {
        None
    } else {
        Some(std::slice::from_raw_parts(data, len))
    }
}

/// Build a string from UTF-8 bytes
///
/// # Safety
/// `bytes` must be readable for `len` bytes; `out` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn spy_str_new(bytes: *const u8, len: usize, out: *mut *mut u8) -> i32 {
    let Some(data) = input_bytes(bytes, len) else {
        return SPY_ERR_NULL;
    };
    let data = data.to_vec();
    complete(
        with_heap(|heap| SpyStr::new(heap, &data).map(|s| s.obj().as_ptr())),
        out,
    )
}

#[no_mangle]
pub extern "C" fn spy_str_add(a: *const u8, b: *const u8) -> *mut u8 {
    with_heap(|heap| {
        let (a, b) = (str_arg(heap, a), str_arg(heap, b));
        SpyStr::concat(heap, a, b)
    })
    .unwrap_or_else(|e| fatal(&e))
    .obj()
    .as_ptr()
}

/// `s * n`; a non-positive count gives the empty string
#[no_mangle]
pub extern "C" fn spy_str_mul(s: *const u8, n: i32) -> *mut u8 {
    with_heap(|heap| {
        let s = str_arg(heap, s);
        SpyStr::repeat(heap, s, i64::from(n))
    })
    .unwrap_or_else(|e| fatal(&e))
    .obj()
    .as_ptr()
}

#[no_mangle]
pub extern "C" fn spy_str_eq(a: *const u8, b: *const u8) -> bool {
    with_heap(|heap| SpyStr::equals(heap, str_arg(heap, a), str_arg(heap, b)))
        .unwrap_or_else(|e| fatal(&e))
}

#[no_mangle]
pub extern "C" fn spy_str_ne(a: *const u8, b: *const u8) -> bool {
    with_heap(|heap| SpyStr::not_equals(heap, str_arg(heap, a), str_arg(heap, b)))
        .unwrap_or_else(|e| fatal(&e))
}

/// Length in bytes
#[no_mangle]
pub extern "C" fn spy_str_len(s: *const u8) -> usize {
    with_heap(|heap| str_arg(heap, s).len(heap)).unwrap_or_else(|e| fatal(&e))
}

/// Copy of bytes `start..end`
///
/// # Safety
/// `out` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn spy_str_slice(
    s: *const u8,
    start: usize,
    end: usize,
    out: *mut *mut u8,
) -> i32 {
    complete(
        with_heap(|heap| {
            let s = str_arg(heap, s);
            SpyStr::slice(heap, s, start, end).map(|r| r.obj().as_ptr())
        }),
        out,
    )
}

/// Pointer to the UTF-8 bytes (not NUL-terminated), valid until the string
/// is collected
///
/// # Safety
/// `out_len` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn spy_str_utf8(s: *const u8, out_len: *mut usize) -> *const u8 {
    let (ptr, len) = with_heap(|heap| {
        str_arg(heap, s)
            .bytes(heap)
            .map(|bytes| (bytes.as_ptr(), bytes.len()))
    })
    .unwrap_or_else(|e| fatal(&e));
    if !out_len.is_null() {
        out_len.write(len);
    }
    ptr
}
