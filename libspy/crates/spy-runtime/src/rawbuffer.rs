//! RawBuffer Runtime - C entry points for growable byte buffers
//!
//! `spy_rawbuffer_append` may return a different buffer than it was given;
//! generated code must store the result back into its slot.

use crate::gc::{complete, fatal, obj_arg, status_of, with_heap, SPY_OK};
use crate::string::input_bytes;
use spy_gc::{Heap, RawBuffer};

fn buffer_arg(heap: &Heap, ptr: *const u8) -> RawBuffer {
    RawBuffer::from_ref(heap, obj_arg(ptr)).unwrap_or_else(|e| fatal(&e))
}

fn status(result: spy_gc::Result<()>) -> i32 {
    match result {
        Ok(()) => SPY_OK,
        Err(e) => status_of(e),
    }
}

/// Empty buffer with room for `capacity` bytes
#[no_mangle]
pub extern "C" fn spy_rawbuffer_new(capacity: usize) -> *mut u8 {
    with_heap(|heap| RawBuffer::new(heap, capacity))
        .unwrap_or_else(|e| fatal(&e))
        .obj()
        .as_ptr()
}

/// Append `len` bytes, returning the buffer that now holds them
///
/// # Safety
/// `data` must be readable for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn spy_rawbuffer_append(buf: *const u8, data: *const u8, len: usize) -> *mut u8 {
    // copied out first: `data` may live in the old buffer
    let bytes = input_bytes(data, len)
        .unwrap_or_else(|| fatal(&spy_gc::GcError::InvalidReference { address: 0 }))
        .to_vec();
    with_heap(|heap| {
        let buf = buffer_arg(heap, buf);
        RawBuffer::append(heap, buf, &bytes)
    })
    .unwrap_or_else(|e| fatal(&e))
    .obj()
    .as_ptr()
}

/// Copy of bytes `start..end`
///
/// # Safety
/// `out` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn spy_rawbuffer_slice(
    buf: *const u8,
    start: usize,
    end: usize,
    out: *mut *mut u8,
) -> i32 {
    complete(
        with_heap(|heap| {
            let buf = buffer_arg(heap, buf);
            RawBuffer::slice(heap, buf, start, end).map(|r| r.obj().as_ptr())
        }),
        out,
    )
}

/// # Safety
/// `out` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn spy_rawbuffer_byte_at(buf: *const u8, index: usize, out: *mut u8) -> i32 {
    complete(with_heap(|heap| buffer_arg(heap, buf).byte_at(heap, index)), out)
}

#[no_mangle]
pub extern "C" fn spy_rawbuffer_set_byte(buf: *const u8, index: usize, value: u8) -> i32 {
    status(with_heap(|heap| buffer_arg(heap, buf).set_byte(heap, index, value)))
}

#[no_mangle]
pub extern "C" fn spy_rawbuffer_len(buf: *const u8) -> usize {
    with_heap(|heap| buffer_arg(heap, buf).len(heap)).unwrap_or_else(|e| fatal(&e))
}

#[no_mangle]
pub extern "C" fn spy_rawbuffer_capacity(buf: *const u8) -> usize {
    with_heap(|heap| buffer_arg(heap, buf).capacity(heap)).unwrap_or_else(|e| fatal(&e))
}

/// Little-endian `i32` at byte `offset`
///
/// # Safety
/// `out` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn spy_rawbuffer_get_i32(buf: *const u8, offset: usize, out: *mut i32) -> i32 {
    complete(with_heap(|heap| buffer_arg(heap, buf).get_i32(heap, offset)), out)
}

#[no_mangle]
pub extern "C" fn spy_rawbuffer_set_i32(buf: *const u8, offset: usize, value: i32) -> i32 {
    status(with_heap(|heap| buffer_arg(heap, buf).set_i32(heap, offset, value)))
}

/// Little-endian `f64` at byte `offset`
///
/// # Safety
/// `out` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn spy_rawbuffer_get_f64(buf: *const u8, offset: usize, out: *mut f64) -> i32 {
    complete(with_heap(|heap| buffer_arg(heap, buf).get_f64(heap, offset)), out)
}

#[no_mangle]
pub extern "C" fn spy_rawbuffer_set_f64(buf: *const u8, offset: usize, value: f64) -> i32 {
    status(with_heap(|heap| buffer_arg(heap, buf).set_f64(heap, offset, value)))
}
