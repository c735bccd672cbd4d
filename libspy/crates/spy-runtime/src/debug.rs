//! Debug Bridge - console output and panic reporting
//!
//! On native and Emscripten builds libspy defines the `spy_debug_*`
//! symbols on top of the C runtime's `printf`. Under WASI the host
//! provides them as imports. Rust code in this crate only goes through
//! [`write_line`], [`log_i32`] and [`panic_message`].

use std::ffi::CString;
use std::os::raw::c_char;

#[cfg(not(feature = "wasi"))]
mod bridge {
    use std::os::raw::c_char;

    /// # Safety
    /// `s` must be null or a NUL-terminated string.
    #[no_mangle]
    pub unsafe extern "C" fn spy_debug_log(s: *const c_char) {
        if !s.is_null() {
            libc::printf(b"%s\n\0".as_ptr() as *const c_char, s);
        }
    }

    /// # Safety
    /// `s` must be null or a NUL-terminated string.
    #[no_mangle]
    pub unsafe extern "C" fn spy_debug_log_i32(s: *const c_char, n: i32) {
        if !s.is_null() {
            libc::printf(b"%s %d\n\0".as_ptr() as *const c_char, s, n);
        }
    }

    /// # Safety
    /// `s` must be null or a NUL-terminated string.
    #[no_mangle]
    pub unsafe extern "C" fn spy_debug_set_panic_message(s: *const c_char) {
        if !s.is_null() {
            libc::printf(b"PANIC: %s\n\0".as_ptr() as *const c_char, s);
            libc::fflush(std::ptr::null_mut());
        }
    }

    pub(super) fn flush() {
        // SAFETY: fflush(NULL) flushes every open output stream
        unsafe {
            libc::fflush(std::ptr::null_mut());
        }
    }
}

#[cfg(feature = "wasi")]
mod bridge {
    use std::os::raw::c_char;

    extern "C" {
        pub fn spy_debug_log(s: *const c_char);
        pub fn spy_debug_log_i32(s: *const c_char, n: i32);
        pub fn spy_debug_set_panic_message(s: *const c_char);
    }

    pub(super) fn flush() {}
}

pub use bridge::{spy_debug_log, spy_debug_log_i32, spy_debug_set_panic_message};

/// Convert for the bridge, cutting at the first interior NUL
fn to_cstring(text: &str) -> CString {
    match CString::new(text) {
        Ok(line) => line,
        Err(e) => {
            let cut = e.nul_position();
            let mut bytes = e.into_vec();
            bytes.truncate(cut);
            // SAFETY: truncated before the first NUL
            unsafe { CString::from_vec_unchecked(bytes) }
        }
    }
}

pub fn write_line(text: &str) {
    let line = to_cstring(text);
    // SAFETY: `line` is NUL-terminated and outlives the call
    unsafe { spy_debug_log(line.as_ptr() as *const c_char) }
}

pub fn log_i32(text: &str, n: i32) {
    let line = to_cstring(text);
    // SAFETY: as in write_line
    unsafe { spy_debug_log_i32(line.as_ptr() as *const c_char, n) }
}

pub fn panic_message(text: &str) {
    let line = to_cstring(text);
    // SAFETY: as in write_line
    unsafe { spy_debug_set_panic_message(line.as_ptr() as *const c_char) }
}

/// `log` backend that prints through the bridge
struct BridgeLogger;

impl log::Log for BridgeLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            write_line(&format!(
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            ));
        }
    }

    fn flush(&self) {
        bridge::flush();
    }
}

static LOGGER: BridgeLogger = BridgeLogger;

/// Parse a `SPY_LOG` value; unset or unknown means `Warn`
pub fn parse_level(value: Option<&str>) -> log::LevelFilter {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(log::LevelFilter::Warn)
}

/// Route `log` records to the bridge at the `SPY_LOG` level
///
/// Returns false when another logger was installed first.
pub fn install_logger() -> bool {
    let level = parse_level(std::env::var("SPY_LOG").ok().as_deref());
    match log::set_logger(&LOGGER) {
        Ok(()) => {
            log::set_max_level(level);
            true
        }
        Err(_) => false,
    }
}
