//! Builtins - functions of the `builtins` module callable from SPy code
//!
//! Exported under their qualified SPy names (`spy_builtins$print_i32`, ...).

use crate::debug;
use crate::gc::{fatal, obj_arg, with_heap};
use spy_gc::SpyStr;

#[export_name = "spy_builtins$abs"]
pub extern "C" fn abs(x: i32) -> i32 {
    x.wrapping_abs()
}

#[export_name = "spy_builtins$print_i32"]
pub extern "C" fn print_i32(x: i32) {
    debug::write_line(&x.to_string());
}

#[export_name = "spy_builtins$print_f64"]
pub extern "C" fn print_f64(x: f64) {
    debug::write_line(&format_f64(x));
}

#[export_name = "spy_builtins$print_bool"]
pub extern "C" fn print_bool(x: bool) {
    debug::write_line(if x { "True" } else { "False" });
}

#[export_name = "spy_builtins$print_str"]
pub extern "C" fn print_str(s: *const u8) {
    let text = with_heap(|heap| {
        SpyStr::from_ref(heap, obj_arg(s))
            .and_then(|s| s.bytes(heap).map(|b| String::from_utf8_lossy(b).into_owned()))
    })
    .unwrap_or_else(|e| fatal(&e));
    debug::write_line(&text);
}

/// Float formatting that always shows a fractional part (`1.0`, not `1`)
pub fn format_f64(x: f64) -> String {
    if x.is_nan() {
        "nan".to_string()
    } else if x == f64::INFINITY {
        "inf".to_string()
    } else if x == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        format!("{:?}", x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gc::tests::fresh_runtime;
    use crate::string::spy_str_new;

    #[test]
    fn test_abs() {
        assert_eq!(abs(-5), 5);
        assert_eq!(abs(5), 5);
        assert_eq!(abs(0), 0);
        assert_eq!(abs(i32::MIN), i32::MIN);
    }

    #[test]
    fn test_format_f64() {
        assert_eq!(format_f64(1.0), "1.0");
        assert_eq!(format_f64(-0.5), "-0.5");
        assert_eq!(format_f64(0.1), "0.1");
        assert_eq!(format_f64(f64::NAN), "nan");
        assert_eq!(format_f64(f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn test_print_functions() {
        let _guard = fresh_runtime();
        let mut s = std::ptr::null_mut();
        let text = "printed from a test";
        unsafe { spy_str_new(text.as_ptr(), text.len(), &mut s) };

        print_i32(-3);
        print_f64(2.5);
        print_bool(true);
        print_str(s);
    }
}
