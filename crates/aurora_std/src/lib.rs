//! Aurora standard library.
//!
//! Pure C-ABI functions resolved into the JIT at link time. The same
//! implementations back both the `aurora_` and `auroraStd_` symbol
//! prefixes; the compiler maps either spelling to these addresses.
//!
//! Strings cross the boundary as NUL-terminated C strings; functions
//! that produce a new string return a `malloc`-owned buffer.

pub mod env;
pub mod fs;
pub mod io;
pub mod math;
pub mod string;
pub mod time;

pub use env::*;
pub use fs::*;
pub use io::*;
pub use math::*;
pub use string::*;
pub use time::*;

use libc::c_char;

/// Copy a Rust string into a `malloc`-owned, NUL-terminated buffer.
pub(crate) fn to_c_string(s: &str) -> *mut c_char {
    let bytes = s.as_bytes();
    unsafe {
        let buf = libc::malloc(bytes.len() + 1) as *mut c_char;
        if buf.is_null() {
            return std::ptr::null_mut();
        }
        std::ptr::copy_nonoverlapping(bytes.as_ptr() as *const c_char, buf, bytes.len());
        *buf.add(bytes.len()) = 0;
        buf
    }
}

/// Borrow a C string as `&str`; empty for null or invalid UTF-8.
pub(crate) unsafe fn from_c_string<'a>(s: *const c_char) -> &'a str {
    if s.is_null() {
        return "";
    }
    unsafe { std::ffi::CStr::from_ptr(s) }.to_str().unwrap_or("")
}
