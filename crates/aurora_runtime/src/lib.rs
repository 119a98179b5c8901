//! Aurora runtime layer.
//!
//! C-callable heap primitives for generated code: arrays, objects and
//! strings, all managed by reference counting. Every heap object leads
//! with the `AuroraHeader` (count + type tag); `aurora_release`
//! dispatches to the type-specific free when the count reaches zero.
//!
//! The generated program runs on the calling thread after compilation,
//! so reference counts are plain integers rather than atomics.

pub mod array;
pub mod header;
pub mod object;
pub mod rc;
pub mod string;

pub use array::{
    AuroraArray, aurora_array_bounds_check, aurora_array_create, aurora_array_free,
    aurora_array_get_ptr, aurora_array_length, aurora_array_set,
};
pub use header::{AuroraHeader, TYPE_TAG_ARRAY, TYPE_TAG_OBJECT, TYPE_TAG_STRING};
pub use object::{aurora_object_create, aurora_object_free};
pub use rc::{aurora_get_ref_count, aurora_release, aurora_retain};
pub use string::{AuroraString, aurora_string_create, aurora_string_free, aurora_string_length};

use std::ffi::CStr;
use std::io::Write;

use libc::{c_char, c_void, size_t};

// ===== Raw memory =====

/// Allocate `size` bytes; panics the runtime on exhaustion.
#[no_mangle]
pub extern "C" fn aurora_malloc(size: size_t) -> *mut c_void {
    let ptr = unsafe { libc::malloc(size) };
    if ptr.is_null() && size > 0 {
        aurora_panic(b"Memory allocation failed\0".as_ptr() as *const c_char);
    }
    ptr
}

/// Free memory obtained from [`aurora_malloc`]; null is a no-op.
#[no_mangle]
pub extern "C" fn aurora_free(ptr: *mut c_void) {
    if !ptr.is_null() {
        unsafe { libc::free(ptr) };
    }
}

// ===== Failure reporting =====

/// Abort with a message when `condition` is false.
#[no_mangle]
pub extern "C" fn aurora_assert(condition: i64, message: *const c_char) {
    if condition == 0 {
        aurora_panic(message);
    }
}

/// Print a runtime panic message to stderr and abort the process.
#[no_mangle]
pub extern "C" fn aurora_panic(message: *const c_char) -> ! {
    let text = if message.is_null() {
        "<no message>"
    } else {
        unsafe { CStr::from_ptr(message) }
            .to_str()
            .unwrap_or("<invalid message>")
    };
    let _ = writeln!(std::io::stderr(), "\n[Aurora Runtime Panic] {text}");
    std::process::abort();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malloc_free_round_trip() {
        let p = aurora_malloc(64);
        assert!(!p.is_null());
        unsafe {
            std::ptr::write_bytes(p as *mut u8, 0xAB, 64);
        }
        aurora_free(p);
        // Freeing null must be harmless.
        aurora_free(std::ptr::null_mut());
    }

    #[test]
    fn assert_passes_on_truthy_condition() {
        aurora_assert(1, b"never shown\0".as_ptr() as *const c_char);
        aurora_assert(-7, std::ptr::null());
    }
}
