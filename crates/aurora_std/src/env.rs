//! Process environment.

use libc::c_char;

use crate::{from_c_string, to_c_string};

#[no_mangle]
pub extern "C" fn aurora_exit(code: i64) -> ! {
    std::process::exit(code as i32)
}

/// Value of an environment variable; null when unset.
/// # Safety
/// `name` must be null or a valid NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn aurora_get_env(name: *const c_char) -> *mut c_char {
    match std::env::var(unsafe { from_c_string(name) }) {
        Ok(value) => to_c_string(&value),
        Err(_) => std::ptr::null_mut(),
    }
}

#[no_mangle]
pub extern "C" fn aurora_arg_count() -> i64 {
    std::env::args().count() as i64
}

/// Argument at `index`; null when out of range.
#[no_mangle]
pub extern "C" fn aurora_arg_get(index: i64) -> *mut c_char {
    if index < 0 {
        return std::ptr::null_mut();
    }
    match std::env::args().nth(index as usize) {
        Some(arg) => to_c_string(&arg),
        None => std::ptr::null_mut(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::{CStr, CString};

    #[test]
    fn get_env_round_trips_a_set_variable() {
        std::env::set_var("AURORA_STD_TEST_VAR", "on");
        let name = CString::new("AURORA_STD_TEST_VAR").unwrap();
        unsafe {
            let value = aurora_get_env(name.as_ptr());
            assert!(!value.is_null());
            assert_eq!(CStr::from_ptr(value).to_str().unwrap(), "on");
            libc::free(value as *mut libc::c_void);
        }

        let missing = CString::new("AURORA_STD_DEFINITELY_UNSET").unwrap();
        unsafe {
            assert!(aurora_get_env(missing.as_ptr()).is_null());
        }
    }

    #[test]
    fn args_are_reachable() {
        assert!(aurora_arg_count() >= 1);
        let first = aurora_arg_get(0);
        assert!(!first.is_null());
        unsafe { libc::free(first as *mut libc::c_void) };
        assert!(aurora_arg_get(-1).is_null());
        assert!(aurora_arg_get(1_000_000).is_null());
    }
}
