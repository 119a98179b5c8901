//! File I/O.

use std::fs::OpenOptions;
use std::io::Write;

use libc::c_char;

use crate::{from_c_string, to_c_string};

/// Read a whole file; null on failure.
/// # Safety
/// `path` must be null or a valid NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn aurora_file_read(path: *const c_char) -> *mut c_char {
    let path = unsafe { from_c_string(path) };
    match std::fs::read_to_string(path) {
        Ok(contents) => to_c_string(&contents),
        Err(_) => std::ptr::null_mut(),
    }
}

/// # Safety
/// Both inputs must be null or valid NUL-terminated C strings.
#[no_mangle]
pub unsafe extern "C" fn aurora_file_write(path: *const c_char, content: *const c_char) -> bool {
    let (path, content) = unsafe { (from_c_string(path), from_c_string(content)) };
    std::fs::write(path, content).is_ok()
}

/// # Safety
/// Both inputs must be null or valid NUL-terminated C strings.
#[no_mangle]
pub unsafe extern "C" fn aurora_file_append(path: *const c_char, content: *const c_char) -> bool {
    let (path, content) = unsafe { (from_c_string(path), from_c_string(content)) };
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| file.write_all(content.as_bytes()))
        .is_ok()
}

/// # Safety
/// `path` must be null or a valid NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn aurora_file_exists(path: *const c_char) -> bool {
    std::path::Path::new(unsafe { from_c_string(path) }).exists()
}

/// # Safety
/// `path` must be null or a valid NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn aurora_file_delete(path: *const c_char) -> bool {
    std::fs::remove_file(unsafe { from_c_string(path) }).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::{CStr, CString};

    #[test]
    fn write_read_append_delete_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let c_path = CString::new(path.to_str().unwrap()).unwrap();

        unsafe {
            assert!(!aurora_file_exists(c_path.as_ptr()));

            let body = CString::new("line one\n").unwrap();
            assert!(aurora_file_write(c_path.as_ptr(), body.as_ptr()));
            assert!(aurora_file_exists(c_path.as_ptr()));

            let more = CString::new("line two\n").unwrap();
            assert!(aurora_file_append(c_path.as_ptr(), more.as_ptr()));

            let read = aurora_file_read(c_path.as_ptr());
            assert!(!read.is_null());
            assert_eq!(
                CStr::from_ptr(read).to_str().unwrap(),
                "line one\nline two\n"
            );
            libc::free(read as *mut libc::c_void);

            assert!(aurora_file_delete(c_path.as_ptr()));
            assert!(!aurora_file_exists(c_path.as_ptr()));
        }
    }

    #[test]
    fn reading_a_missing_file_returns_null() {
        let missing = CString::new("/definitely/not/here.txt").unwrap();
        unsafe {
            assert!(aurora_file_read(missing.as_ptr()).is_null());
            assert!(!aurora_file_delete(missing.as_ptr()));
        }
    }
}
