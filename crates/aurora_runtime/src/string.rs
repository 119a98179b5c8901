//! String heap object.

use libc::{c_char, c_void};

use crate::header::{AuroraHeader, TYPE_TAG_STRING};

/// `{ header, i64 length, char* data }` with a NUL-terminated copy of
/// the source bytes.
#[repr(C)]
pub struct AuroraString {
    pub header: AuroraHeader,
    pub length: i64,
    pub data: *mut c_char,
}

/// Copy a C string into a fresh runtime string object; a null input
/// yields an empty string.
///
/// # Safety
/// `text` must be null or a valid NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn aurora_string_create(text: *const c_char) -> *mut AuroraString {
    let length = if text.is_null() {
        0
    } else {
        unsafe { libc::strlen(text) }
    };

    let string = crate::aurora_malloc(std::mem::size_of::<AuroraString>()) as *mut AuroraString;
    let data = crate::aurora_malloc(length + 1) as *mut c_char;

    unsafe {
        if length > 0 {
            std::ptr::copy_nonoverlapping(text, data, length);
        }
        *data.add(length) = 0;

        (*string).header = AuroraHeader::new(TYPE_TAG_STRING);
        (*string).length = length as i64;
        (*string).data = data;
    }
    string
}

/// Free a runtime string and its character data.
///
/// # Safety
/// `string` must be null or an unfreed pointer from
/// [`aurora_string_create`].
#[no_mangle]
pub unsafe extern "C" fn aurora_string_free(string: *mut AuroraString) {
    if string.is_null() {
        return;
    }
    unsafe {
        if !(*string).data.is_null() {
            libc::free((*string).data as *mut c_void);
        }
        libc::free(string as *mut c_void);
    }
}

/// Length in bytes; 0 for null.
///
/// # Safety
/// `string` must be null or a live string object.
#[no_mangle]
pub unsafe extern "C" fn aurora_string_length(string: *mut AuroraString) -> i64 {
    if string.is_null() {
        return 0;
    }
    unsafe { (*string).length }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn create_copies_and_terminates() {
        unsafe {
            let s = aurora_string_create(b"aurora\0".as_ptr() as *const c_char);
            assert_eq!(aurora_string_length(s), 6);
            assert_eq!(
                CStr::from_ptr((*s).data).to_str().unwrap(),
                "aurora"
            );
            assert_eq!((*s).header.type_tag, TYPE_TAG_STRING);
            aurora_string_free(s);
        }
    }

    #[test]
    fn null_input_makes_empty_string() {
        unsafe {
            let s = aurora_string_create(std::ptr::null());
            assert_eq!(aurora_string_length(s), 0);
            assert_eq!(*(*s).data, 0);
            aurora_string_free(s);
        }
    }
}
