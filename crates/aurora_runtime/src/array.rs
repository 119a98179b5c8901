//! Array heap object: header + length + separately allocated data.

use libc::{c_char, c_void};

use crate::header::{AuroraHeader, TYPE_TAG_ARRAY};

/// `{ header, i64 length, ptr data }` — the runtime side of an Aurora
/// array. Generated code reads `length` and `data` through fixed field
/// offsets, so the layout is part of the ABI.
#[repr(C)]
pub struct AuroraArray {
    pub header: AuroraHeader,
    pub length: i64,
    pub data: *mut c_void,
}

/// Allocate an array of `element_count` slots of `element_size` bytes
/// each. The data is zero-initialized and the count starts at 1.
#[no_mangle]
pub extern "C" fn aurora_array_create(element_size: i64, element_count: i64) -> *mut AuroraArray {
    let array = crate::aurora_malloc(std::mem::size_of::<AuroraArray>()) as *mut AuroraArray;

    let data_bytes = (element_size * element_count) as usize;
    let data = if data_bytes > 0 {
        let data = crate::aurora_malloc(data_bytes);
        unsafe {
            std::ptr::write_bytes(data as *mut u8, 0, data_bytes);
        }
        data
    } else {
        std::ptr::null_mut()
    };

    unsafe {
        (*array).header = AuroraHeader::new(TYPE_TAG_ARRAY);
        (*array).length = element_count;
        (*array).data = data;
    }
    array
}

/// Free the data block and the array object itself.
///
/// # Safety
/// `array` must be null or a pointer returned by
/// [`aurora_array_create`] that has not been freed yet.
#[no_mangle]
pub unsafe extern "C" fn aurora_array_free(array: *mut AuroraArray) {
    if array.is_null() {
        return;
    }
    unsafe {
        if !(*array).data.is_null() {
            libc::free((*array).data);
        }
        libc::free(array as *mut c_void);
    }
}

/// Length of the array; 0 for null.
///
/// # Safety
/// `array` must be null or a live array object.
#[no_mangle]
pub unsafe extern "C" fn aurora_array_length(array: *mut AuroraArray) -> i64 {
    if array.is_null() {
        return 0;
    }
    unsafe { (*array).length }
}

/// Address of element `index`, assuming `element_size`-byte slots.
///
/// # Safety
/// `array` must be a live array object; the index is not range-checked
/// here (see [`aurora_array_bounds_check`]).
#[no_mangle]
pub unsafe extern "C" fn aurora_array_get_ptr(
    array: *mut AuroraArray,
    index: i64,
    element_size: i64,
) -> *mut c_void {
    unsafe {
        if array.is_null() || (*array).data.is_null() {
            crate::aurora_panic(b"Null array access\0".as_ptr() as *const c_char);
        }
        ((*array).data as *mut u8).offset((index * element_size) as isize) as *mut c_void
    }
}

/// Copy `element_size` bytes from `element` into slot `index`.
///
/// # Safety
/// `array` must be a live array object and `element` must point at
/// `element_size` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn aurora_array_set(
    array: *mut AuroraArray,
    index: i64,
    element: *const c_void,
    element_size: i64,
) {
    unsafe {
        let slot = aurora_array_get_ptr(array, index, element_size);
        std::ptr::copy_nonoverlapping(element as *const u8, slot as *mut u8, element_size as usize);
    }
}

/// Panic when `index` falls outside the array.
///
/// # Safety
/// `array` must be null or a live array object.
#[no_mangle]
pub unsafe extern "C" fn aurora_array_bounds_check(array: *mut AuroraArray, index: i64) {
    if array.is_null() {
        crate::aurora_panic(b"Null array in bounds check\0".as_ptr() as *const c_char);
    }
    let length = unsafe { (*array).length };
    if index < 0 || index >= length {
        let message = format!("Array index out of bounds: index={index}, length={length}\0");
        crate::aurora_panic(message.as_ptr() as *const c_char);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_set_get_round_trip() {
        unsafe {
            let array = aurora_array_create(8, 3);
            assert_eq!(aurora_array_length(array), 3);

            for (i, value) in [10i64, 20, 30].iter().enumerate() {
                aurora_array_set(
                    array,
                    i as i64,
                    value as *const i64 as *const c_void,
                    8,
                );
            }

            let slot = aurora_array_get_ptr(array, 1, 8) as *const i64;
            assert_eq!(*slot, 20);

            aurora_array_free(array);
        }
    }

    #[test]
    fn elements_start_zeroed() {
        unsafe {
            let array = aurora_array_create(8, 4);
            for i in 0..4 {
                let slot = aurora_array_get_ptr(array, i, 8) as *const i64;
                assert_eq!(*slot, 0);
            }
            aurora_array_free(array);
        }
    }

    #[test]
    fn empty_array_has_no_data() {
        unsafe {
            let array = aurora_array_create(8, 0);
            assert_eq!(aurora_array_length(array), 0);
            assert!((*array).data.is_null());
            aurora_array_free(array);
        }
    }

    #[test]
    fn header_tags_arrays() {
        unsafe {
            let array = aurora_array_create(1, 1);
            assert_eq!((*array).header.type_tag, TYPE_TAG_ARRAY);
            assert_eq!((*array).header.ref_count, 1);
            aurora_array_free(array);
        }
    }
}
