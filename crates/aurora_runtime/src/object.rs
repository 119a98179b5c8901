//! Class-instance allocation.
//!
//! An object is a single block: the header followed immediately by the
//! instance's field storage, so generated code can address fields at
//! fixed offsets from the object pointer and the reference-counting
//! entry points find the header at the base.

use libc::c_void;

use crate::header::{AuroraHeader, TYPE_TAG_OBJECT};

/// Allocate an object with `size` bytes of zeroed field storage after
/// the header; the count starts at 1 and the tag is `object`.
#[no_mangle]
pub extern "C" fn aurora_object_create(size: i64) -> *mut c_void {
    let header_size = std::mem::size_of::<AuroraHeader>();
    let total = header_size + size as usize;

    let ptr = crate::aurora_malloc(total);
    unsafe {
        *(ptr as *mut AuroraHeader) = AuroraHeader::new(TYPE_TAG_OBJECT);
        if size > 0 {
            std::ptr::write_bytes((ptr as *mut u8).add(header_size), 0, size as usize);
        }
    }
    ptr
}

/// Free an object allocated by [`aurora_object_create`] (or by
/// generated code with the same single-block layout).
///
/// # Safety
/// `obj` must be null or an unfreed object base pointer.
#[no_mangle]
pub unsafe extern "C" fn aurora_object_free(obj: *mut c_void) {
    if !obj.is_null() {
        unsafe { libc::free(obj) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_starts_tagged_and_zeroed() {
        unsafe {
            let obj = aurora_object_create(24);
            let header = &*(obj as *const AuroraHeader);
            assert_eq!(header.ref_count, 1);
            assert_eq!(header.type_tag, TYPE_TAG_OBJECT);

            let fields = (obj as *const u8).add(std::mem::size_of::<AuroraHeader>());
            for i in 0..24 {
                assert_eq!(*fields.add(i), 0);
            }
            aurora_object_free(obj);
        }
    }

    #[test]
    fn zero_sized_object_is_fine() {
        unsafe {
            let obj = aurora_object_create(0);
            assert!(!obj.is_null());
            aurora_object_free(obj);
        }
    }
}
