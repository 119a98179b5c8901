//! String operations.
//!
//! All functions accept NUL-terminated C strings and return fresh
//! `malloc`-owned buffers where a new string is produced.

use libc::c_char;

use crate::{from_c_string, to_c_string};

/// # Safety
/// Both inputs must be null or valid NUL-terminated C strings.
#[no_mangle]
pub unsafe extern "C" fn aurora_string_concat(a: *const c_char, b: *const c_char) -> *mut c_char {
    let joined = format!("{}{}", unsafe { from_c_string(a) }, unsafe {
        from_c_string(b)
    });
    to_c_string(&joined)
}

/// Lexicographic comparison: negative, zero or positive.
/// # Safety
/// Both inputs must be null or valid NUL-terminated C strings.
#[no_mangle]
pub unsafe extern "C" fn aurora_string_compare(a: *const c_char, b: *const c_char) -> i64 {
    let (a, b) = (unsafe { from_c_string(a) }, unsafe { from_c_string(b) });
    match a.cmp(b) {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    }
}

/// # Safety
/// Both inputs must be null or valid NUL-terminated C strings.
#[no_mangle]
pub unsafe extern "C" fn aurora_string_equals(a: *const c_char, b: *const c_char) -> bool {
    unsafe { from_c_string(a) == from_c_string(b) }
}

/// Substring over the byte range `[start, end)`, clamped to the string.
/// # Safety
/// `s` must be null or a valid NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn aurora_string_substring(
    s: *const c_char,
    start: i64,
    end: i64,
) -> *mut c_char {
    let s = unsafe { from_c_string(s) };
    let len = s.len() as i64;
    let start = start.clamp(0, len) as usize;
    let end = end.clamp(0, len) as usize;
    if start >= end {
        return to_c_string("");
    }
    to_c_string(s.get(start..end).unwrap_or(""))
}

/// # Safety
/// Both inputs must be null or valid NUL-terminated C strings.
#[no_mangle]
pub unsafe extern "C" fn aurora_string_contains(
    haystack: *const c_char,
    needle: *const c_char,
) -> bool {
    unsafe { from_c_string(haystack).contains(from_c_string(needle)) }
}

/// # Safety
/// `s` must be null or a valid NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn aurora_string_to_upper(s: *const c_char) -> *mut c_char {
    to_c_string(&unsafe { from_c_string(s) }.to_uppercase())
}

/// # Safety
/// `s` must be null or a valid NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn aurora_string_to_lower(s: *const c_char) -> *mut c_char {
    to_c_string(&unsafe { from_c_string(s) }.to_lowercase())
}

/// # Safety
/// `s` must be null or a valid NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn aurora_string_trim(s: *const c_char) -> *mut c_char {
    to_c_string(unsafe { from_c_string(s) }.trim())
}

/// # Safety
/// All inputs must be null or valid NUL-terminated C strings.
#[no_mangle]
pub unsafe extern "C" fn aurora_string_replace(
    s: *const c_char,
    from: *const c_char,
    to: *const c_char,
) -> *mut c_char {
    let (s, from, to) = unsafe { (from_c_string(s), from_c_string(from), from_c_string(to)) };
    if from.is_empty() {
        return to_c_string(s);
    }
    to_c_string(&s.replace(from, to))
}

/// Parse a leading decimal integer: optional whitespace and sign, then
/// digits; 0 when no digits are present.
/// # Safety
/// `s` must be null or a valid NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn aurora_string_to_int(s: *const c_char) -> i64 {
    let s = unsafe { from_c_string(s) }.trim_start();
    let (sign, rest) = match s.as_bytes().first() {
        Some(b'-') => (-1i64, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<i64>().map(|v| sign * v).unwrap_or(0)
}

/// # Safety
/// `s` must be null or a valid NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn aurora_string_to_double(s: *const c_char) -> f64 {
    unsafe { from_c_string(s) }.trim().parse().unwrap_or(0.0)
}

#[no_mangle]
pub extern "C" fn aurora_int_to_string(value: i64) -> *mut c_char {
    to_c_string(&value.to_string())
}

#[no_mangle]
pub extern "C" fn aurora_double_to_string(value: f64) -> *mut c_char {
    to_c_string(&value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::{CStr, CString};

    fn c(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    unsafe fn owned(ptr: *mut c_char) -> String {
        let s = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string();
        unsafe { libc::free(ptr as *mut libc::c_void) };
        s
    }

    #[test]
    fn concat_and_contains() {
        unsafe {
            let joined = aurora_string_concat(c("foo").as_ptr(), c("bar").as_ptr());
            assert_eq!(owned(joined), "foobar");
            assert!(aurora_string_contains(c("foobar").as_ptr(), c("oba").as_ptr()));
            assert!(!aurora_string_contains(c("foobar").as_ptr(), c("xyz").as_ptr()));
        }
    }

    #[test]
    fn compare_and_equals() {
        unsafe {
            assert_eq!(aurora_string_compare(c("a").as_ptr(), c("b").as_ptr()), -1);
            assert_eq!(aurora_string_compare(c("b").as_ptr(), c("a").as_ptr()), 1);
            assert_eq!(aurora_string_compare(c("a").as_ptr(), c("a").as_ptr()), 0);
            assert!(aurora_string_equals(c("same").as_ptr(), c("same").as_ptr()));
        }
    }

    #[test]
    fn substring_clamps() {
        unsafe {
            let s = c("aurora");
            assert_eq!(owned(aurora_string_substring(s.as_ptr(), 1, 4)), "uro");
            assert_eq!(owned(aurora_string_substring(s.as_ptr(), 0, 100)), "aurora");
            assert_eq!(owned(aurora_string_substring(s.as_ptr(), 4, 2)), "");
            assert_eq!(owned(aurora_string_substring(s.as_ptr(), -3, 2)), "au");
        }
    }

    #[test]
    fn case_trim_replace() {
        unsafe {
            assert_eq!(owned(aurora_string_to_upper(c("MiXeD").as_ptr())), "MIXED");
            assert_eq!(owned(aurora_string_to_lower(c("MiXeD").as_ptr())), "mixed");
            assert_eq!(owned(aurora_string_trim(c("  pad  ").as_ptr())), "pad");
            assert_eq!(
                owned(aurora_string_replace(
                    c("a-b-c").as_ptr(),
                    c("-").as_ptr(),
                    c("+").as_ptr()
                )),
                "a+b+c"
            );
        }
    }

    #[test]
    fn int_round_trip_on_decimal_strings() {
        // int_to_string . string_to_int is the identity on decimal
        // representations of 64-bit integers.
        for value in [0i64, 7, -42, 1_000_000_007, i64::MAX, i64::MIN + 1] {
            unsafe {
                let text = aurora_int_to_string(value);
                assert_eq!(aurora_string_to_int(text), value);
                libc::free(text as *mut libc::c_void);
            }
        }
    }

    #[test]
    fn to_int_parses_prefix() {
        unsafe {
            assert_eq!(aurora_string_to_int(c("  123abc").as_ptr()), 123);
            assert_eq!(aurora_string_to_int(c("-17").as_ptr()), -17);
            assert_eq!(aurora_string_to_int(c("abc").as_ptr()), 0);
            assert_eq!(aurora_string_to_double(c("2.5").as_ptr()), 2.5);
        }
    }
}
