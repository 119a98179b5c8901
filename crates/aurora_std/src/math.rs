//! Mathematical operations.

use std::cell::Cell;

use libc::c_double;

#[no_mangle]
pub extern "C" fn aurora_sin(x: c_double) -> c_double {
    x.sin()
}

#[no_mangle]
pub extern "C" fn aurora_cos(x: c_double) -> c_double {
    x.cos()
}

#[no_mangle]
pub extern "C" fn aurora_tan(x: c_double) -> c_double {
    x.tan()
}

#[no_mangle]
pub extern "C" fn aurora_asin(x: c_double) -> c_double {
    x.asin()
}

#[no_mangle]
pub extern "C" fn aurora_acos(x: c_double) -> c_double {
    x.acos()
}

#[no_mangle]
pub extern "C" fn aurora_atan(x: c_double) -> c_double {
    x.atan()
}

#[no_mangle]
pub extern "C" fn aurora_atan2(y: c_double, x: c_double) -> c_double {
    y.atan2(x)
}

#[no_mangle]
pub extern "C" fn aurora_exp(x: c_double) -> c_double {
    x.exp()
}

#[no_mangle]
pub extern "C" fn aurora_log(x: c_double) -> c_double {
    x.ln()
}

#[no_mangle]
pub extern "C" fn aurora_log10(x: c_double) -> c_double {
    x.log10()
}

#[no_mangle]
pub extern "C" fn aurora_pow(base: c_double, exponent: c_double) -> c_double {
    base.powf(exponent)
}

#[no_mangle]
pub extern "C" fn aurora_sqrt(x: c_double) -> c_double {
    x.sqrt()
}

#[no_mangle]
pub extern "C" fn aurora_floor(x: c_double) -> c_double {
    x.floor()
}

#[no_mangle]
pub extern "C" fn aurora_ceil(x: c_double) -> c_double {
    x.ceil()
}

#[no_mangle]
pub extern "C" fn aurora_round(x: c_double) -> c_double {
    x.round()
}

// The generated program is single-threaded, so a thread-local LCG is
// all the randomness plumbing we need.
thread_local! {
    static RANDOM_STATE: Cell<u64> = const { Cell::new(0x9E3779B97F4A7C15) };
}

fn next_random() -> u64 {
    RANDOM_STATE.with(|state| {
        let mut x = state.get();
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        state.set(x);
        x
    })
}

#[no_mangle]
pub extern "C" fn aurora_random_seed(seed: i64) {
    RANDOM_STATE.with(|state| state.set((seed as u64) | 1));
}

/// Uniform integer in `[min, max]` (bounds swapped if reversed).
#[no_mangle]
pub extern "C" fn aurora_random_int(min: i64, max: i64) -> i64 {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    let span = (hi - lo) as u64 + 1;
    lo + (next_random() % span) as i64
}

#[no_mangle]
pub extern "C" fn aurora_random_double() -> c_double {
    (next_random() >> 11) as f64 / (1u64 << 53) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_identities() {
        assert_eq!(aurora_sqrt(16.0), 4.0);
        assert_eq!(aurora_pow(2.0, 10.0), 1024.0);
        assert_eq!(aurora_floor(1.9), 1.0);
        assert_eq!(aurora_ceil(1.1), 2.0);
        assert_eq!(aurora_round(2.5), 3.0);
        assert!((aurora_sin(0.0)).abs() < 1e-12);
        assert!((aurora_atan2(1.0, 1.0) - std::f64::consts::FRAC_PI_4).abs() < 1e-12);
    }

    #[test]
    fn random_respects_bounds() {
        aurora_random_seed(7);
        for _ in 0..1000 {
            let v = aurora_random_int(3, 9);
            assert!((3..=9).contains(&v));
            let d = aurora_random_double();
            assert!((0.0..1.0).contains(&d));
        }
        // Degenerate and reversed ranges.
        assert_eq!(aurora_random_int(5, 5), 5);
        let v = aurora_random_int(9, 3);
        assert!((3..=9).contains(&v));
    }

    #[test]
    fn seeding_is_deterministic() {
        aurora_random_seed(1234);
        let a: Vec<i64> = (0..8).map(|_| aurora_random_int(0, 1000)).collect();
        aurora_random_seed(1234);
        let b: Vec<i64> = (0..8).map(|_| aurora_random_int(0, 1000)).collect();
        assert_eq!(a, b);
    }
}
