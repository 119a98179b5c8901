//! Time operations.

#[no_mangle]
pub extern "C" fn aurora_time_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[no_mangle]
pub extern "C" fn aurora_time_now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[no_mangle]
pub extern "C" fn aurora_sleep_millis(millis: i64) {
    if millis > 0 {
        std::thread::sleep(std::time::Duration::from_millis(millis as u64));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clocks_are_consistent() {
        let seconds = aurora_time_now();
        let millis = aurora_time_now_millis();
        assert!(seconds > 0);
        // Within a couple of seconds of each other.
        assert!((millis / 1000 - seconds).abs() <= 2);
    }

    #[test]
    fn negative_sleep_is_a_no_op() {
        aurora_sleep_millis(-5);
        aurora_sleep_millis(0);
    }
}
