// Path: crates/types/src/time.rs

//! Wall-clock helpers. All protocol timestamps are nanoseconds since the
//! Unix epoch.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in nanoseconds since the Unix epoch.
pub fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ns_is_monotone_enough() {
        let a = now_ns();
        let b = now_ns();
        assert!(b >= a);
        // Sanity: after 2020, before 2100.
        assert!(a > 1_577_836_800_000_000_000);
        assert!(a < 4_102_444_800_000_000_000);
    }
}
