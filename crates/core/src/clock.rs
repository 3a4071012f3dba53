//! Process-wide monotonic microsecond clock.
//!
//! Transaction ids and block timestamps are both drawn from here, so within
//! one process every transaction is stamped strictly before the block that
//! later includes it, and block timestamps strictly increase.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static LAST_ISSUED: AtomicU64 = AtomicU64::new(0);

/// Current wall-clock time in microseconds since the Unix epoch.
pub fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// Next timestamp, strictly greater than every value returned before.
pub fn next_micros() -> u64 {
    let now = now_micros();
    let previous = match LAST_ISSUED.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
        Some(now.max(last + 1))
    }) {
        Ok(prev) | Err(prev) => prev,
    };
    now.max(previous + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strictly_increasing() {
        let mut last = next_micros();
        for _ in 0..1_000 {
            let next = next_micros();
            assert!(next > last);
            last = next;
        }
    }

    #[test]
    fn test_not_behind_wall_clock() {
        let wall = now_micros();
        assert!(next_micros() >= wall);
    }

    #[test]
    fn test_unique_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| (0..250).map(|_| next_micros()).collect::<Vec<_>>()))
            .collect();

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let total = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), total);
    }
}
