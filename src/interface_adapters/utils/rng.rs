use std::{
    sync::{
        OnceLock,
        atomic::{AtomicU64, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// Seed for a new match's shared random source.
///
/// Only the host calls this; every other participant receives the value in the
/// starting conditions. Successive calls in one process never repeat.
pub fn new_match_seed() -> u32 {
    static COUNTER: OnceLock<AtomicU64> = OnceLock::new();
    let counter = COUNTER.get_or_init(|| AtomicU64::new(now_nanos()));
    let n = counter.fetch_add(1, Ordering::Relaxed);
    // Fold the high bits in so close timestamps still give distant seeds.
    (n ^ (n >> 32)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_called_twice_then_seeds_differ() {
        assert_ne!(new_match_seed(), new_match_seed());
    }
}
