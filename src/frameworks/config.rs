use std::{env, time::Duration};

// Runtime/session constants (not simulation tuning).

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub fn host_port() -> u16 {
    parsed("LOCKSTEP_PORT", 40_000)
}

pub fn host_address() -> String {
    env::var("LOCKSTEP_HOST_ADDRESS").unwrap_or_else(|_| "127.0.0.1:40000".to_string())
}

pub fn participants() -> usize {
    parsed("LOCKSTEP_PARTICIPANTS", 2)
}

pub fn tick_length() -> Duration {
    Duration::from_millis(parsed("LOCKSTEP_TICK_MS", 100))
}

// 0 disables the setup timeout.
pub fn connection_timeout() -> Option<Duration> {
    match parsed("LOCKSTEP_CONNECTION_TIMEOUT_MS", 30_000u64) {
        0 => None,
        ms => Some(Duration::from_millis(ms)),
    }
}

pub fn poll_interval() -> Duration {
    Duration::from_millis(parsed("LOCKSTEP_POLL_INTERVAL_MS", 1))
}

// 0 plays until a participant fails.
pub fn match_ticks() -> u64 {
    parsed("LOCKSTEP_MATCH_TICKS", 600)
}

pub const MACHINES_PER_PLAYER: u8 = 2;
pub const DIGEST_EVERY_TICKS: u64 = 50;
