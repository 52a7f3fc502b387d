//! Snowflake ID Generator
//!
//! Twitter-style distributed unique ID generation. Every CRM record except
//! refresh-token sessions is keyed by one of these.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Default epoch (2024-01-01T00:00:00.000Z)
pub const DEFAULT_EPOCH: u64 = 1704067200000;

/// Snowflake ID generator
pub struct SnowflakeGenerator {
    epoch: u64,
    machine_id: u64,
    node_id: u64,
    /// High 42 bits: last timestamp, low 12 bits: sequence
    state: AtomicU64,
}

impl SnowflakeGenerator {
    /// Create a new snowflake generator using the default epoch
    pub fn new(machine_id: u64, node_id: u64) -> Self {
        Self::with_epoch(DEFAULT_EPOCH, machine_id, node_id)
    }

    /// Create a generator with a custom epoch in milliseconds
    pub fn with_epoch(epoch: u64, machine_id: u64, node_id: u64) -> Self {
        Self {
            epoch,
            machine_id: machine_id & 0x1F, // 5 bits
            node_id: node_id & 0x1F,       // 5 bits
            state: AtomicU64::new(0),
        }
    }

    /// Generate a new snowflake ID
    pub fn generate(&self) -> i64 {
        loop {
            let now = current_timestamp().saturating_sub(self.epoch);
            let prev = self.state.load(Ordering::SeqCst);
            let prev_ts = prev >> 12;
            let prev_seq = prev & 0xFFF;

            let (ts, seq) = if now > prev_ts {
                (now, 0)
            } else if prev_seq < 0xFFF {
                // Same millisecond (or clock went backwards): keep the last timestamp
                (prev_ts, prev_seq + 1)
            } else {
                // Sequence exhausted for this millisecond, borrow the next one
                (prev_ts + 1, 0)
            };

            let next = (ts << 12) | seq;
            if self
                .state
                .compare_exchange(prev, next, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                let id = (ts << 22) | (self.machine_id << 17) | (self.node_id << 12) | seq;
                return id as i64;
            }
        }
    }

    /// Extract the creation timestamp (Unix ms) from an ID made by this generator
    pub fn extract_timestamp(&self, snowflake: i64) -> u64 {
        ((snowflake as u64) >> 22) + self.epoch
    }
}

/// Get current timestamp in milliseconds
fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Parse snowflake from string (IDs travel as strings in JSON)
pub fn from_string(s: &str) -> Result<i64, std::num::ParseIntError> {
    s.trim().parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_unique() {
        let gen = SnowflakeGenerator::new(1, 1);
        let ids: HashSet<i64> = (0..10_000).map(|_| gen.generate()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_ids_are_increasing() {
        let gen = SnowflakeGenerator::new(1, 0);
        let a = gen.generate();
        let b = gen.generate();
        assert!(b > a);
        assert!(a > 0);
    }

    #[test]
    fn test_extract_timestamp() {
        let gen = SnowflakeGenerator::with_epoch(DEFAULT_EPOCH, 1, 1);
        let id = gen.generate();
        let ts = gen.extract_timestamp(id);
        let now = current_timestamp();
        assert!(ts <= now + 1);
        assert!(ts > now - 1000);
    }

    #[test]
    fn test_from_string() {
        assert_eq!(from_string(" 42 ").unwrap(), 42);
        assert!(from_string("abc").is_err());
    }
}
