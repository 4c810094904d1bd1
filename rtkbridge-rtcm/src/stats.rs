//! Per message type arrival statistics.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Upper bound on distinct message types tracked.
pub const MAX_TRACKED_TYPES: usize = 64;

/// Counters for one message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeStats {
    pub count: u64,
    pub bytes: u64,
    pub last_seen: Instant,
    /// Gap between the two most recent arrivals.
    pub last_interval: Option<Duration>,
}

/// Bounded table of message types seen on the stream.
#[derive(Debug, Clone, Default)]
pub struct MessageStats {
    types: BTreeMap<u16, TypeStats>,
    /// Frames whose type did not fit in the table.
    untracked: u64,
}

impl MessageStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one arrival and returns the interval since the previous one.
    pub fn record(&mut self, msg_type: u16, len: usize, now: Instant) -> Option<Duration> {
        if let Some(entry) = self.types.get_mut(&msg_type) {
            let interval = now.saturating_duration_since(entry.last_seen);
            entry.count += 1;
            entry.bytes += len as u64;
            entry.last_seen = now;
            entry.last_interval = Some(interval);
            return Some(interval);
        }

        if self.types.len() >= MAX_TRACKED_TYPES {
            self.untracked += 1;
            return None;
        }

        self.types.insert(
            msg_type,
            TypeStats {
                count: 1,
                bytes: len as u64,
                last_seen: now,
                last_interval: None,
            },
        );
        None
    }

    pub fn get(&self, msg_type: u16) -> Option<&TypeStats> {
        self.types.get(&msg_type)
    }

    /// Tracked types in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &TypeStats)> {
        self.types.iter().map(|(t, s)| (*t, s))
    }

    pub fn untracked(&self) -> u64 {
        self.untracked
    }

    pub fn total_frames(&self) -> u64 {
        self.types.values().map(|s| s.count).sum::<u64>() + self.untracked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_tracking() {
        let t0 = Instant::now();
        let mut stats = MessageStats::new();

        assert_eq!(stats.record(1005, 25, t0), None);
        assert_eq!(
            stats.record(1005, 25, t0 + Duration::from_secs(10)),
            Some(Duration::from_secs(10))
        );

        let entry = stats.get(1005).unwrap();
        assert_eq!(entry.count, 2);
        assert_eq!(entry.bytes, 50);
        assert_eq!(entry.last_interval, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_table_is_bounded() {
        let now = Instant::now();
        let mut stats = MessageStats::new();
        for t in 0..(MAX_TRACKED_TYPES as u16 + 5) {
            stats.record(t, 10, now);
        }
        assert_eq!(stats.iter().count(), MAX_TRACKED_TYPES);
        assert_eq!(stats.untracked(), 5);
        assert_eq!(stats.total_frames(), MAX_TRACKED_TYPES as u64 + 5);
    }

    #[test]
    fn test_iter_sorted() {
        let now = Instant::now();
        let mut stats = MessageStats::new();
        stats.record(1230, 10, now);
        stats.record(1005, 25, now);
        stats.record(1077, 300, now);
        let order: Vec<u16> = stats.iter().map(|(t, _)| t).collect();
        assert_eq!(order, vec![1005, 1077, 1230]);
    }
}
