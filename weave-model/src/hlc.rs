//! Hybrid Logical Clock (HLC) implementation
//!
//! Event timestamps are HLCs packed into 12 big-endian bytes, so the byte
//! order of a packed time is its causal order. `HlcGenerator` hands out
//! strictly increasing timestamps for locally created events.

use crate::clock::{Clock, SystemClock};
use std::cmp::Ordering;
use std::sync::{Arc, Mutex};

/// Length of a packed HLC.
pub const PACKED_LEN: usize = 12;

/// Default maximum drift a remote time may run ahead of the local wall
/// clock before it is ignored (1 hour in ms)
pub const DEFAULT_MAX_DRIFT_MS: u64 = 60 * 60 * 1000;

/// Hybrid Logical Clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HLC {
    /// Wall clock time in milliseconds since Unix epoch
    pub wall_time: u64,
    /// Logical counter for ordering events at same wall_time
    pub counter: u32,
}

impl HLC {
    pub fn new(wall_time: u64, counter: u32) -> Self {
        Self { wall_time, counter }
    }

    /// Create an HLC from the current system time
    pub fn now() -> Self {
        Self::now_with_clock(&SystemClock)
    }

    pub fn now_with_clock(clock: &impl Clock) -> Self {
        Self { wall_time: clock.now_ms(), counter: 0 }
    }

    /// Smallest HLC after `(wall_time, counter)`. An exhausted counter
    /// rolls over into the next millisecond.
    fn successor(wall_time: u64, counter: u32) -> HLC {
        match counter.checked_add(1) {
            Some(counter) => HLC::new(wall_time, counter),
            None => HLC::new(wall_time.saturating_add(1), 0),
        }
    }

    /// Check if this HLC exceeds the given wall time by more than max_drift
    pub fn is_future(&self, local_wall_time: u64, max_drift_ms: u64) -> bool {
        self.wall_time > local_wall_time.saturating_add(max_drift_ms)
    }

    /// Increment this HLC for a new local event
    pub fn tick_with_clock(&self, clock: &(impl Clock + ?Sized)) -> HLC {
        let now = clock.now_ms();
        if now > self.wall_time {
            HLC::new(now, 0)
        } else {
            Self::successor(self.wall_time, self.counter)
        }
    }

    /// Merge a timestamp received from a remote event.
    pub fn update_with_clock(&self, received: &HLC, clock: &(impl Clock + ?Sized)) -> HLC {
        let local_wall_time = clock.now_ms();

        if local_wall_time > self.wall_time && local_wall_time > received.wall_time {
            HLC::new(local_wall_time, 0)
        } else if self.wall_time > received.wall_time {
            Self::successor(self.wall_time, self.counter)
        } else if received.wall_time > self.wall_time {
            Self::successor(received.wall_time, received.counter)
        } else {
            Self::successor(self.wall_time, self.counter.max(received.counter))
        }
    }

    /// Big-endian packing: wall_time (8) ‖ counter (4).
    pub fn to_bytes(&self) -> [u8; PACKED_LEN] {
        let mut out = [0u8; PACKED_LEN];
        out[..8].copy_from_slice(&self.wall_time.to_be_bytes());
        out[8..].copy_from_slice(&self.counter.to_be_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != PACKED_LEN {
            return None;
        }
        let wall_time = u64::from_be_bytes(bytes[..8].try_into().ok()?);
        let counter = u32::from_be_bytes(bytes[8..].try_into().ok()?);
        Some(Self { wall_time, counter })
    }
}

impl Ord for HLC {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.wall_time.cmp(&other.wall_time) {
            Ordering::Equal => self.counter.cmp(&other.counter),
            other => other,
        }
    }
}

impl PartialOrd for HLC {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for HLC {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.wall_time, self.counter)
    }
}

/// Source of strictly increasing local timestamps.
pub struct HlcGenerator {
    last: Mutex<HLC>,
    clock: Arc<dyn Clock>,
    max_drift_ms: u64,
}

impl HlcGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_max_drift(clock, DEFAULT_MAX_DRIFT_MS)
    }

    /// Generator that ignores remote times more than `max_drift_ms` ahead
    /// of `clock`.
    pub fn with_max_drift(clock: Arc<dyn Clock>, max_drift_ms: u64) -> Self {
        Self { last: Mutex::new(HLC::new(0, 0)), clock, max_drift_ms }
    }

    /// Next timestamp, greater than every one handed out before.
    pub fn next(&self) -> HLC {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let next = last.tick_with_clock(self.clock.as_ref());
        *last = next;
        next
    }

    /// Fold a remote timestamp in so later local events sort after it.
    /// Times beyond the drift limit are left out; returns whether `received`
    /// was folded in.
    pub fn observe(&self, received: &HLC) -> bool {
        if received.is_future(self.clock.now_ms(), self.max_drift_ms) {
            return false;
        }
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        *last = last.update_with_clock(received, self.clock.as_ref());
        true
    }
}

impl Default for HlcGenerator {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl std::fmt::Debug for HlcGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HlcGenerator").field("max_drift_ms", &self.max_drift_ms).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;

    #[test]
    fn test_hlc_ordering() {
        let a = HLC::new(100, 0);
        let b = HLC::new(100, 1);
        let c = HLC::new(101, 0);

        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_packed_order_matches_hlc_order() {
        let times = [HLC::new(1, 5), HLC::new(2, 0), HLC::new(2, 1), HLC::new(300, 0)];
        for pair in times.windows(2) {
            assert!(pair[0].to_bytes() < pair[1].to_bytes());
        }
        let packed = times[2].to_bytes();
        assert_eq!(HLC::from_bytes(&packed), Some(times[2]));
        assert_eq!(HLC::from_bytes(&packed[..4]), None);
    }

    #[test]
    fn test_hlc_update_received_ahead() {
        let local = HLC::new(100, 5);
        let received = HLC::new(200, 3);
        let clock = MockClock::new(50);

        let updated = local.update_with_clock(&received, &clock);
        assert_eq!(updated, HLC::new(200, 4));
    }

    #[test]
    fn test_generator_is_strictly_increasing_with_frozen_clock() {
        let clock = MockClock::new(1_000);
        let gen = HlcGenerator::new(Arc::new(clock.clone()));

        let a = gen.next();
        let b = gen.next();
        assert_eq!(a, HLC::new(1_000, 0));
        assert_eq!(b, HLC::new(1_000, 1));

        gen.observe(&HLC::new(5_000, 7));
        assert!(gen.next() > HLC::new(5_000, 7));

        clock.set(9_000);
        assert_eq!(gen.next(), HLC::new(9_000, 0));
    }

    #[test]
    fn test_exhausted_counter_rolls_into_next_millisecond() {
        let clock = MockClock::new(50);
        let saturated = HLC::new(100, u32::MAX);

        assert_eq!(saturated.tick_with_clock(&clock), HLC::new(101, 0));
        assert_eq!(HLC::new(10, 0).update_with_clock(&saturated, &clock), HLC::new(101, 0));
        assert_eq!(saturated.update_with_clock(&HLC::new(100, 3), &clock), HLC::new(101, 0));
        assert_eq!(saturated.update_with_clock(&HLC::new(20, 3), &clock), HLC::new(101, 0));
    }

    #[test]
    fn test_observe_ignores_times_past_drift() {
        let clock = MockClock::new(1_000);
        let gen = HlcGenerator::with_max_drift(Arc::new(clock.clone()), 500);

        assert!(!gen.observe(&HLC::new(1_501, 0)));
        assert!(!gen.observe(&HLC::new(u64::MAX, u32::MAX)));
        assert_eq!(gen.next(), HLC::new(1_000, 0));

        assert!(gen.observe(&HLC::new(1_500, 2)));
        assert_eq!(gen.next(), HLC::new(1_500, 4));
    }
}
