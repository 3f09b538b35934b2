//! Clock values and reconstruction of full-width timestamps from narrow clock fields.

use crate::metadata::ClockRef;
use std::cmp::Ordering;
use std::fmt;

/// Full-width clock value, in cycles of `clock`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Timestamp {
    cycles: u64,
    clock: Option<ClockRef>,
}

impl Timestamp {
    pub fn new(cycles: u64, clock: Option<ClockRef>) -> Self {
        Timestamp { cycles, clock }
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn clock(&self) -> Option<&ClockRef> {
        self.clock.as_ref()
    }

    /// Nanoseconds since the clock origin. Without a clock, cycles are nanoseconds.
    pub fn ns_from_origin(&self) -> i128 {
        match &self.clock {
            Some(c) => c.cycles_to_ns(self.cycles),
            None => i128::from(self.cycles),
        }
    }

    /// Nanoseconds since the origin, when it is representable as `u64`.
    pub fn ns(&self) -> Option<u64> {
        u64::try_from(self.ns_from_origin()).ok()
    }

    /// The next timestamp given a new `bits`-wide raw clock value.
    pub fn advance(&self, raw: u64, bits: u32) -> Timestamp {
        Timestamp {
            cycles: reconstruct(Some(self.cycles), raw, bits),
            clock: self.clock.clone(),
        }
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Timestamps order by time since origin, so streams on different clocks merge sensibly.
impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ns_from_origin()
            .cmp(&other.ns_from_origin())
            .then(self.cycles.cmp(&other.cycles))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.clock {
            Some(c) => write!(f, "{} ({} cycles of {})", self.ns_from_origin(), self.cycles, c.name),
            None => write!(f, "{}", self.cycles),
        }
    }
}

/// Recover a full clock value from the low `bits` bits of it.
///
/// The high bits come from `previous`. At most one wrap of the narrow field can happen
/// between two consecutive values of the same clock, so a result below `previous` is
/// corrected by one period.
pub fn reconstruct(previous: Option<u64>, raw: u64, bits: u32) -> u64 {
    let Some(prev) = previous else {
        return raw;
    };
    if bits >= 64 {
        return raw;
    }
    let period = 1_u64 << bits;
    let mask = !(period - 1);
    let value = (prev & mask) | (raw & !mask);
    if value < prev {
        value.wrapping_add(period)
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ClockDescriptor;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn narrow_field_wraps_once() {
        let prev: u64 = (5 << 27) | ((1 << 27) - 1);
        let raw = (prev + 1) & ((1 << 27) - 1);
        assert_eq!(raw, 0);
        assert_eq!(reconstruct(Some(prev), raw, 27), prev + 1);
    }

    #[test]
    fn no_previous_value() {
        assert_eq!(reconstruct(None, 1234, 27), 1234);
        assert_eq!(reconstruct(None, u64::MAX, 64), u64::MAX);
    }

    #[test]
    fn same_period_and_full_width() {
        assert_eq!(reconstruct(Some(0x1_0000_0010), 0x20, 32), 0x1_0000_0020);
        assert_eq!(reconstruct(Some(0x1_0000_0010), 0x10, 32), 0x1_0000_0010);
        assert_eq!(reconstruct(Some(0x1_0000_0010), 0x05, 32), 0x2_0000_0005);
        assert_eq!(reconstruct(Some(100), 50, 64), 50);
    }

    #[test]
    fn ordering_follows_clock_origin() {
        let clock = |offset_s| {
            Arc::new(ClockDescriptor {
                name: "c".to_owned(),
                uuid: None,
                description: None,
                frequency: 1_000_000_000,
                precision: 0,
                offset_s,
                offset: 0,
                absolute: false,
            })
        };
        let early = Timestamp::new(500, Some(clock(1)));
        let late = Timestamp::new(10, Some(clock(2)));
        assert!(early < late);
        assert_eq!(late.ns(), Some(2_000_000_010));
        // 500 is 0x1F4, so a raw 4-bit 3 wraps to 0x203
        assert_eq!(early.advance(3, 4).cycles(), 0x203);
    }

    proptest! {
        #[test]
        fn reconstruction_is_monotonic_and_exact(prev in 0_u64..(1 << 60), delta in 0_u64..(1 << 27), bits in 28_u32..64) {
            let next = prev + delta;
            let raw = next & ((1 << bits) - 1);
            prop_assert_eq!(reconstruct(Some(prev), raw, bits), next);
        }
    }
}
