//! Gain scheduling.
//!
//! A single set of PID coefficients can not keep the loop stable across the whole speed range of
//! the motor, so the coefficients are picked from a table indexed by the operating point.

use fixed::types::I16F16;

/// Signed Q16.16 fixed point, scale factor 65536.
pub type Q16 = I16F16;

/// Build a [`Q16`] holding a whole number.
///```rust
/// use motor_control_logic::schedule::q16;
///
/// assert_eq!(q16(-130).to_bits(), -130 * 65536);
/// assert_eq!(q16(1).to_bits(), 1 << 16);
///```
pub const fn q16(int: i32) -> Q16 {
    Q16::from_bits(int << 16)
}

/// PID coefficients: proportional (`kc`), derivative (`kd`) and integral (`ki`).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Gain {
    pub kc: Q16,
    pub kd: Q16,
    pub ki: Q16,
}

impl Gain {
    pub const ZERO: Gain = Gain::from_bits(0, 0, 0);

    pub const fn new(kc: Q16, kd: Q16, ki: Q16) -> Self {
        Self { kc, kd, ki }
    }

    /// Build a gain set from raw Q16 bit patterns, as they travel on the wire.
    pub const fn from_bits(kc: i32, kd: i32, ki: i32) -> Self {
        Self {
            kc: Q16::from_bits(kc),
            kd: Q16::from_bits(kd),
            ki: Q16::from_bits(ki),
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

#[cfg(feature = "defmt")]
mod defmt_impl {
    use super::Gain;
    #[mutants::skip]
    impl defmt::Format for Gain {
        fn format(&self, fmt: defmt::Formatter) {
            defmt::write!(
                fmt,
                "Gain {{ kc: {}, kd: {}, ki: {} }}",
                self.kc.to_bits(),
                self.kd.to_bits(),
                self.ki.to_bits()
            );
        }
    }
}

/// One row of a [`GainSchedule`]: operating points up to and including `upper_bound` use `gain`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ScheduleEntry {
    pub upper_bound: u32,
    pub gain: Gain,
}

impl ScheduleEntry {
    pub const fn new(upper_bound: u32, gain: Gain) -> Self {
        Self { upper_bound, gain }
    }
}

/// What happens to operating points above the last bound of the table.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScheduleOverflow {
    /// Use the last gain set.
    Saturate,
    /// Hand the controller an out of range index, so it skips the tick.
    Skip,
}

/// Ordered table of gain sets, sorted ascending by upper bound.
#[derive(Clone, Copy, Debug)]
pub struct GainSchedule<'a> {
    entries: &'a [ScheduleEntry],
}

impl<'a> GainSchedule<'a> {
    /// Wrap a table.
    ///
    /// # Panics
    /// If the table is empty or its bounds are not strictly ascending.
    /// Used in a `const` this is a compile time error.
    pub const fn new(entries: &'a [ScheduleEntry]) -> Self {
        assert!(!entries.is_empty(), "gain schedule must not be empty");
        let mut i = 1;
        while i < entries.len() {
            assert!(
                entries[i - 1].upper_bound < entries[i].upper_bound,
                "gain schedule bounds must be strictly ascending"
            );
            i += 1;
        }
        Self { entries }
    }

    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false, a schedule can not be built empty.
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &'a [ScheduleEntry] {
        self.entries
    }

    pub fn gain(&self, index: usize) -> Option<Gain> {
        self.entries.get(index).map(|entry| entry.gain)
    }

    /// Index of the first entry whose bound is at or above `point`.
    /// Returns `None` if `point` is above every bound.
    pub fn lookup(&self, point: u32) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| point <= entry.upper_bound)
    }

    /// Like [`GainSchedule::lookup`] but saturates at the top of the table.
    pub fn select(&self, point: u32) -> usize {
        self.lookup(point).unwrap_or(self.entries.len() - 1)
    }

    /// Resolve an operating point under the given overflow policy.
    /// With [`ScheduleOverflow::Skip`] the result equals `len()` above the last bound.
    pub fn index_for(&self, point: u32, overflow: ScheduleOverflow) -> usize {
        match overflow {
            ScheduleOverflow::Saturate => self.select(point),
            ScheduleOverflow::Skip => self.lookup(point).unwrap_or(self.entries.len()),
        }
    }
}
