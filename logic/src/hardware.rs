//! Seams to the peripherals driven by the control loop.
//!
//! The firmware implements these on top of the HAL, and the unit tests inject the recording
//! mocks from the `mock` module.

use crate::{Channel, Direction};

/// Tachometer period measurement.
pub trait PeriodSensor {
    /// Latest period between tachometer pulses. 0 means no valid reading.
    fn period(&mut self, channel: Channel) -> u32;
    /// Pulses counted since the previous call.
    fn take_pulse_count(&mut self, channel: Channel) -> u32;
    fn enable(&mut self, channel: Channel);
    fn disable(&mut self, channel: Channel);
}

/// Dual H-bridge power stage.
pub trait HBridge {
    /// Drive `channel` in `direction` with `duty` out of `u16::MAX`.
    fn set_duty(&mut self, channel: Channel, direction: Direction, duty: u16);
}

/// Host controlled general purpose outputs, addressed as `port`/`pin`.
pub trait GpioBank {
    /// Called only with an address inside [`crate::gpio::GPIO_PORTS`] x [`crate::gpio::GPIO_PINS`].
    fn set_level(&mut self, port: u8, pin: u8, high: bool);
}
