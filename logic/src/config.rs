//! Compile time configuration of the control loop.

use crate::schedule::{Gain, GainSchedule, ScheduleEntry, ScheduleOverflow, q16};

/// Number of ticks a freshly started motor treats its period readings as stale.
pub const ENABLING_TICKS: u8 = 10;

/// Largest speed magnitude accepted from a command, in percent.
pub const MAX_MAGNITUDE: u32 = 100;
/// Setpoint a 0% request maps to (slowest rotation, longest period).
pub const SETPOINT_STOPPED: u32 = 1000;
/// Setpoint a 100% request maps to (fastest rotation, shortest period).
pub const SETPOINT_FULL_SPEED: u32 = 50;

/// Whether a tick that leaves the duty untouched still reports telemetry.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TelemetryPolicy {
    /// Report only ticks that changed the commanded duty.
    OnChange,
    /// Report every tick of a moving motor.
    EveryTick,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlConfig {
    /// Period of the control tick.
    pub tick_period_ms: u32,
    /// Symmetric clamp applied to the integral term of each controller.
    pub integral_limit: i32,
    /// Smallest non zero duty; anything below stalls the motor.
    pub duty_floor: u16,
    pub duty_ceiling: u16,
    pub telemetry: TelemetryPolicy,
    pub overflow: ScheduleOverflow,
}

impl ControlConfig {
    pub const DEFAULT: ControlConfig = ControlConfig {
        tick_period_ms: 2,
        integral_limit: 1000,
        duty_floor: 3000,
        duty_ceiling: 0xFFFF,
        telemetry: TelemetryPolicy::OnChange,
        overflow: ScheduleOverflow::Saturate,
    };
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

const fn proportional(kc: i32) -> Gain {
    Gain::new(q16(kc), q16(0), q16(0))
}

const DEFAULT_TABLE: [ScheduleEntry; 6] = [
    ScheduleEntry::new(100, proportional(-130)),
    ScheduleEntry::new(200, proportional(-50)),
    ScheduleEntry::new(400, proportional(-10)),
    ScheduleEntry::new(700, proportional(-5)),
    ScheduleEntry::new(800, proportional(-2)),
    ScheduleEntry::new(10000, proportional(-1)),
];

/// Proportional only schedule tuned for the geared DC motors on the board.
/// The gains are negative because the controlled value is a period: a too long period (too slow)
/// needs more duty.
pub const DEFAULT_SCHEDULE: GainSchedule<'static> = GainSchedule::new(&DEFAULT_TABLE);
