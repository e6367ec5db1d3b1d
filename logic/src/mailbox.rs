//! Hand over of commands from the main context to the control tick.
//!
//! This is the only state both contexts touch. Each group is replaced or read as a whole inside
//! one critical section, so the tick never sees a setpoint from one command paired with the
//! direction of another.

use core::cell::Cell;

use critical_section::Mutex;

use crate::command::{Command, SpeedRequest};
use crate::config::{ControlConfig, MAX_MAGNITUDE, SETPOINT_FULL_SPEED, SETPOINT_STOPPED};
use crate::schedule::Gain;
use crate::{Channel, Direction};

/// Slope of the speed mapping in Q10, `(50 - 1000) / 100 * 1024`.
const SPEED_SLOPE_Q10: i32 = -9728;

/// Map a speed request in percent to a tachometer period setpoint.
///
/// The magnitude is clamped to 100 %. Faster means a shorter period.
///```rust
/// use motor_control_logic::mailbox::speed_to_setpoint;
///
/// assert_eq!(speed_to_setpoint(0), 1000);
/// assert_eq!(speed_to_setpoint(1), 990);
/// assert_eq!(speed_to_setpoint(50), 525);
/// assert_eq!(speed_to_setpoint(100), 50);
/// assert_eq!(speed_to_setpoint(250), 50);
///```
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub fn speed_to_setpoint(magnitude: u32) -> u32 {
    // All values involved are at most 1000.
    let magnitude = magnitude.min(MAX_MAGNITUDE) as i32;
    let setpoint = ((SPEED_SLOPE_Q10 * magnitude) >> 10) + SETPOINT_STOPPED as i32;
    setpoint.max(SETPOINT_FULL_SPEED as i32) as u32
}

/// What the main context asks one motor to do.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotorCommand {
    /// Target period, 0 to stop.
    pub setpoint: u32,
    pub direction: Direction,
    /// The direction changed since the tick last looked.
    pub changing_direction: bool,
    /// The motor was commanded to move out of a stop.
    pub restart: bool,
}

impl MotorCommand {
    pub const STOPPED: MotorCommand = MotorCommand {
        setpoint: 0,
        direction: Direction::Forward,
        changing_direction: false,
        restart: false,
    };
}

/// Controller tuning pushed at run time.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Tuning {
    /// Replaces the gain schedule while set.
    pub override_gain: Option<Gain>,
    pub integral_limit: i32,
}

impl Tuning {
    pub const fn new(integral_limit: i32) -> Self {
        Self {
            override_gain: None,
            integral_limit,
        }
    }
}

pub struct CommandMailbox {
    commands: [Mutex<Cell<MotorCommand>>; 2],
    tuning: [Mutex<Cell<Tuning>>; 2],
}

impl CommandMailbox {
    /// Both motors start stopped.
    pub const fn new(tuning: Tuning) -> Self {
        Self {
            commands: [
                Mutex::new(Cell::new(MotorCommand::STOPPED)),
                Mutex::new(Cell::new(MotorCommand::STOPPED)),
            ],
            tuning: [Mutex::new(Cell::new(tuning)), Mutex::new(Cell::new(tuning))],
        }
    }

    /// Command a speed in percent. A magnitude of 0 stops the motor.
    pub fn set_speed(&self, channel: Channel, direction: Direction, magnitude: u32) {
        critical_section::with(|cs| {
            let cell = self.commands[channel.index()].borrow(cs);
            let previous = cell.get();
            let next = if magnitude == 0 {
                MotorCommand {
                    direction,
                    ..MotorCommand::STOPPED
                }
            } else {
                MotorCommand {
                    setpoint: speed_to_setpoint(magnitude),
                    direction,
                    // Pending one-shots survive until the tick has consumed them.
                    changing_direction: previous.changing_direction
                        || direction != previous.direction,
                    restart: previous.restart || previous.setpoint == 0,
                }
            };
            cell.set(next);
        });
    }

    /// Current command, leaving the one-shots in place.
    pub fn command(&self, channel: Channel) -> MotorCommand {
        critical_section::with(|cs| self.commands[channel.index()].borrow(cs).get())
    }

    /// Current command. The one-shots are cleared in the same critical section.
    pub fn take_command(&self, channel: Channel) -> MotorCommand {
        critical_section::with(|cs| {
            let cell = self.commands[channel.index()].borrow(cs);
            let command = cell.get();
            cell.set(MotorCommand {
                changing_direction: false,
                restart: false,
                ..command
            });
            command
        })
    }

    pub fn set_tuning(&self, channel: Channel, tuning: Tuning) {
        critical_section::with(|cs| self.tuning[channel.index()].borrow(cs).set(tuning));
    }

    pub fn tuning(&self, channel: Channel) -> Tuning {
        critical_section::with(|cs| self.tuning[channel.index()].borrow(cs).get())
    }

    /// Apply a fully decoded command.
    pub fn apply(&self, command: &Command) {
        match command {
            Command::SetSpeed(requests) => {
                for (channel, SpeedRequest { direction, magnitude }) in
                    Channel::ALL.into_iter().zip(requests)
                {
                    self.set_speed(channel, *direction, *magnitude);
                }
            }
            Command::Tune { channel, tuning } => {
                log_debug!("tuning channel {} ilimit {}", channel.index(), tuning.integral_limit);
                self.set_tuning(*channel, *tuning);
            }
        }
    }
}

impl Default for CommandMailbox {
    fn default() -> Self {
        Self::new(Tuning::new(ControlConfig::DEFAULT.integral_limit))
    }
}
