//! This crate contains the closed-loop control logic of the two channel motor speed controller.
//! It contains the gain scheduled PID controller, the per motor tick state machine and the packet
//! glue that turns host commands into setpoints and motor state into telemetry.
//!
//! This crate specifically does **not** depend on embassy-rp or any other HAL.
//! Hardware is reached through the traits in [`hardware`] and [`packet`], so every piece of the
//! control loop can be unit tested on the host machine.
#![cfg_attr(not(test), no_std)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]

#[macro_use]
mod log;

pub mod command;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod gpio;
pub mod hardware;
pub mod mailbox;
pub mod motor;
pub mod packet;
pub mod schedule;
pub mod telemetry;

pub use command::{Command, DecodeError};
pub use config::{ControlConfig, TelemetryPolicy};
pub use controller::{Controller, TickTrace, TraceSink};
pub use dispatch::{Dispatcher, Disposition};
pub use gpio::GpioSet;
pub use hardware::{GpioBank, HBridge, PeriodSensor};
pub use mailbox::{CommandMailbox, MotorCommand, Tuning};
pub use motor::{ControlLoop, Motor, MotorState};
pub use packet::{Packet, PacketSink, PacketTransport};
pub use schedule::{Gain, GainSchedule, Q16, ScheduleEntry, ScheduleOverflow};
pub use telemetry::Telemetry;

/// One of the two H-bridge channels.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    A,
    B,
}

impl Channel {
    /// Both channels, in the order the control loop ticks them.
    pub const ALL: [Channel; 2] = [Channel::A, Channel::B];

    pub const fn index(self) -> usize {
        match self {
            Channel::A => 0,
            Channel::B => 1,
        }
    }

    /// Map a raw channel number from the wire. Returns `None` if out of range.
    pub const fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(Channel::A),
            1 => Some(Channel::B),
            _ => None,
        }
    }
}

/// Direction the H-bridge drives the motor in.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

impl Direction {
    pub const fn from_wire(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Direction::Forward),
            1 => Some(Direction::Reverse),
            _ => None,
        }
    }

    pub const fn to_wire(self) -> u32 {
        match self {
            Direction::Forward => 0,
            Direction::Reverse => 1,
        }
    }

    /// Sign applied to tachometer pulses travelling in this direction.
    pub const fn sign(self) -> i32 {
        match self {
            Direction::Forward => 1,
            Direction::Reverse => -1,
        }
    }
}
