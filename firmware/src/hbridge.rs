//! Dual H-bridge on two PWM slices. Output A of a slice drives IN1, output B drives IN2.

use embassy_rp::pwm::{Config, PwmOutput, SetDutyCycle};
use motor_control_logic::{Channel, Direction, HBridge};

pub const PWM_FREQUENCY_HZ: u32 = 20_000;
const PWM_DIVIDER: u8 = 16;

/// Slice configuration for [`PWM_FREQUENCY_HZ`] at the current system clock, both outputs low.
#[allow(clippy::cast_possible_truncation)]
pub fn pwm_config() -> Config {
    let clock_freq_hz = embassy_rp::clocks::clk_sys_freq();
    let top = (clock_freq_hz / (PWM_FREQUENCY_HZ * u32::from(PWM_DIVIDER))) as u16 - 1;

    let mut config = Config::default();
    config.top = top;
    config.divider = PWM_DIVIDER.into();
    config
}

pub struct BridgeInputs {
    pub in1: PwmOutput<'static>,
    pub in2: PwmOutput<'static>,
}

pub struct DualHBridge {
    channels: [BridgeInputs; 2],
}

impl DualHBridge {
    pub fn new(a: BridgeInputs, b: BridgeInputs) -> Self {
        Self { channels: [a, b] }
    }
}

impl HBridge for DualHBridge {
    fn set_duty(&mut self, channel: Channel, direction: Direction, duty: u16) {
        let BridgeInputs { in1, in2 } = &mut self.channels[channel.index()];
        let (drive, hold) = match direction {
            Direction::Forward => (in1, in2),
            Direction::Reverse => (in2, in1),
        };
        // Low side first so both inputs are never driven at once.
        let result = hold
            .set_duty_cycle_fully_off()
            .and_then(|()| drive.set_duty_cycle_fraction(duty, u16::MAX));
        if result.is_err() {
            defmt::warn!("pwm update failed on channel {}", channel);
        }
    }
}
