use defmt::warn;
use embassy_rp::gpio::{Level, Output};
use motor_control_logic::GpioBank;
use motor_control_logic::gpio::GPIO_PINS;

/// The spare outputs the host may drive. The RP2040 has a single bank, so only port 0 is wired.
pub struct BoardOutputs {
    port0: [Option<Output<'static>>; GPIO_PINS as usize],
}

impl BoardOutputs {
    pub fn new() -> Self {
        Self {
            port0: core::array::from_fn(|_| None),
        }
    }

    /// Expose `output` as port 0, `pin`.
    pub fn with(mut self, pin: u8, output: Output<'static>) -> Self {
        self.port0[usize::from(pin)] = Some(output);
        self
    }
}

impl GpioBank for BoardOutputs {
    fn set_level(&mut self, port: u8, pin: u8, high: bool) {
        let output = match port {
            0 => self.port0.get_mut(usize::from(pin)).and_then(Option::as_mut),
            _ => None,
        };
        match output {
            Some(output) => output.set_level(Level::from(high)),
            None => warn!("GPIO {}.{} is not wired", port, pin),
        }
    }
}
