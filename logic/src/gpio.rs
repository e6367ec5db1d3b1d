//! Host request to drive one general purpose output.
//!
//! Payload: `port[0] pin[1] state[2]`. Any non zero state drives the pin high.

use crate::command::DecodeError;
use crate::packet::{KIND_GPIO, PACKET_DATA_LEN, Packet};

pub const GPIO_PORTS: u8 = 3;
pub const GPIO_PINS: u8 = 16;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GpioSet {
    pub port: u8,
    pub pin: u8,
    pub high: bool,
}

impl GpioSet {
    /// Decode a received packet. Addresses outside the bank are rejected.
    pub fn from_packet(packet: &Packet) -> Result<GpioSet, DecodeError> {
        if packet.has_error() {
            return Err(DecodeError::CrcError);
        }
        if packet.kind != KIND_GPIO {
            return Err(DecodeError::WrongKind(packet.kind));
        }
        let [port, pin, state, ..] = packet.data;
        if port >= GPIO_PORTS || pin >= GPIO_PINS {
            return Err(DecodeError::GpioOutOfRange { port, pin });
        }
        Ok(GpioSet {
            port,
            pin,
            high: state != 0,
        })
    }

    pub fn encode_into(&self, packet: &mut Packet) {
        packet.kind = KIND_GPIO;
        packet.part_count = 1;
        packet.flags = 0;
        packet.data = [0; PACKET_DATA_LEN];
        packet.data[0] = self.port;
        packet.data[1] = self.pin;
        packet.data[2] = u8::from(self.high);
    }
}
