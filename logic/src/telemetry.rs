use crate::packet::{KIND_TELEMETRY, Packet, PacketSink};
use crate::{Channel, Direction};

/// Bytes of [`Packet::data`] used by one record.
pub const TELEMETRY_LEN: usize = 16;

/// State of one motor as reported to the host.
///
/// Layout, little endian: `timestamp_ms[0..4] channel[4] direction[5] duty[6..8] period[8..12]
/// position[12..16]`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Telemetry {
    /// Board clock in milliseconds, truncated to 32 bits. Wraps after about 49.7 days.
    pub timestamp_ms: u32,
    pub channel: Channel,
    pub direction: Direction,
    pub duty: u16,
    pub period: u32,
    pub position: i32,
}

impl Telemetry {
    #[allow(clippy::cast_possible_truncation)]
    pub fn encode_into(&self, packet: &mut Packet) {
        packet.kind = KIND_TELEMETRY;
        packet.part_count = 1;
        packet.flags = 0;
        let data = &mut packet.data;
        data[0..4].copy_from_slice(&self.timestamp_ms.to_le_bytes());
        data[4] = self.channel.index() as u8;
        data[5] = self.direction.to_wire() as u8;
        data[6..8].copy_from_slice(&self.duty.to_le_bytes());
        data[8..12].copy_from_slice(&self.period.to_le_bytes());
        data[12..16].copy_from_slice(&self.position.to_le_bytes());
    }

    /// Parse a telemetry packet, `None` for other kinds or invalid fields.
    pub fn decode(packet: &Packet) -> Option<Telemetry> {
        if packet.kind != KIND_TELEMETRY || packet.has_error() {
            return None;
        }
        let data = &packet.data;
        let word = |at: usize| [data[at], data[at + 1], data[at + 2], data[at + 3]];
        Some(Telemetry {
            timestamp_ms: u32::from_le_bytes(word(0)),
            channel: Channel::from_index(data[4].into())?,
            direction: Direction::from_wire(data[5].into())?,
            duty: u16::from_le_bytes([data[6], data[7]]),
            period: u32::from_le_bytes(word(8)),
            position: i32::from_le_bytes(word(12)),
        })
    }

    /// Send one record. Returns false, dropping the record, when the packet pool is exhausted.
    pub fn emit(sink: &mut impl PacketSink, telemetry: &Telemetry) -> bool {
        let Some(mut packet) = sink.alloc() else {
            log_trace!("telemetry dropped, packet pool exhausted");
            return false;
        };
        telemetry.encode_into(&mut packet);
        sink.send(packet);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::mock::MockTransport;

    const SAMPLE: Telemetry = Telemetry {
        timestamp_ms: 0x0102_0304,
        channel: Channel::B,
        direction: Direction::Reverse,
        duty: 0xABCD,
        period: 525,
        position: -3,
    };

    #[test]
    fn layout() {
        let mut packet = Packet::default();
        packet.flags = 0xFF;
        SAMPLE.encode_into(&mut packet);
        assert_eq!(packet.kind, KIND_TELEMETRY);
        assert_eq!(packet.part_count, 1);
        assert_eq!(packet.flags, 0);
        assert_eq!(
            packet.data[..TELEMETRY_LEN],
            [
                0x04, 0x03, 0x02, 0x01, // timestamp
                1, 1, // channel, direction
                0xCD, 0xAB, // duty
                0x0D, 0x02, 0, 0, // period
                0xFD, 0xFF, 0xFF, 0xFF, // position
            ]
        );
        assert_eq!(Telemetry::decode(&packet), Some(SAMPLE));
    }

    #[test]
    fn decode_rejects_other_packets() {
        let mut packet = Packet::default();
        SAMPLE.encode_into(&mut packet);
        packet.data[4] = 9;
        assert_eq!(Telemetry::decode(&packet), None);
        assert_eq!(Telemetry::decode(&Packet::default()), None);
    }

    #[test]
    fn emit_drops_when_pool_is_empty() {
        let mut transport = MockTransport::with_capacity(1);
        assert!(Telemetry::emit(&mut transport, &SAMPLE));
        assert!(!Telemetry::emit(&mut transport, &SAMPLE));
        assert_eq!(transport.sent.len(), 1);
        assert_eq!(Telemetry::decode(&transport.sent[0]), Some(SAMPLE));
    }
}
