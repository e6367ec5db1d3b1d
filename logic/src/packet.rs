//! The logical packet exchanged with the host over the link.
//!
//! Framing, integrity checking and pooling belong to the transport. This module only fixes the
//! shape the control logic sees.

/// Payload bytes carried by one packet.
pub const PACKET_DATA_LEN: usize = 32;

/// Set by the transport when the received frame failed its integrity check.
pub const FLAG_CRC_ERROR: u8 = 1 << 0;

/// Host time synchronisation request, bounced back with the board clock filled in.
pub const KIND_TIME_SYNC: u8 = 0x01;
/// Motor telemetry, board to host.
pub const KIND_TELEMETRY: u8 = 15;
/// Motor command, host to board.
pub const KIND_MOTOR: u8 = 18;
/// Drive one general purpose output, host to board.
pub const KIND_GPIO: u8 = 19;
/// Reset the board.
pub const KIND_RESET: u8 = 0xFE;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Packet {
    pub id: u8,
    pub kind: u8,
    pub part_count: u8,
    pub flags: u8,
    pub data: [u8; PACKET_DATA_LEN],
    pub crc: u8,
}

impl Packet {
    pub const EMPTY: Packet = Packet {
        id: 0,
        kind: 0,
        part_count: 0,
        flags: 0,
        data: [0; PACKET_DATA_LEN],
        crc: 0,
    };

    pub fn has_error(&self) -> bool {
        self.flags & FLAG_CRC_ERROR != 0
    }
}

impl Default for Packet {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Outbound half of the link. Both calls must not block: the control tick uses them.
pub trait PacketSink {
    /// Take a free packet from the pool, `None` when exhausted.
    fn alloc(&mut self) -> Option<Packet>;
    /// Queue an allocated packet for transmission. Ownership returns to the transport.
    fn send(&mut self, packet: Packet);
}

/// Full link as seen from the main context.
pub trait PacketTransport: PacketSink {
    /// Next received packet, if any.
    fn try_receive(&mut self) -> Option<Packet>;
    /// Hand a received packet back to the pool without sending it.
    fn free(&mut self, packet: Packet);
}
