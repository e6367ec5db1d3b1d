//! Packet link to the host over UART.
//!
//! Frame: `0xA5, id, kind, part_count, payload[32], crc8`. The CRC covers everything between
//! the sync byte and itself. Corrupted frames are still delivered, flagged with
//! [`FLAG_CRC_ERROR`], so the main loop can report them.

use crc::{CRC_8_SMBUS, Crc};
use defmt::{trace, warn};
use embassy_rp::uart::{Async, UartRx, UartTx};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use motor_control_logic::packet::{FLAG_CRC_ERROR, PACKET_DATA_LEN};
use motor_control_logic::{Packet, PacketSink, PacketTransport};

const CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

pub const FRAME_SYNC: u8 = 0xA5;
const HEADER_LEN: usize = 3;
/// Bytes after the sync byte.
const BODY_LEN: usize = HEADER_LEN + PACKET_DATA_LEN + 1;
pub const FRAME_LEN: usize = 1 + BODY_LEN;

/// Packets in flight per direction. Free slots of the outbound queue are the packet pool.
pub const QUEUE_DEPTH: usize = 8;

type PacketQueue = Channel<CriticalSectionRawMutex, Packet, QUEUE_DEPTH>;

pub struct LinkQueues {
    inbound: PacketQueue,
    outbound: PacketQueue,
}

impl LinkQueues {
    pub const fn new() -> Self {
        Self {
            inbound: Channel::new(),
            outbound: Channel::new(),
        }
    }
}

/// Handle to the link. Both the control tick and the main loop hold one.
#[derive(Clone, Copy)]
pub struct Link {
    queues: &'static LinkQueues,
}

impl Link {
    pub fn new(queues: &'static LinkQueues) -> Self {
        Self { queues }
    }
}

impl PacketSink for Link {
    fn alloc(&mut self) -> Option<Packet> {
        (self.queues.outbound.free_capacity() > 0).then_some(Packet::EMPTY)
    }

    fn send(&mut self, packet: Packet) {
        // Another context may have taken the slot between alloc and send.
        if self.queues.outbound.try_send(packet).is_err() {
            trace!("outbound queue full, dropped packet kind {}", packet.kind);
        }
    }
}

impl PacketTransport for Link {
    fn try_receive(&mut self) -> Option<Packet> {
        self.queues.inbound.try_receive().ok()
    }

    fn free(&mut self, _packet: Packet) {}
}

pub fn encode_frame(packet: &Packet) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[0] = FRAME_SYNC;
    frame[1] = packet.id;
    frame[2] = packet.kind;
    frame[3] = packet.part_count;
    frame[1 + HEADER_LEN..FRAME_LEN - 1].copy_from_slice(&packet.data);
    frame[FRAME_LEN - 1] = CRC8.checksum(&frame[1..FRAME_LEN - 1]);
    frame
}

/// Parse the bytes following a sync byte.
pub fn decode_body(body: &[u8; BODY_LEN]) -> Packet {
    let mut data = [0u8; PACKET_DATA_LEN];
    data.copy_from_slice(&body[HEADER_LEN..BODY_LEN - 1]);
    let crc = body[BODY_LEN - 1];
    let flags = if CRC8.checksum(&body[..BODY_LEN - 1]) == crc {
        0
    } else {
        FLAG_CRC_ERROR
    };
    Packet {
        id: body[0],
        kind: body[1],
        part_count: body[2],
        flags,
        data,
        crc,
    }
}

#[embassy_executor::task]
pub async fn rx_task(mut rx: UartRx<'static, Async>, queues: &'static LinkQueues) {
    let mut sync = [0u8; 1];
    let mut body = [0u8; BODY_LEN];
    loop {
        if let Err(err) = rx.read(&mut sync).await {
            warn!("uart receive error {}", err);
            continue;
        }
        if sync[0] != FRAME_SYNC {
            continue;
        }
        if let Err(err) = rx.read(&mut body).await {
            warn!("uart receive error {}", err);
            continue;
        }
        let packet = decode_body(&body);
        if queues.inbound.try_send(packet).is_err() {
            warn!("inbound queue full, dropped packet id {}", packet.id);
        }
    }
}

#[embassy_executor::task]
pub async fn tx_task(mut tx: UartTx<'static, Async>, queues: &'static LinkQueues) {
    loop {
        let packet = queues.outbound.receive().await;
        if let Err(err) = tx.write(&encode_frame(&packet)).await {
            warn!("uart transmit error {}", err);
        }
    }
}
