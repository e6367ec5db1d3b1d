//! Routing of packets received from the host. Runs in the main context.

use embassy_time::Instant;

use crate::command::Command;
use crate::gpio::GpioSet;
use crate::hardware::GpioBank;
use crate::mailbox::CommandMailbox;
use crate::packet::{KIND_GPIO, KIND_MOTOR, KIND_RESET, KIND_TIME_SYNC, PacketTransport};

/// Where the board clock goes in a bounced time sync packet. The first word is the host cookie.
const TIME_SYNC_MILLIS: core::ops::Range<usize> = 4..8;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Disposition {
    /// Nothing was waiting.
    Idle,
    /// One packet was consumed.
    Handled,
    /// The host asked for a system reset. The packet has been freed.
    Reset,
}

#[derive(Debug)]
pub struct Dispatcher<G: GpioBank> {
    gpio: G,
    crc_errors: u32,
    rejected_commands: u32,
}

impl<G: GpioBank> Dispatcher<G> {
    pub const fn new(gpio: G) -> Self {
        Self {
            gpio,
            crc_errors: 0,
            rejected_commands: 0,
        }
    }

    pub fn gpio(&self) -> &G {
        &self.gpio
    }

    /// Packets dropped because the transport flagged them.
    pub fn crc_errors(&self) -> u32 {
        self.crc_errors
    }

    /// Motor and GPIO packets dropped because they did not decode.
    pub fn rejected_commands(&self) -> u32 {
        self.rejected_commands
    }

    /// Handle at most one received packet.
    #[allow(clippy::cast_possible_truncation)]
    pub fn poll(
        &mut self,
        transport: &mut impl PacketTransport,
        mailbox: &CommandMailbox,
        now: Instant,
    ) -> Disposition {
        let Some(mut packet) = transport.try_receive() else {
            return Disposition::Idle;
        };

        if packet.has_error() {
            self.crc_errors = self.crc_errors.wrapping_add(1);
            log_warn!("CRC error in packet id {}", packet.id);
            transport.free(packet);
            return Disposition::Handled;
        }

        match packet.kind {
            KIND_TIME_SYNC => {
                let millis = now.as_millis() as u32;
                packet.data[TIME_SYNC_MILLIS].copy_from_slice(&millis.to_le_bytes());
                transport.send(packet);
            }
            KIND_MOTOR => {
                match Command::from_packet(&packet) {
                    Ok(command) => mailbox.apply(&command),
                    Err(err) => {
                        self.rejected_commands = self.rejected_commands.wrapping_add(1);
                        log_warn!("dropping motor command: {}", err);
                    }
                }
                transport.free(packet);
            }
            KIND_GPIO => {
                match GpioSet::from_packet(&packet) {
                    Ok(set) => self.gpio.set_level(set.port, set.pin, set.high),
                    Err(err) => {
                        self.rejected_commands = self.rejected_commands.wrapping_add(1);
                        log_warn!("dropping GPIO command: {}", err);
                    }
                }
                transport.free(packet);
            }
            KIND_RESET => {
                transport.free(packet);
                return Disposition::Reset;
            }
            kind => {
                log_trace!("bouncing packet kind {}", kind);
                transport.send(packet);
            }
        }
        Disposition::Handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::SpeedRequest;
    use crate::hardware::mock::{MockGpio, MockTransport};
    use crate::mailbox::MotorCommand;
    use crate::packet::{FLAG_CRC_ERROR, Packet};
    use crate::{Channel, Direction};

    fn speed_packet(magnitude: u32) -> Packet {
        let mut packet = Packet::default();
        Command::SetSpeed([SpeedRequest {
            direction: Direction::Forward,
            magnitude,
        }; 2])
        .encode_into(&mut packet);
        packet
    }

    #[test]
    fn idle_without_packets() {
        let mut transport = MockTransport::default();
        let mailbox = CommandMailbox::default();
        let mut dispatcher = Dispatcher::new(MockGpio::default());
        assert_eq!(
            dispatcher.poll(&mut transport, &mailbox, Instant::from_millis(0)),
            Disposition::Idle
        );
    }

    #[test]
    fn motor_command_reaches_mailbox() {
        let mut transport = MockTransport::default();
        transport.inbound.push_back(speed_packet(50));
        let mailbox = CommandMailbox::default();
        let mut dispatcher = Dispatcher::new(MockGpio::default());
        assert_eq!(
            dispatcher.poll(&mut transport, &mailbox, Instant::from_millis(0)),
            Disposition::Handled
        );
        assert_eq!(mailbox.command(Channel::A).setpoint, 525);
        assert_eq!(mailbox.command(Channel::B).setpoint, 525);
        assert_eq!(transport.freed.len(), 1);
        assert!(transport.sent.is_empty());
    }

    #[test]
    fn corrupted_command_changes_nothing() {
        let mut transport = MockTransport::default();
        let mut packet = speed_packet(50);
        packet.flags |= FLAG_CRC_ERROR;
        transport.inbound.push_back(packet);
        let mut bad_direction = speed_packet(50);
        bad_direction.data[4] = 3;
        transport.inbound.push_back(bad_direction);

        let mailbox = CommandMailbox::default();
        let mut dispatcher = Dispatcher::new(MockGpio::default());
        for _ in 0..2 {
            assert_eq!(
                dispatcher.poll(&mut transport, &mailbox, Instant::from_millis(0)),
                Disposition::Handled
            );
        }
        for channel in Channel::ALL {
            assert_eq!(mailbox.command(channel), MotorCommand::STOPPED);
        }
        assert_eq!(dispatcher.crc_errors(), 1);
        assert_eq!(dispatcher.rejected_commands(), 1);
        assert_eq!(transport.freed.len(), 2);
    }

    #[test]
    fn time_sync_is_bounced_with_board_clock() {
        let mut transport = MockTransport::default();
        let mut packet = Packet {
            kind: KIND_TIME_SYNC,
            id: 7,
            ..Packet::default()
        };
        packet.data[0..4].copy_from_slice(&0xDEAD_BEEF_u32.to_le_bytes());
        transport.inbound.push_back(packet);

        let mut dispatcher = Dispatcher::new(MockGpio::default());
        dispatcher.poll(
            &mut transport,
            &CommandMailbox::default(),
            Instant::from_millis(1234),
        );
        let reply = transport.sent[0];
        assert_eq!(reply.id, 7);
        assert_eq!(reply.data[0..4], 0xDEAD_BEEF_u32.to_le_bytes());
        assert_eq!(reply.data[4..8], 1234u32.to_le_bytes());
    }

    #[test]
    fn unknown_kinds_are_bounced() {
        let mut transport = MockTransport::default();
        let packet = Packet {
            kind: 0x42,
            ..Packet::default()
        };
        transport.inbound.push_back(packet);
        let mut dispatcher = Dispatcher::new(MockGpio::default());
        dispatcher.poll(
            &mut transport,
            &CommandMailbox::default(),
            Instant::from_millis(0),
        );
        assert_eq!(transport.sent, vec![packet]);
    }

    #[test]
    fn reset_request() {
        let mut transport = MockTransport::default();
        transport.inbound.push_back(Packet {
            kind: KIND_RESET,
            ..Packet::default()
        });
        let mut dispatcher = Dispatcher::new(MockGpio::default());
        assert_eq!(
            dispatcher.poll(
                &mut transport,
                &CommandMailbox::default(),
                Instant::from_millis(0)
            ),
            Disposition::Reset
        );
        assert_eq!(transport.freed.len(), 1);
    }

    #[test]
    fn gpio_request_drives_output() {
        let mut transport = MockTransport::default();
        let mut on = Packet::default();
        GpioSet {
            port: 2,
            pin: 13,
            high: true,
        }
        .encode_into(&mut on);
        transport.inbound.push_back(on);
        let mut out_of_range = on;
        out_of_range.data[0] = 3;
        transport.inbound.push_back(out_of_range);
        let mut bad_pin = on;
        bad_pin.data[1] = 16;
        transport.inbound.push_back(bad_pin);

        let mailbox = CommandMailbox::default();
        let mut dispatcher = Dispatcher::new(MockGpio::default());
        for _ in 0..3 {
            assert_eq!(
                dispatcher.poll(&mut transport, &mailbox, Instant::from_millis(0)),
                Disposition::Handled
            );
        }
        assert_eq!(dispatcher.gpio().writes, vec![(2, 13, true)]);
        assert_eq!(dispatcher.rejected_commands(), 2);
        // Consumed, not bounced.
        assert_eq!(transport.freed.len(), 3);
        assert!(transport.sent.is_empty());
    }
}
