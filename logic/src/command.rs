//! Motor commands received from the host.
//!
//! Wire format, little endian, inside [`Packet::data`]:
//!
//! | offset | [`TAG_SET_SPEED`]    | [`TAG_TUNE`]           |
//! | ------ | -------------------- | ---------------------- |
//! | 0      | tag                  | tag                    |
//! | 4      | direction A          | channel                |
//! | 8      | magnitude A (%)      | kc (Q16)               |
//! | 12     | direction B          | kd (Q16)               |
//! | 16     | magnitude B (%)      | ki (Q16)               |
//! | 20     |                      | integral limit         |

use core::fmt;

use crate::mailbox::Tuning;
use crate::packet::{KIND_MOTOR, PACKET_DATA_LEN, Packet};
use crate::schedule::Gain;
use crate::{Channel, Direction};

pub const TAG_SET_SPEED: u32 = 0;
pub const TAG_TUNE: u32 = 1;

const FIELD_LEN: usize = 4;
pub const SET_SPEED_LEN: usize = 5 * FIELD_LEN;
pub const TUNE_LEN: usize = 6 * FIELD_LEN;

const _: () = assert!(TUNE_LEN <= PACKET_DATA_LEN);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpeedRequest {
    pub direction: Direction,
    /// Percent of full speed. Values above 100 are clamped when applied.
    pub magnitude: u32,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// New speed for both channels, A first.
    SetSpeed([SpeedRequest; 2]),
    Tune { channel: Channel, tuning: Tuning },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// The transport flagged the packet as corrupted.
    CrcError,
    WrongKind(u8),
    Truncated { needed: usize, got: usize },
    UnknownTag(u32),
    InvalidDirection(u32),
    InvalidChannel(u32),
    InvalidIntegralLimit(i32),
    GpioOutOfRange { port: u8, pin: u8 },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::CrcError => write!(f, "packet failed its CRC check"),
            DecodeError::WrongKind(kind) => write!(f, "packet kind {kind} is not a motor command"),
            DecodeError::Truncated { needed, got } => {
                write!(f, "command needs {needed} bytes, got {got}")
            }
            DecodeError::UnknownTag(tag) => write!(f, "unknown command tag {tag}"),
            DecodeError::InvalidDirection(raw) => write!(f, "invalid direction {raw}"),
            DecodeError::InvalidChannel(raw) => write!(f, "invalid channel {raw}"),
            DecodeError::InvalidIntegralLimit(limit) => {
                write!(f, "integral limit {limit} is negative")
            }
            DecodeError::GpioOutOfRange { port, pin } => {
                write!(f, "GPIO out of range (port {port}, pin {pin})")
            }
        }
    }
}

/// Little endian 32 bit fields of a length checked payload.
struct Fields<'a>(&'a [u8]);

impl<'a> Fields<'a> {
    fn new(bytes: &'a [u8], needed: usize) -> Result<Self, DecodeError> {
        if bytes.len() < needed {
            return Err(DecodeError::Truncated {
                needed,
                got: bytes.len(),
            });
        }
        Ok(Self(bytes))
    }

    fn raw(&self, index: usize) -> [u8; FIELD_LEN] {
        let at = index * FIELD_LEN;
        [self.0[at], self.0[at + 1], self.0[at + 2], self.0[at + 3]]
    }
    fn u32(&self, index: usize) -> u32 {
        u32::from_le_bytes(self.raw(index))
    }
    fn i32(&self, index: usize) -> i32 {
        i32::from_le_bytes(self.raw(index))
    }
    fn direction(&self, index: usize) -> Result<Direction, DecodeError> {
        let raw = self.u32(index);
        Direction::from_wire(raw).ok_or(DecodeError::InvalidDirection(raw))
    }
}

impl Command {
    /// Decode a command payload. Nothing is produced unless every field is valid.
    pub fn decode(bytes: &[u8]) -> Result<Command, DecodeError> {
        match Fields::new(bytes, FIELD_LEN)?.u32(0) {
            TAG_SET_SPEED => {
                let fields = Fields::new(bytes, SET_SPEED_LEN)?;
                let request = |channel: Channel| -> Result<SpeedRequest, DecodeError> {
                    let base = 1 + 2 * channel.index();
                    Ok(SpeedRequest {
                        direction: fields.direction(base)?,
                        magnitude: fields.u32(base + 1),
                    })
                };
                Ok(Command::SetSpeed([
                    request(Channel::A)?,
                    request(Channel::B)?,
                ]))
            }
            TAG_TUNE => {
                let fields = Fields::new(bytes, TUNE_LEN)?;
                let raw_channel = fields.u32(1);
                let channel =
                    Channel::from_index(raw_channel).ok_or(DecodeError::InvalidChannel(raw_channel))?;
                let gain = Gain::from_bits(fields.i32(2), fields.i32(3), fields.i32(4));
                let integral_limit = fields.i32(5);
                if integral_limit < 0 {
                    return Err(DecodeError::InvalidIntegralLimit(integral_limit));
                }
                Ok(Command::Tune {
                    channel,
                    tuning: Tuning {
                        override_gain: (!gain.is_zero()).then_some(gain),
                        integral_limit,
                    },
                })
            }
            tag => Err(DecodeError::UnknownTag(tag)),
        }
    }

    /// Decode a received packet, rejecting corrupted packets and other kinds.
    pub fn from_packet(packet: &Packet) -> Result<Command, DecodeError> {
        if packet.has_error() {
            return Err(DecodeError::CrcError);
        }
        if packet.kind != KIND_MOTOR {
            return Err(DecodeError::WrongKind(packet.kind));
        }
        Self::decode(&packet.data)
    }

    /// Write the command into `packet` as the host would send it.
    #[allow(clippy::cast_possible_truncation)]
    pub fn encode_into(&self, packet: &mut Packet) {
        let mut words = [0u32; TUNE_LEN / FIELD_LEN];
        match self {
            Command::SetSpeed(requests) => {
                words[0] = TAG_SET_SPEED;
                for (i, request) in requests.iter().enumerate() {
                    words[1 + 2 * i] = request.direction.to_wire();
                    words[2 + 2 * i] = request.magnitude;
                }
            }
            Command::Tune { channel, tuning } => {
                let gain = tuning.override_gain.unwrap_or(Gain::ZERO);
                words[0] = TAG_TUNE;
                words[1] = channel.index() as u32;
                words[2] = u32::from_le_bytes(gain.kc.to_bits().to_le_bytes());
                words[3] = u32::from_le_bytes(gain.kd.to_bits().to_le_bytes());
                words[4] = u32::from_le_bytes(gain.ki.to_bits().to_le_bytes());
                words[5] = u32::from_le_bytes(tuning.integral_limit.to_le_bytes());
            }
        }
        packet.kind = KIND_MOTOR;
        packet.part_count = 1;
        packet.flags = 0;
        packet.data = [0; PACKET_DATA_LEN];
        for (chunk, word) in packet.data.chunks_exact_mut(FIELD_LEN).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
    }
}
