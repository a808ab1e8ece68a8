//! Typed CH9329 commands and replies.
//!
//! Every command has a device-bound [`CommandPacket`] and a host-bound
//! [`ReplyPacket`], tied together by the command code. Type aliases for each
//! pair live in the submodules, e.g. [`GetInfoPacket`](info::GetInfoPacket) and
//! [`GetInfoReplyPacket`](info::GetInfoReplyPacket).

use thiserror::Error;

use crate::{
    decode::{Decode, DecodeError, DecodeErrorKind},
    encode::{Encode, EncodeError},
    frame::Frame,
};

pub mod config;
pub mod descriptor;
pub mod hid;
pub mod info;

/// Command codes.
///
/// `SEND_MY_HID_DATA` and `READ_MY_HID_DATA` belong to the custom HID mode and
/// are not interpreted by this crate.
pub mod cmds {
    pub const GET_INFO: u8 = 0x01;
    pub const SEND_KB_GENERAL_DATA: u8 = 0x02;
    pub const SEND_KB_MEDIA_DATA: u8 = 0x03;
    pub const SEND_MS_ABS_DATA: u8 = 0x04;
    pub const SEND_MS_REL_DATA: u8 = 0x05;
    pub const SEND_MY_HID_DATA: u8 = 0x06;
    pub const READ_MY_HID_DATA: u8 = 0x87;
    pub const GET_PARA_CFG: u8 = 0x08;
    pub const SET_PARA_CFG: u8 = 0x09;
    pub const GET_USB_STRING: u8 = 0x0A;
    pub const SET_USB_STRING: u8 = 0x0B;
    pub const SET_DEFAULT_CFG: u8 = 0x0C;
    pub const RESET: u8 = 0x0F;
}

/// OR-ed onto the command code of a successful reply.
pub const REPLY_FLAG: u8 = 0x80;

/// OR-ed onto the command code of an error reply.
pub const ERROR_FLAG: u8 = 0xC0;

/// Factory default chip address.
pub const DEFAULT_ADDRESS: u8 = 0x00;

/// Frames sent to this address are accepted by every chip, none of which reply.
pub const BROADCAST_ADDRESS: u8 = 0xFF;

/// Status code reported by the chip in ACK and error replies.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Error)]
pub enum DeviceStatus {
    #[error("Command executed successfully. (0x00)")]
    Success,

    #[error("Device timed out while receiving the frame. (0xE1)")]
    Timeout,

    #[error("Device received a frame with an invalid header. (0xE2)")]
    InvalidHeader,

    #[error("Device does not recognize the command. (0xE3)")]
    InvalidCommand,

    #[error("Device computed a different checksum. (0xE4)")]
    ChecksumMismatch,

    #[error("Device rejected the command parameters. (0xE5)")]
    InvalidParameter,

    #[error("Device failed to execute the command. (0xE6)")]
    OperationFailed,

    #[error("Device sent an unrecognized status code. (0x{0:02X})")]
    Unknown(u8),
}

impl DeviceStatus {
    pub const fn code(self) -> u8 {
        match self {
            Self::Success => 0x00,
            Self::Timeout => 0xE1,
            Self::InvalidHeader => 0xE2,
            Self::InvalidCommand => 0xE3,
            Self::ChecksumMismatch => 0xE4,
            Self::InvalidParameter => 0xE5,
            Self::OperationFailed => 0xE6,
            Self::Unknown(code) => code,
        }
    }

    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<u8> for DeviceStatus {
    fn from(code: u8) -> Self {
        match code {
            0x00 => Self::Success,
            0xE1 => Self::Timeout,
            0xE2 => Self::InvalidHeader,
            0xE3 => Self::InvalidCommand,
            0xE4 => Self::ChecksumMismatch,
            0xE5 => Self::InvalidParameter,
            0xE6 => Self::OperationFailed,
            other => Self::Unknown(other),
        }
    }
}

impl Decode for DeviceStatus {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        u8::decode(data).map(Self::from)
    }
}

impl Encode for DeviceStatus {
    fn size(&self) -> usize {
        1
    }

    fn encode(&self, data: &mut [u8]) {
        data[0] = self.code();
    }
}

/// Payload of replies that carry nothing but a [`DeviceStatus`].
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub struct Ack;

/// A payload that can appear in a successful (`CMD | 0x80`) reply.
pub trait ReplyPayload: Sized {
    /// Decodes the payload, or the status the device reported in its place.
    fn decode_reply(data: &mut &[u8]) -> Result<Result<Self, DeviceStatus>, DecodeError>;

    /// The value to assume when the request was broadcast, if the command
    /// succeeds without a reply.
    fn unanswered() -> Option<Self> {
        None
    }
}

impl ReplyPayload for Ack {
    fn decode_reply(data: &mut &[u8]) -> Result<Result<Self, DeviceStatus>, DecodeError> {
        let status = DeviceStatus::decode(data)?;
        Ok(if status.is_success() { Ok(Ack) } else { Err(status) })
    }

    fn unanswered() -> Option<Self> {
        Some(Ack)
    }
}

macro_rules! impl_reply_payload {
    ($($t:ty),*) => {
        $(
            impl ReplyPayload for $t {
                fn decode_reply(data: &mut &[u8]) -> Result<Result<Self, DeviceStatus>, DecodeError> {
                    Ok(Ok(<$t>::decode(data)?))
                }
            }
        )*
    };
}

impl_reply_payload!(
    info::DeviceInfo,
    config::DeviceConfig,
    descriptor::UsbDescriptor
);

/// A request that can be sent to the chip.
pub trait Command {
    const CMD: u8;

    /// Frames the request for the chip at `address`.
    ///
    /// # Errors
    ///
    /// Returns an [`EncodeError`] if the payload does not fit in a frame.
    fn to_frame(&self, address: u8) -> Result<Frame, EncodeError>;
}

/// A reply that answers a [`Command`] with the same `CMD`.
pub trait Reply: Sized {
    const CMD: u8;
    type Payload;

    /// Whether `frame` echoes this reply's command code.
    fn answers(frame: &Frame) -> bool {
        frame.command == Self::CMD | REPLY_FLAG || frame.command == Self::CMD | ERROR_FLAG
    }

    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the frame does not hold a valid reply.
    fn decode_frame(frame: &Frame) -> Result<Self, DecodeError>;

    fn into_payload(self) -> Result<Self::Payload, DeviceStatus>;

    /// See [`ReplyPayload::unanswered`].
    fn unanswered() -> Option<Self::Payload>;
}

/// Device-bound command packet.
///
/// | Field     | Size | Description |
/// |-----------|------|-------------|
/// | `payload` | n    | Encoded payload, framed with `CMD` by [`Command::to_frame`]. |
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CommandPacket<const CMD: u8, P: Encode> {
    payload: P,
}

impl<const CMD: u8, P: Encode> CommandPacket<CMD, P> {
    /// Creates a new device-bound packet with a given generic payload type.
    pub fn new(payload: P) -> Self {
        Self { payload }
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }
}

impl<const CMD: u8, P: Encode> Command for CommandPacket<CMD, P> {
    const CMD: u8 = CMD;

    fn to_frame(&self, address: u8) -> Result<Frame, EncodeError> {
        Frame::new(address, CMD, self.payload.to_bytes())
    }
}

/// Host-bound reply packet.
///
/// A reply echoes the command code with [`REPLY_FLAG`] set on success, in which
/// case it carries `P`, or with [`ERROR_FLAG`] set, in which case it carries a
/// single [`DeviceStatus`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ReplyPacket<const CMD: u8, P: ReplyPayload> {
    /// Address of the chip that replied.
    pub address: u8,

    pub payload: Result<P, DeviceStatus>,
}

impl<const CMD: u8, P: ReplyPayload> Reply for ReplyPacket<CMD, P> {
    const CMD: u8 = CMD;
    type Payload = P;

    fn decode_frame(frame: &Frame) -> Result<Self, DecodeError> {
        let mut data = frame.payload();

        let payload = if frame.command == CMD | ERROR_FLAG {
            return Ok(Self {
                address: frame.address,
                payload: Err(DeviceStatus::decode(&mut data)?),
            });
        } else if frame.command == CMD | REPLY_FLAG {
            P::decode_reply(&mut data)?
        } else {
            return Err(DecodeError::new::<Self>(DecodeErrorKind::UnexpectedByte {
                name: "cmd",
                value: frame.command,
                expected: &[],
            }));
        };

        if !data.is_empty() {
            return Err(DecodeError::new::<Self>(DecodeErrorKind::TrailingBytes {
                count: data.len(),
            }));
        }

        Ok(Self {
            address: frame.address,
            payload,
        })
    }

    fn into_payload(self) -> Result<P, DeviceStatus> {
        self.payload
    }

    fn unanswered() -> Option<P> {
        P::unanswered()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packets::info::{GetInfoPacket, GetInfoReplyPacket};

    type KeyboardAck = ReplyPacket<{ cmds::SEND_KB_GENERAL_DATA }, Ack>;

    #[test]
    fn status_codes_round_trip() {
        for code in [0x00, 0xE1, 0xE2, 0xE3, 0xE4, 0xE5, 0xE6, 0x42] {
            assert_eq!(DeviceStatus::from(code).code(), code);
        }
        assert_eq!(DeviceStatus::from(0xE5), DeviceStatus::InvalidParameter);
        assert_eq!(DeviceStatus::from(0x01), DeviceStatus::Unknown(0x01));
    }

    #[test]
    fn command_packet_frames_with_address() {
        let frame = GetInfoPacket::new(()).to_frame(0x03).unwrap();
        assert_eq!(frame.address, 0x03);
        assert_eq!(frame.command, cmds::GET_INFO);
        assert!(frame.payload().is_empty());
    }

    #[test]
    fn ack_reply_decodes_status() {
        let ok = Frame::new(0x00, 0x82, vec![0x00]).unwrap();
        assert_eq!(KeyboardAck::decode_frame(&ok).unwrap().payload, Ok(Ack));

        let nack = Frame::new(0x00, 0x82, vec![0xE5]).unwrap();
        assert_eq!(
            KeyboardAck::decode_frame(&nack).unwrap().payload,
            Err(DeviceStatus::InvalidParameter)
        );
    }

    #[test]
    fn error_reply_carries_status() {
        let frame = Frame::new(0x00, 0xC1, vec![0xE3]).unwrap();
        assert!(GetInfoReplyPacket::answers(&frame));

        let reply = GetInfoReplyPacket::decode_frame(&frame).unwrap();
        assert_eq!(reply.payload, Err(DeviceStatus::InvalidCommand));
    }

    #[test]
    fn unrelated_commands_are_not_answers() {
        let frame = Frame::new(0x00, 0x82, vec![0x00]).unwrap();
        assert!(!GetInfoReplyPacket::answers(&frame));
        assert!(GetInfoReplyPacket::decode_frame(&frame).is_err());
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let frame = Frame::new(0x00, 0x82, vec![0x00, 0x00]).unwrap();
        assert_eq!(
            KeyboardAck::decode_frame(&frame).unwrap_err().kind(),
            DecodeErrorKind::TrailingBytes { count: 1 }
        );
    }

    #[test]
    fn only_acks_succeed_unanswered() {
        assert_eq!(KeyboardAck::unanswered(), Some(Ack));
        assert_eq!(GetInfoReplyPacket::unanswered(), None);
    }
}
