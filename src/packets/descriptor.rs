//! Custom USB string descriptors.
//!
//! The chip reports these in place of its built-in strings when the matching
//! [`DescriptorFlags`](super::config::DescriptorFlags) bit is set.

use super::{
    cmds::{GET_USB_STRING, SET_USB_STRING},
    Ack, CommandPacket, ReplyPacket,
};
use crate::{
    decode::{Decode, DecodeError, DecodeErrorKind},
    encode::{Encode, EncodeError, MessageEncoder},
    string::UsbString,
};

pub type GetUsbStringPacket = CommandPacket<GET_USB_STRING, UsbStringKind>;
pub type GetUsbStringReplyPacket = ReplyPacket<GET_USB_STRING, UsbDescriptor>;

pub type SetUsbStringPacket = CommandPacket<SET_USB_STRING, UsbDescriptor>;
pub type SetUsbStringReplyPacket = ReplyPacket<SET_USB_STRING, Ack>;

/// Descriptor slot selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum UsbStringKind {
    Vendor = 0x00,
    Product = 0x01,
    SerialNumber = 0x02,
}

impl Encode for UsbStringKind {
    fn size(&self) -> usize {
        1
    }

    fn encode(&self, data: &mut [u8]) {
        data[0] = *self as u8;
    }
}

impl Decode for UsbStringKind {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let value = u8::decode(data)?;

        match value {
            0x00 => Ok(Self::Vendor),
            0x01 => Ok(Self::Product),
            0x02 => Ok(Self::SerialNumber),
            _ => Err(DecodeError::new::<Self>(DecodeErrorKind::UnexpectedByte {
                name: "UsbStringKind",
                value,
                expected: &[0x00, 0x01, 0x02],
            })),
        }
    }
}

/// A descriptor slot and its contents.
///
/// | Field   | Size | Description |
/// |---------|------|-------------|
/// | `kind`  | 1    | [`UsbStringKind`]. |
/// | `len`   | 1    | Length of `value`, at most 23. |
/// | `value` | len  | ASCII text. Empty clears the descriptor. |
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UsbDescriptor {
    pub kind: UsbStringKind,
    pub value: UsbString,
}

impl UsbDescriptor {
    /// # Errors
    ///
    /// See [`UsbString::new`].
    pub fn new(kind: UsbStringKind, value: &str) -> Result<Self, EncodeError> {
        Ok(Self {
            kind,
            value: UsbString::new(value)?,
        })
    }
}

impl Encode for UsbDescriptor {
    fn size(&self) -> usize {
        1 + self.value.size()
    }

    fn encode(&self, data: &mut [u8]) {
        let mut enc = MessageEncoder::new(data);
        enc.write(&self.kind);
        enc.write(&self.value);
    }
}

impl Decode for UsbDescriptor {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let kind = UsbStringKind::decode(data)?;
        let value = UsbString::decode(data)?;

        Ok(Self { kind, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{frame::Frame, packets::Command};

    #[test]
    fn set_request_layout() {
        let packet = SetUsbStringPacket::new(
            UsbDescriptor::new(UsbStringKind::Vendor, "My Company").unwrap(),
        );
        let frame = packet.to_frame(0x00).unwrap();

        let mut expected = vec![0x00, 10];
        expected.extend_from_slice(b"My Company");
        assert_eq!(frame.command, SET_USB_STRING);
        assert_eq!(frame.payload(), expected.as_slice());
    }

    #[test]
    fn get_request_selects_slot() {
        let frame = GetUsbStringPacket::new(UsbStringKind::SerialNumber)
            .to_frame(0x00)
            .unwrap();
        assert_eq!(frame.payload(), &[0x02]);
    }

    #[test]
    fn empty_descriptor_is_valid() {
        let descriptor = UsbDescriptor::new(UsbStringKind::Product, "").unwrap();
        assert_eq!(descriptor.to_bytes(), vec![0x01, 0x00]);

        let frame = Frame::new(0x00, 0x8A, vec![0x01, 0x00]).unwrap();
        let mut data = frame.payload();
        assert_eq!(UsbDescriptor::decode(&mut data).unwrap(), descriptor);
    }

    #[test]
    fn rejects_unknown_slot() {
        let mut data: &[u8] = &[0x03, 0x00];
        assert!(matches!(
            UsbDescriptor::decode(&mut data).unwrap_err().kind(),
            DecodeErrorKind::UnexpectedByte { value: 0x03, .. }
        ));
    }
}
