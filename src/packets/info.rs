use bitflags::bitflags;

use super::{cmds::GET_INFO, CommandPacket, ReplyPacket};
use crate::decode::{Decode, DecodeError};

pub type GetInfoPacket = CommandPacket<GET_INFO, ()>;
pub type GetInfoReplyPacket = ReplyPacket<GET_INFO, DeviceInfo>;

bitflags! {
    /// Keyboard LED state as reported by the USB host.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LedStatus: u8 {
        const NUM_LOCK = 1 << 0;
        const CAPS_LOCK = 1 << 1;
        const SCROLL_LOCK = 1 << 2;
    }
}

/// Snapshot of the chip's state at the time of a get-info request.
///
/// # Encoding
///
/// | Field        | Size | Description |
/// |--------------|------|-------------|
/// | `version`    | 1    | Firmware version, `0x30` is V1.0. |
/// | `usb_status` | 1    | `0x01` once the USB host has enumerated the chip. |
/// | `leds`       | 1    | [`LedStatus`] bits. |
/// | `reserved`   | n    | Ignored. |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceInfo {
    pub firmware_version: u8,
    pub usb_connected: bool,
    pub num_lock_on: bool,
    pub caps_lock_on: bool,
    pub scroll_lock_on: bool,
}

impl DeviceInfo {
    /// Renders the firmware version byte, e.g. `"V1.0"` for `0x30`.
    pub fn version_string(&self) -> String {
        match self.firmware_version {
            v @ 0x30..=0x39 => format!("V1.{}", v - 0x30),
            other => format!("Unknown (0x{other:02X})"),
        }
    }

    pub fn leds(&self) -> LedStatus {
        let mut leds = LedStatus::empty();
        leds.set(LedStatus::NUM_LOCK, self.num_lock_on);
        leds.set(LedStatus::CAPS_LOCK, self.caps_lock_on);
        leds.set(LedStatus::SCROLL_LOCK, self.scroll_lock_on);
        leds
    }
}

impl Decode for DeviceInfo {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let firmware_version = u8::decode(data)?;
        let usb_connected = u8::decode(data)? == 0x01;
        let leds = LedStatus::from_bits_truncate(u8::decode(data)?);

        // Reserved tail. Its length varies between firmware revisions.
        *data = &data[data.len()..];

        Ok(Self {
            firmware_version,
            usb_connected,
            num_lock_on: leds.contains(LedStatus::NUM_LOCK),
            caps_lock_on: leds.contains(LedStatus::CAPS_LOCK),
            scroll_lock_on: leds.contains(LedStatus::SCROLL_LOCK),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{decode::DecodeErrorKind, frame::Frame, packets::Reply};

    #[test]
    fn decodes_connected_chip_with_caps_lock() {
        let frame = Frame::new(
            0x00,
            0x81,
            vec![0x30, 0x01, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        )
        .unwrap();
        let info = GetInfoReplyPacket::decode_frame(&frame)
            .unwrap()
            .payload
            .unwrap();

        assert_eq!(info.firmware_version, 0x30);
        assert_eq!(info.version_string(), "V1.0");
        assert!(info.usb_connected);
        assert!(!info.num_lock_on);
        assert!(info.caps_lock_on);
        assert!(!info.scroll_lock_on);
        assert_eq!(info.leds(), LedStatus::CAPS_LOCK);
    }

    #[test]
    fn version_strings() {
        let mut data: &[u8] = &[0x39, 0x00, 0x07];
        let info = DeviceInfo::decode(&mut data).unwrap();
        assert_eq!(info.version_string(), "V1.9");
        assert!(!info.usb_connected);
        assert_eq!(info.leds(), LedStatus::all());

        let mut data: &[u8] = &[0x2F, 0x00, 0x00];
        assert_eq!(
            DeviceInfo::decode(&mut data).unwrap().version_string(),
            "Unknown (0x2F)"
        );
    }

    #[test]
    fn short_payload_fails() {
        let mut data: &[u8] = &[0x30, 0x01];
        assert_eq!(
            DeviceInfo::decode(&mut data).unwrap_err().kind(),
            DecodeErrorKind::UnexpectedEnd
        );
    }
}
