//! HID reports relayed by the chip to the USB host.
//!
//! All report commands are answered with an [`Ack`].

use bitflags::bitflags;

use super::{
    cmds::{SEND_KB_GENERAL_DATA, SEND_KB_MEDIA_DATA, SEND_MS_ABS_DATA, SEND_MS_REL_DATA},
    Ack, CommandPacket, ReplyPacket,
};
use crate::encode::{Encode, EncodeError, MessageEncoder};

pub type KeyboardReportPacket = CommandPacket<SEND_KB_GENERAL_DATA, KeyReport>;
pub type KeyboardReportReplyPacket = ReplyPacket<SEND_KB_GENERAL_DATA, Ack>;

pub type MediaReportPacket = CommandPacket<SEND_KB_MEDIA_DATA, MediaReport>;
pub type MediaReportReplyPacket = ReplyPacket<SEND_KB_MEDIA_DATA, Ack>;

pub type AbsoluteMouseReportPacket = CommandPacket<SEND_MS_ABS_DATA, AbsoluteMouseReport>;
pub type AbsoluteMouseReportReplyPacket = ReplyPacket<SEND_MS_ABS_DATA, Ack>;

pub type RelativeMouseReportPacket = CommandPacket<SEND_MS_REL_DATA, RelativeMouseReport>;
pub type RelativeMouseReportReplyPacket = ReplyPacket<SEND_MS_REL_DATA, Ack>;

bitflags! {
    /// Keyboard modifier byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const LEFT_CTRL = 1 << 0;
        const LEFT_SHIFT = 1 << 1;
        const LEFT_ALT = 1 << 2;
        const LEFT_GUI = 1 << 3;
        const RIGHT_CTRL = 1 << 4;
        const RIGHT_SHIFT = 1 << 5;
        const RIGHT_ALT = 1 << 6;
        const RIGHT_GUI = 1 << 7;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MouseButtons: u8 {
        const LEFT = 1 << 0;
        const RIGHT = 1 << 1;
        const MIDDLE = 1 << 2;
    }
}

bitflags! {
    /// System control keys sent through the media report.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AcpiKeys: u8 {
        const POWER = 1 << 0;
        const SLEEP = 1 << 1;
        const WAKE = 1 << 2;
    }
}

/// Standard 8-byte boot keyboard report.
///
/// | Field       | Size | Description |
/// |-------------|------|-------------|
/// | `modifiers` | 1    | [`Modifiers`] bits. |
/// | `reserved`  | 1    | Always zero. |
/// | `keys`      | 6    | HID usage codes, zero for an empty slot. |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KeyReport {
    pub modifiers: Modifiers,
    keys: [u8; 6],
}

impl KeyReport {
    pub const MAX_KEYS: usize = 6;

    /// # Errors
    ///
    /// Returns [`EncodeError::TooManyKeys`] if more than six keys are given.
    pub fn new(modifiers: Modifiers, keys: &[u8]) -> Result<Self, EncodeError> {
        if keys.len() > Self::MAX_KEYS {
            return Err(EncodeError::TooManyKeys { count: keys.len() });
        }

        let mut slots = [0; Self::MAX_KEYS];
        slots[..keys.len()].copy_from_slice(keys);

        Ok(Self {
            modifiers,
            keys: slots,
        })
    }

    /// A report with every key and modifier released.
    pub const fn released() -> Self {
        Self {
            modifiers: Modifiers::empty(),
            keys: [0; Self::MAX_KEYS],
        }
    }

    pub fn keys(&self) -> &[u8; 6] {
        &self.keys
    }
}

impl Encode for KeyReport {
    fn size(&self) -> usize {
        8
    }

    fn encode(&self, data: &mut [u8]) {
        let mut enc = MessageEncoder::new(data);
        enc.write(&self.modifiers.bits());
        enc.write(&0u8);
        enc.write(&self.keys);
    }
}

/// Multimedia keyboard report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaReport {
    /// `[0x01, keys]`
    Acpi(AcpiKeys),

    /// `[0x02, b1, b2, b3]`: the chip's multimedia key bitmap.
    Multimedia([u8; 3]),
}

impl MediaReport {
    /// Releases every multimedia key.
    pub const fn released() -> Self {
        Self::Multimedia([0; 3])
    }
}

impl Encode for MediaReport {
    fn size(&self) -> usize {
        match self {
            Self::Acpi(_) => 2,
            Self::Multimedia(_) => 4,
        }
    }

    fn encode(&self, data: &mut [u8]) {
        let mut enc = MessageEncoder::new(data);
        match self {
            Self::Acpi(keys) => {
                enc.write(&0x01u8);
                enc.write(&keys.bits());
            }
            Self::Multimedia(bitmap) => {
                enc.write(&0x02u8);
                enc.write(bitmap);
            }
        }
    }
}

/// Mouse movement relative to the current cursor position.
///
/// | Field     | Size | Description |
/// |-----------|------|-------------|
/// | `mode`    | 1    | Always `0x01`. |
/// | `buttons` | 1    | [`MouseButtons`] bits. |
/// | `dx`      | 1    | Signed horizontal movement. |
/// | `dy`      | 1    | Signed vertical movement. |
/// | `wheel`   | 1    | Signed wheel steps. |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RelativeMouseReport {
    pub buttons: MouseButtons,
    pub dx: i8,
    pub dy: i8,
    pub wheel: i8,
}

impl RelativeMouseReport {
    /// Builds a report, saturating each axis to `-127..=127`.
    pub fn clamped(buttons: MouseButtons, dx: i32, dy: i32, wheel: i32) -> Self {
        let clamp = |v: i32| v.clamp(-127, 127) as i8;
        Self {
            buttons,
            dx: clamp(dx),
            dy: clamp(dy),
            wheel: clamp(wheel),
        }
    }
}

impl Encode for RelativeMouseReport {
    fn size(&self) -> usize {
        5
    }

    fn encode(&self, data: &mut [u8]) {
        let mut enc = MessageEncoder::new(data);
        enc.write(&0x01u8);
        enc.write(&(self.buttons & MouseButtons::all()).bits());
        enc.write(&self.dx);
        enc.write(&self.dy);
        enc.write(&self.wheel);
    }
}

/// Mouse position on the chip's absolute coordinate grid.
///
/// | Field     | Size | Description |
/// |-----------|------|-------------|
/// | `mode`    | 1    | Always `0x02`. |
/// | `buttons` | 1    | [`MouseButtons`] bits. |
/// | `x`       | 2    | Little-endian, `0..=4095`. |
/// | `y`       | 2    | Little-endian, `0..=4095`. |
/// | `wheel`   | 1    | Signed wheel steps. |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AbsoluteMouseReport {
    pub buttons: MouseButtons,
    x: u16,
    y: u16,
    pub wheel: i8,
}

impl AbsoluteMouseReport {
    /// Largest coordinate on either axis.
    pub const MAX_COORDINATE: u16 = 4095;

    /// # Errors
    ///
    /// Returns [`EncodeError::CoordinateOutOfRange`] if either coordinate is
    /// above [`Self::MAX_COORDINATE`].
    pub fn new(buttons: MouseButtons, x: u16, y: u16, wheel: i8) -> Result<Self, EncodeError> {
        for value in [x, y] {
            if value > Self::MAX_COORDINATE {
                return Err(EncodeError::CoordinateOutOfRange {
                    value,
                    max: Self::MAX_COORDINATE,
                });
            }
        }

        Ok(Self {
            buttons,
            x,
            y,
            wheel,
        })
    }

    pub fn x(&self) -> u16 {
        self.x
    }

    pub fn y(&self) -> u16 {
        self.y
    }
}

impl Encode for AbsoluteMouseReport {
    fn size(&self) -> usize {
        7
    }

    fn encode(&self, data: &mut [u8]) {
        let mut enc = MessageEncoder::new(data);
        enc.write(&0x02u8);
        enc.write(&(self.buttons & MouseButtons::all()).bits());
        enc.write(&self.x);
        enc.write(&self.y);
        enc.write(&self.wheel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_report_layout() {
        let report = KeyReport::new(Modifiers::LEFT_SHIFT, &[0x04]).unwrap();
        assert_eq!(report.to_bytes(), vec![0x02, 0x00, 0x04, 0, 0, 0, 0, 0]);
        assert_eq!(KeyReport::released().to_bytes(), vec![0; 8]);
    }

    #[test]
    fn key_report_allows_duplicates_and_rejects_seven_keys() {
        let report = KeyReport::new(Modifiers::empty(), &[0x04, 0x04, 0x00]).unwrap();
        assert_eq!(report.keys(), &[0x04, 0x04, 0, 0, 0, 0]);

        assert_eq!(
            KeyReport::new(Modifiers::empty(), &[1, 2, 3, 4, 5, 6, 7]),
            Err(EncodeError::TooManyKeys { count: 7 })
        );
    }

    #[test]
    fn absolute_report_layout() {
        let report = AbsoluteMouseReport::new(MouseButtons::LEFT, 100, 200, 0).unwrap();
        assert_eq!(
            report.to_bytes(),
            vec![0x02, 0x01, 0x64, 0x00, 0xC8, 0x00, 0x00]
        );

        let corner = AbsoluteMouseReport::new(MouseButtons::empty(), 4095, 4095, -1).unwrap();
        assert_eq!(
            corner.to_bytes(),
            vec![0x02, 0x00, 0xFF, 0x0F, 0xFF, 0x0F, 0xFF]
        );
    }

    #[test]
    fn absolute_report_rejects_out_of_range() {
        assert_eq!(
            AbsoluteMouseReport::new(MouseButtons::empty(), 0, 4096, 0),
            Err(EncodeError::CoordinateOutOfRange {
                value: 4096,
                max: 4095
            })
        );
    }

    #[test]
    fn relative_report_clamps() {
        let report = RelativeMouseReport::clamped(MouseButtons::RIGHT, 300, -300, -2);
        assert_eq!(report.to_bytes(), vec![0x01, 0x02, 0x7F, 0x81, 0xFE]);
    }

    #[test]
    fn relative_report_masks_unknown_buttons() {
        let report = RelativeMouseReport {
            buttons: MouseButtons::from_bits_retain(0xFF),
            ..Default::default()
        };
        assert_eq!(report.to_bytes()[1], 0x07);
    }

    #[test]
    fn media_report_layouts() {
        assert_eq!(
            MediaReport::Acpi(AcpiKeys::POWER | AcpiKeys::WAKE).to_bytes(),
            vec![0x01, 0x05]
        );
        assert_eq!(
            MediaReport::Multimedia([0x00, 0x40, 0x00]).to_bytes(),
            vec![0x02, 0x00, 0x40, 0x00]
        );
        assert_eq!(MediaReport::released().to_bytes(), vec![0x02, 0, 0, 0]);
    }
}
