//! Parameter configuration and chip maintenance commands.

use bitflags::bitflags;

use super::{
    cmds::{GET_PARA_CFG, RESET, SET_DEFAULT_CFG, SET_PARA_CFG},
    Ack, CommandPacket, ReplyPacket,
};
use crate::{
    decode::{decode_u16_be, decode_u32_be, Decode, DecodeError, DecodeErrorKind},
    encode::{Encode, EncodeError, MessageEncoder},
    string::FixedBytes,
};

pub type GetConfigPacket = CommandPacket<GET_PARA_CFG, ()>;
pub type GetConfigReplyPacket = ReplyPacket<GET_PARA_CFG, DeviceConfig>;

pub type SetConfigPacket = CommandPacket<SET_PARA_CFG, DeviceConfig>;
pub type SetConfigReplyPacket = ReplyPacket<SET_PARA_CFG, Ack>;

/// Restores the factory configuration. Takes effect after a reset.
pub type SetDefaultConfigPacket = CommandPacket<SET_DEFAULT_CFG, ()>;
pub type SetDefaultConfigReplyPacket = ReplyPacket<SET_DEFAULT_CFG, Ack>;

pub type ResetPacket = CommandPacket<RESET, ()>;
pub type ResetReplyPacket = ReplyPacket<RESET, Ack>;

/// Baud rates the chip's UART can be configured for.
pub const SUPPORTED_BAUD_RATES: [u32; 5] = [9600, 19200, 38400, 57600, 115200];

/// Set on a mode byte when the mode was selected by the chip's mode pins
/// rather than by configuration.
const HARDWARE_MODE_FLAG: u8 = 0x80;

/// Whether a mode is chosen by configuration or by the chip's mode pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeSource {
    Software,
    Hardware,
}

impl ModeSource {
    fn flag(self) -> u8 {
        match self {
            Self::Software => 0,
            Self::Hardware => HARDWARE_MODE_FLAG,
        }
    }
}

/// USB device personality presented to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WorkMode {
    /// Keyboard, media keys and mouse.
    Composite = 0x00,
    Keyboard = 0x01,
    Mouse = 0x02,
    CustomHid = 0x03,
}

impl WorkMode {
    fn from_bits(value: u8) -> Option<Self> {
        Some(match value {
            0x00 => Self::Composite,
            0x01 => Self::Keyboard,
            0x02 => Self::Mouse,
            0x03 => Self::CustomHid,
            _ => return None,
        })
    }
}

/// Interpretation of bytes arriving on the chip's UART.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SerialMode {
    /// The framed command protocol.
    Protocol = 0x00,
    /// Bytes are typed as ASCII keystrokes.
    Ascii = 0x01,
    /// Bytes are forwarded to the custom HID endpoint.
    Transparent = 0x02,
}

impl SerialMode {
    fn from_bits(value: u8) -> Option<Self> {
        Some(match value {
            0x00 => Self::Protocol,
            0x01 => Self::Ascii,
            0x02 => Self::Transparent,
            _ => return None,
        })
    }
}

bitflags! {
    /// Which custom USB string descriptors the chip reports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DescriptorFlags: u8 {
        const SERIAL_NUMBER = 1 << 0;
        const PRODUCT = 1 << 1;
        const VENDOR = 1 << 2;
        /// Master switch, must be set for any of the others to apply.
        const ENABLED = 1 << 7;
    }
}

/// The chip's 50-byte parameter configuration.
///
/// Multi-byte fields are big-endian.
///
/// | Offset | Size | Field |
/// |--------|------|-------|
/// | 0      | 1    | work mode (bit 7: pin selected) |
/// | 1      | 1    | serial mode (bit 7: pin selected) |
/// | 2      | 1    | address |
/// | 3      | 4    | baud rate |
/// | 7      | 2    | reserved |
/// | 9      | 2    | packet interval (ms) |
/// | 11     | 2    | USB vendor ID |
/// | 13     | 2    | USB product ID |
/// | 15     | 2    | keyboard upload interval (ms) |
/// | 17     | 2    | keyboard release delay (ms) |
/// | 19     | 1    | auto enter |
/// | 20     | 8    | enter characters |
/// | 28     | 8    | filter strings |
/// | 36     | 1    | [`DescriptorFlags`] |
/// | 37     | 1    | keyboard fast upload |
/// | 38     | 12   | reserved |
///
/// Reserved bytes read from the device are written back unchanged, as are the
/// raw auto enter and fast upload bytes unless the matching flag was changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceConfig {
    pub work_mode: WorkMode,
    pub work_mode_source: ModeSource,
    pub serial_mode: SerialMode,
    pub serial_mode_source: ModeSource,
    pub address: u8,
    pub baud_rate: u32,
    pub packet_interval: u16,
    pub vendor_id: u16,
    pub product_id: u16,
    pub keyboard_upload_interval: u16,
    pub keyboard_release_delay: u16,
    pub auto_enter: bool,
    pub enter_chars: FixedBytes<8>,
    pub filter_strings: FixedBytes<8>,
    pub custom_descriptors: DescriptorFlags,
    pub fast_upload: bool,
    reserved_after_baud: [u8; 2],
    reserved_tail: [u8; 12],
    auto_enter_byte: u8,
    fast_upload_byte: u8,
}

impl DeviceConfig {
    /// Encoded size in bytes.
    pub const SIZE: usize = 50;

    /// Decodes a complete configuration payload.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeErrorKind::InvalidLength`] unless `payload` is exactly
    /// [`Self::SIZE`] bytes, or [`DecodeErrorKind::UnexpectedByte`] for an
    /// unknown mode.
    pub fn from_bytes(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() != Self::SIZE {
            return Err(DecodeError::new::<Self>(DecodeErrorKind::InvalidLength {
                expected: Self::SIZE,
                found: payload.len(),
            }));
        }

        Self::decode(&mut &payload[..])
    }

    /// Checks that the configuration can be applied.
    ///
    /// # Errors
    ///
    /// - [`EncodeError::UnsupportedBaudRate`] for a rate outside [`SUPPORTED_BAUD_RATES`].
    /// - [`EncodeError::NonAsciiEnterCharacter`] if an enter character is above `0x7F`.
    pub fn validate(&self) -> Result<(), EncodeError> {
        if !SUPPORTED_BAUD_RATES.contains(&self.baud_rate) {
            return Err(EncodeError::UnsupportedBaudRate(self.baud_rate));
        }

        if let Some((index, &value)) = self
            .enter_chars
            .as_raw()
            .iter()
            .enumerate()
            .find(|(_, b)| !b.is_ascii())
        {
            return Err(EncodeError::NonAsciiEnterCharacter { index, value });
        }

        Ok(())
    }

    /// Enables or disables the custom vendor, product and serial number
    /// strings, keeping the master switch in sync.
    pub fn set_custom_descriptors(&mut self, vendor: bool, product: bool, serial_number: bool) {
        let flags = &mut self.custom_descriptors;
        flags.set(DescriptorFlags::VENDOR, vendor);
        flags.set(DescriptorFlags::PRODUCT, product);
        flags.set(DescriptorFlags::SERIAL_NUMBER, serial_number);
        flags.set(DescriptorFlags::ENABLED, vendor || product || serial_number);
    }
}

/// The chip's factory configuration.
impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            work_mode: WorkMode::Composite,
            work_mode_source: ModeSource::Hardware,
            serial_mode: SerialMode::Protocol,
            serial_mode_source: ModeSource::Hardware,
            address: 0x00,
            baud_rate: 9600,
            packet_interval: 3,
            vendor_id: 0x1A86,
            product_id: 0xE129,
            keyboard_upload_interval: 0,
            keyboard_release_delay: 1,
            auto_enter: false,
            enter_chars: FixedBytes::from_raw([0x0D, 0, 0, 0, 0x0D, 0, 0, 0]),
            filter_strings: FixedBytes::default(),
            custom_descriptors: DescriptorFlags::empty(),
            fast_upload: false,
            reserved_after_baud: [0; 2],
            reserved_tail: [0; 12],
            auto_enter_byte: 0,
            fast_upload_byte: 0,
        }
    }
}

/// The captured byte if it still reads as `value`, otherwise `0`/`1`.
fn flag_byte(value: bool, captured: u8) -> u8 {
    if value == (captured != 0) {
        captured
    } else {
        u8::from(value)
    }
}

impl Encode for DeviceConfig {
    fn size(&self) -> usize {
        Self::SIZE
    }

    fn encode(&self, data: &mut [u8]) {
        let mut enc = MessageEncoder::new(data);
        enc.write(&(self.work_mode as u8 | self.work_mode_source.flag()));
        enc.write(&(self.serial_mode as u8 | self.serial_mode_source.flag()));
        enc.write(&self.address);
        enc.write(&self.baud_rate.to_be_bytes());
        enc.write(&self.reserved_after_baud);
        enc.write(&self.packet_interval.to_be_bytes());
        enc.write(&self.vendor_id.to_be_bytes());
        enc.write(&self.product_id.to_be_bytes());
        enc.write(&self.keyboard_upload_interval.to_be_bytes());
        enc.write(&self.keyboard_release_delay.to_be_bytes());
        enc.write(&flag_byte(self.auto_enter, self.auto_enter_byte));
        enc.write(&self.enter_chars);
        enc.write(&self.filter_strings);
        enc.write(&self.custom_descriptors.bits());
        enc.write(&flag_byte(self.fast_upload, self.fast_upload_byte));
        enc.write(&self.reserved_tail);
    }
}

fn decode_mode<M>(
    data: &mut &[u8],
    name: &'static str,
    expected: &'static [u8],
    from_bits: fn(u8) -> Option<M>,
) -> Result<(M, ModeSource), DecodeError> {
    let value = u8::decode(data)?;
    let source = if value & HARDWARE_MODE_FLAG != 0 {
        ModeSource::Hardware
    } else {
        ModeSource::Software
    };

    let mode = from_bits(value & !HARDWARE_MODE_FLAG).ok_or_else(|| {
        DecodeError::new::<M>(DecodeErrorKind::UnexpectedByte {
            name,
            value,
            expected,
        })
    })?;

    Ok((mode, source))
}

impl Decode for DeviceConfig {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        if data.len() < Self::SIZE {
            return Err(DecodeError::new::<Self>(DecodeErrorKind::InvalidLength {
                expected: Self::SIZE,
                found: data.len(),
            }));
        }

        let (work_mode, work_mode_source) = decode_mode(
            data,
            "work mode",
            &[0x00, 0x01, 0x02, 0x03, 0x80, 0x81, 0x82, 0x83],
            WorkMode::from_bits,
        )?;
        let (serial_mode, serial_mode_source) = decode_mode(
            data,
            "serial mode",
            &[0x00, 0x01, 0x02, 0x80, 0x81, 0x82],
            SerialMode::from_bits,
        )?;
        let address = u8::decode(data)?;
        let baud_rate = decode_u32_be(data)?;
        let reserved_after_baud = Decode::decode(data)?;
        let packet_interval = decode_u16_be(data)?;
        let vendor_id = decode_u16_be(data)?;
        let product_id = decode_u16_be(data)?;
        let keyboard_upload_interval = decode_u16_be(data)?;
        let keyboard_release_delay = decode_u16_be(data)?;
        let auto_enter_byte = u8::decode(data)?;
        let enter_chars = FixedBytes::decode(data)?;
        let filter_strings = FixedBytes::decode(data)?;
        let custom_descriptors = DescriptorFlags::from_bits_retain(u8::decode(data)?);
        let fast_upload_byte = u8::decode(data)?;
        let reserved_tail = Decode::decode(data)?;

        Ok(Self {
            work_mode,
            work_mode_source,
            serial_mode,
            serial_mode_source,
            address,
            baud_rate,
            packet_interval,
            vendor_id,
            product_id,
            keyboard_upload_interval,
            keyboard_release_delay,
            auto_enter: auto_enter_byte != 0,
            enter_chars,
            filter_strings,
            custom_descriptors,
            fast_upload: fast_upload_byte != 0,
            reserved_after_baud,
            reserved_tail,
            auto_enter_byte,
            fast_upload_byte,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FACTORY: [u8; 50] = [
        0x80, 0x80, 0x00, // modes, address
        0x00, 0x00, 0x25, 0x80, // 9600 baud
        0x00, 0x00, // reserved
        0x00, 0x03, // packet interval
        0x1A, 0x86, 0xE1, 0x29, // VID, PID
        0x00, 0x00, 0x00, 0x01, // upload interval, release delay
        0x00, // auto enter
        0x0D, 0x00, 0x00, 0x00, 0x0D, 0x00, 0x00, 0x00, // enter characters
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // filter strings
        0x00, 0x00, // descriptor flags, fast upload
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];

    #[test]
    fn default_matches_factory_bytes() {
        assert_eq!(DeviceConfig::default().to_bytes(), FACTORY);
        assert_eq!(DeviceConfig::from_bytes(&FACTORY).unwrap(), DeviceConfig::default());
    }

    #[test]
    fn decodes_big_endian_fields() {
        let mut bytes = FACTORY;
        bytes[0] = 0x01;
        bytes[1] = 0x82;
        bytes[2] = 0x07;
        bytes[3..7].copy_from_slice(&115200u32.to_be_bytes());
        bytes[11..13].copy_from_slice(&[0x12, 0x34]);
        bytes[36] = 0x86;

        let config = DeviceConfig::from_bytes(&bytes).unwrap();
        assert_eq!(config.work_mode, WorkMode::Keyboard);
        assert_eq!(config.work_mode_source, ModeSource::Software);
        assert_eq!(config.serial_mode, SerialMode::Transparent);
        assert_eq!(config.serial_mode_source, ModeSource::Hardware);
        assert_eq!(config.address, 0x07);
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.vendor_id, 0x1234);
        assert_eq!(
            config.custom_descriptors,
            DescriptorFlags::ENABLED | DescriptorFlags::VENDOR | DescriptorFlags::PRODUCT
        );
        assert_eq!(config.enter_chars.as_bytes(), &[0x0D, 0, 0, 0, 0x0D]);
    }

    #[test]
    fn reserved_bytes_survive_round_trip() {
        let mut bytes = FACTORY;
        bytes[7] = 0xAA;
        bytes[8] = 0x55;
        bytes[38..50].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
        bytes[36] = 0x40;

        let config = DeviceConfig::from_bytes(&bytes).unwrap();
        assert_eq!(config.to_bytes(), bytes);
        assert_eq!(DeviceConfig::from_bytes(&config.to_bytes()).unwrap(), config);
    }

    #[test]
    fn flag_bytes_survive_round_trip() {
        let mut bytes = FACTORY;
        bytes[19] = 0x02;
        bytes[37] = 0xFF;

        let mut config = DeviceConfig::from_bytes(&bytes).unwrap();
        assert!(config.auto_enter);
        assert!(config.fast_upload);
        assert_eq!(config.to_bytes(), bytes);

        config.auto_enter = false;
        let encoded = config.to_bytes();
        assert_eq!(encoded[19], 0x00);
        assert_eq!(encoded[37], 0xFF);

        config.auto_enter = true;
        assert_eq!(config.to_bytes()[19], 0x01);
    }

    #[test]
    fn rejects_wrong_length() {
        for len in [0, 49, 51] {
            let bytes = vec![0x80; len];
            assert_eq!(
                DeviceConfig::from_bytes(&bytes).unwrap_err().kind(),
                DecodeErrorKind::InvalidLength {
                    expected: 50,
                    found: len
                }
            );
        }
    }

    #[test]
    fn rejects_unknown_mode() {
        let mut bytes = FACTORY;
        bytes[0] = 0x84;

        assert!(matches!(
            DeviceConfig::from_bytes(&bytes).unwrap_err().kind(),
            DecodeErrorKind::UnexpectedByte { value: 0x84, .. }
        ));
    }

    #[test]
    fn custom_descriptors_maintain_master_switch() {
        let mut config = DeviceConfig::default();

        config.set_custom_descriptors(false, true, false);
        assert_eq!(config.to_bytes()[36], 0x82);

        config.set_custom_descriptors(true, true, true);
        assert_eq!(config.to_bytes()[36], 0x87);

        config.set_custom_descriptors(false, false, false);
        assert_eq!(config.to_bytes()[36], 0x00);
    }

    #[test]
    fn validation() {
        let mut config = DeviceConfig::default();
        assert_eq!(config.validate(), Ok(()));

        config.baud_rate = 14400;
        assert_eq!(config.validate(), Err(EncodeError::UnsupportedBaudRate(14400)));

        config.baud_rate = 115200;
        config.enter_chars = FixedBytes::new([0x0D, 0x8A]).unwrap();
        assert_eq!(
            config.validate(),
            Err(EncodeError::NonAsciiEnterCharacter {
                index: 1,
                value: 0x8A
            })
        );
    }
}
