use std::{fmt, ops::Deref, str::FromStr};

use crate::{
    decode::{Decode, DecodeError, DecodeErrorKind},
    encode::{Encode, EncodeError},
};

/// A zero-padded byte field with a fixed width of `N` bytes.
///
/// Configuration records on the chip store short byte strings (enter
/// characters, filter strings) in fixed slots. Unused trailing bytes are
/// zero.
///
/// # Invariants
///
/// - The stored contents never exceed `N` bytes.
/// - [`new`](Self::new) and [`truncating`](Self::truncating) zero every byte
///   past the contents. [`from_raw`](Self::from_raw) keeps the slot as given.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct FixedBytes<const N: usize>([u8; N]);

impl<const N: usize> FixedBytes<N> {
    /// Creates a new [`FixedBytes`] from the given bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::StringTooLong`] if `bytes` is longer than `N`.
    pub fn new(bytes: impl AsRef<[u8]>) -> Result<Self, EncodeError> {
        let bytes = bytes.as_ref();
        if bytes.len() > N {
            return Err(EncodeError::StringTooLong {
                len: bytes.len(),
                max: N,
            });
        }

        Ok(Self::truncating(bytes))
    }

    /// Creates a new [`FixedBytes`], dropping anything past `N` bytes.
    pub fn truncating(bytes: impl AsRef<[u8]>) -> Self {
        let bytes = bytes.as_ref();
        let len = bytes.len().min(N);

        let mut buf = [0; N];
        buf[..len].copy_from_slice(&bytes[..len]);

        Self(buf)
    }

    /// Wraps a raw slot as read from the device, padding included.
    pub const fn from_raw(raw: [u8; N]) -> Self {
        Self(raw)
    }

    /// The contents with trailing zero padding stripped.
    pub fn as_bytes(&self) -> &[u8] {
        let len = self.0.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        &self.0[..len]
    }

    /// The full slot, padding included.
    pub const fn as_raw(&self) -> &[u8; N] {
        &self.0
    }
}

impl<const N: usize> Default for FixedBytes<N> {
    fn default() -> Self {
        Self([0; N])
    }
}

impl<const N: usize> Encode for FixedBytes<N> {
    fn size(&self) -> usize {
        N
    }

    fn encode(&self, data: &mut [u8]) {
        data[..N].copy_from_slice(&self.0);
    }
}

impl<const N: usize> Decode for FixedBytes<N> {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        <[u8; N]>::decode(data).map(Self)
    }
}

/// An ASCII string that fits in a CH9329 USB string descriptor slot.
#[derive(Debug, PartialEq, Eq, Clone, Default, Hash)]
pub struct UsbString(String);

impl UsbString {
    /// Longest string a descriptor slot can hold.
    pub const MAX_LEN: usize = 23;

    /// # Errors
    ///
    /// - [`EncodeError::NonAscii`] if `s` contains characters outside of ASCII.
    /// - [`EncodeError::StringTooLong`] if `s` is longer than [`Self::MAX_LEN`].
    pub fn new(s: impl Into<String>) -> Result<Self, EncodeError> {
        let s = s.into();

        if !s.is_ascii() {
            return Err(EncodeError::NonAscii);
        }
        if s.len() > Self::MAX_LEN {
            return Err(EncodeError::StringTooLong {
                len: s.len(),
                max: Self::MAX_LEN,
            });
        }

        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Deref for UsbString {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl FromStr for UsbString {
    type Err = EncodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<&str> for UsbString {
    type Error = EncodeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for UsbString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Length-prefixed: `[len][bytes]`.
impl Encode for UsbString {
    fn size(&self) -> usize {
        1 + self.0.len()
    }

    fn encode(&self, data: &mut [u8]) {
        data[0] = self.0.len() as u8;
        data[1..self.size()].copy_from_slice(self.0.as_bytes());
    }
}

impl Decode for UsbString {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let len = u8::decode(data)? as usize;
        if len > Self::MAX_LEN {
            return Err(DecodeError::new::<Self>(DecodeErrorKind::InvalidLength {
                expected: Self::MAX_LEN,
                found: len,
            }));
        }

        let bytes = data
            .get(..len)
            .ok_or_else(|| DecodeError::new::<Self>(DecodeErrorKind::UnexpectedEnd))?;

        let s = std::str::from_utf8(bytes)
            .map_err(|e| DecodeError::new::<Self>(DecodeErrorKind::Utf8Error(e)))?;
        *data = &data[len..];

        Ok(Self(s.to_owned()))
    }
}
