use std::str::Utf8Error;
use thiserror::Error;

/// A failure to decode a value of a specific type.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub struct DecodeError {
    kind: DecodeErrorKind,
    type_name: &'static str,
}

impl DecodeError {
    pub fn new<T>(kind: DecodeErrorKind) -> Self {
        Self {
            kind,
            type_name: std::any::type_name::<T>(),
        }
    }

    pub const fn kind(&self) -> DecodeErrorKind {
        self.kind
    }

    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to decode {}: {}", self.type_name, self.kind)
    }
}

#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeErrorKind {
    #[error("Payload was too short.")]
    UnexpectedEnd,

    #[error(
        "Could not decode {name} with unexpected byte. Found {value:x}, expected one of: {expected:x?}."
    )]
    UnexpectedByte {
        name: &'static str,
        value: u8,
        expected: &'static [u8],
    },

    #[error("Expected a payload of {expected} bytes, found {found}.")]
    InvalidLength { expected: usize, found: usize },

    #[error("{count} unexpected bytes remained after the payload.")]
    TrailingBytes { count: usize },

    #[error(transparent)]
    Utf8Error(#[from] Utf8Error),
}

/// A type that can be reconstructed (decoded) from a raw sequence of bytes.
///
/// The input slice is advanced by the number of bytes consumed.
pub trait Decode {
    /// Attempts to decode `Self` from the beginning of the provided byte slice.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the input is malformed or too short.
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError>
    where
        Self: Sized;
}

impl Decode for () {
    fn decode(_data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(())
    }
}

impl Decode for u8 {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let (&first, rest) = data
            .split_first()
            .ok_or_else(|| DecodeError::new::<Self>(DecodeErrorKind::UnexpectedEnd))?;
        *data = rest;
        Ok(first)
    }
}

impl<const N: usize> Decode for [u8; N] {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        if data.len() < N {
            return Err(DecodeError::new::<Self>(DecodeErrorKind::UnexpectedEnd));
        }

        let mut arr = [0; N];
        arr.copy_from_slice(&data[..N]);
        *data = &data[N..];

        Ok(arr)
    }
}

/// Reads a big-endian `u16`.
pub(crate) fn decode_u16_be(data: &mut &[u8]) -> Result<u16, DecodeError> {
    <[u8; 2]>::decode(data).map(u16::from_be_bytes)
}

/// Reads a big-endian `u32`.
pub(crate) fn decode_u32_be(data: &mut &[u8]) -> Result<u32, DecodeError> {
    <[u8; 4]>::decode(data).map(u32::from_be_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoding_advances_the_slice() {
        let bytes = [0x01, 0x02, 0x03, 0x04, 0x05];
        let mut data = bytes.as_slice();

        assert_eq!(u8::decode(&mut data), Ok(0x01));
        assert_eq!(decode_u16_be(&mut data), Ok(0x0203));
        assert_eq!(data, &[0x04, 0x05]);
    }

    #[test]
    fn short_input_names_the_failing_type() {
        let mut data: &[u8] = &[0x00, 0x00, 0x25];
        let err = decode_u32_be(&mut data).unwrap_err();

        assert_eq!(err.kind(), DecodeErrorKind::UnexpectedEnd);
        assert!(err.type_name().contains("[u8; 4]"));
        // Nothing is consumed on failure.
        assert_eq!(data.len(), 3);
    }
}
