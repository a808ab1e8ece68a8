use thiserror::Error;

/// Values that cannot be represented on the wire.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Payload of {len} bytes does not fit in a frame (max 255).")]
    PayloadTooLong { len: usize },

    #[error("Keyboard reports hold at most 6 keys, got {count}.")]
    TooManyKeys { count: usize },

    #[error("String of {len} bytes exceeds the maximum of {max}.")]
    StringTooLong { len: usize, max: usize },

    #[error("String contains non-ASCII characters.")]
    NonAscii,

    #[error("Absolute coordinate {value} is outside of 0..={max}.")]
    CoordinateOutOfRange { value: u16, max: u16 },

    #[error("Unsupported baud rate {0}.")]
    UnsupportedBaudRate(u32),

    #[error("Enter character at index {index} is not ASCII (0x{value:02X}).")]
    NonAsciiEnterCharacter { index: usize, value: u8 },
}

/// A type that can be encoded into a sequence of bytes.
pub trait Encode {
    /// Returns the number of bytes this value will take when encoded.
    fn size(&self) -> usize;

    /// Encodes this instance into the provided byte slice.
    fn encode(&self, data: &mut [u8]);

    /// Encodes this instance into a freshly allocated buffer.
    fn to_bytes(&self) -> Vec<u8> {
        let mut data = vec![0; self.size()];
        self.encode(&mut data);
        data
    }
}

/// Sequential writer over a byte slice, tracking how far it has been filled.
pub struct MessageEncoder<'a> {
    data: &'a mut [u8],
    position: usize,
}

impl<'a> MessageEncoder<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn new_with_position(data: &'a mut [u8], position: usize) -> Self {
        Self { data, position }
    }

    /// Encodes `value` at the current position and advances past it.
    pub fn write<T: Encode + ?Sized>(&mut self, value: &T) {
        value.encode(&mut self.data[self.position..]);
        self.position += value.size();
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn get_ref(&self) -> &[u8] {
        self.data
    }
}

impl Encode for u8 {
    fn size(&self) -> usize {
        1
    }

    fn encode(&self, data: &mut [u8]) {
        data[0] = *self;
    }
}

impl Encode for i8 {
    fn size(&self) -> usize {
        1
    }

    fn encode(&self, data: &mut [u8]) {
        data[0] = self.to_le_bytes()[0];
    }
}

impl Encode for u16 {
    fn size(&self) -> usize {
        2
    }

    fn encode(&self, data: &mut [u8]) {
        data[..2].copy_from_slice(&self.to_le_bytes());
    }
}

impl Encode for () {
    fn size(&self) -> usize {
        0
    }

    fn encode(&self, _data: &mut [u8]) {}
}

impl Encode for [u8] {
    fn size(&self) -> usize {
        self.len()
    }

    fn encode(&self, data: &mut [u8]) {
        data[..self.len()].copy_from_slice(self);
    }
}

impl<const N: usize> Encode for [u8; N] {
    fn size(&self) -> usize {
        N
    }

    fn encode(&self, data: &mut [u8]) {
        data[..N].copy_from_slice(self);
    }
}

impl Encode for Vec<u8> {
    fn size(&self) -> usize {
        self.len()
    }

    fn encode(&self, data: &mut [u8]) {
        self.as_slice().encode(data)
    }
}
