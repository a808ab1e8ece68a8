//! Wire framing.
//!
//! Every message exchanged with the chip, in both directions, is wrapped in
//! the same frame:
//!
//! | Field     | Size | Description |
//! |-----------|------|-------------|
//! | `header`  | 2    | Always [`HEADER`]. |
//! | `address` | 1    | Chip address, `0xFF` for broadcast. |
//! | `command` | 1    | Command code. Replies set `0x80` (success) or `0xC0` (error). |
//! | `length`  | 1    | Number of payload bytes. |
//! | `payload` | n    | Command specific data. |
//! | `sum`     | 1    | Low byte of the sum of every preceding byte. |

use log::{trace, warn};

use crate::encode::{Encode, EncodeError, MessageEncoder};

/// Leading bytes of every frame.
pub const HEADER: [u8; 2] = [0x57, 0xAB];

/// Largest payload a single frame can carry.
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize;

/// Header, address, command and length.
const PREFIX_LEN: usize = 5;

/// Computes the frame checksum over `bytes`.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}

/// A complete, checksum-validated frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Frame {
    pub address: u8,
    pub command: u8,
    payload: Vec<u8>,
}

impl Frame {
    /// # Errors
    ///
    /// Returns [`EncodeError::PayloadTooLong`] if the payload does not fit in
    /// the length byte.
    pub fn new(address: u8, command: u8, payload: Vec<u8>) -> Result<Self, EncodeError> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(EncodeError::PayloadTooLong { len: payload.len() });
        }

        Ok(Self {
            address,
            command,
            payload,
        })
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

impl Encode for Frame {
    fn size(&self) -> usize {
        PREFIX_LEN + self.payload.len() + 1
    }

    fn encode(&self, data: &mut [u8]) {
        let mut enc = MessageEncoder::new(data);
        enc.write(&HEADER);
        enc.write(&self.address);
        enc.write(&self.command);
        enc.write(&(self.payload.len() as u8));
        enc.write(self.payload.as_slice());

        let end = enc.position();
        data[end] = checksum(&data[..end]);
    }
}

/// Serializes a single frame.
///
/// # Errors
///
/// Returns [`EncodeError::PayloadTooLong`] if `payload` exceeds 255 bytes.
pub fn encode(address: u8, command: u8, payload: &[u8]) -> Result<Vec<u8>, EncodeError> {
    Frame::new(address, command, payload.to_vec()).map(|frame| frame.to_bytes())
}

/// Attempts to parse one frame from the start of `buffer`.
///
/// Returns the parsed frame (if any) and the number of bytes the caller should
/// drop from the front of `buffer`:
///
/// - Bytes before the header are noise and always counted as consumed.
/// - An incomplete frame is never consumed, only the noise in front of it.
/// - A frame with a bad checksum is consumed whole and no frame is returned.
/// - Without any header, everything but a trailing `0x57` is noise.
pub fn try_parse(buffer: &[u8]) -> (Option<Frame>, usize) {
    let Some(start) = buffer.windows(2).position(|w| w == HEADER) else {
        let keep = usize::from(buffer.last() == Some(&HEADER[0]));
        return (None, buffer.len() - keep);
    };

    if start > 0 {
        trace!("Skipping {} bytes of noise before frame header", start);
    }

    let data = &buffer[start..];
    if data.len() < PREFIX_LEN {
        return (None, start);
    }

    let len = data[4] as usize;
    let total = PREFIX_LEN + len + 1;
    if data.len() < total {
        return (None, start);
    }

    let expected = checksum(&data[..total - 1]);
    let found = data[total - 1];
    if expected != found {
        warn!(
            "Dropping frame with bad checksum. Found {:02x}, expected {:02x}: {:02x?}",
            found,
            expected,
            &data[..total]
        );
        return (None, start + total);
    }

    let frame = Frame {
        address: data[2],
        command: data[3],
        payload: data[PREFIX_LEN..total - 1].to_vec(),
    };

    (Some(frame), start + total)
}

/// Accumulates raw reads and yields complete frames as they become available.
#[derive(Debug, Default, Clone)]
pub struct FrameBuffer {
    bytes: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Pops the next valid frame, discarding noise and corrupt frames on the way.
    pub fn next_frame(&mut self) -> Option<Frame> {
        loop {
            let (frame, consumed) = try_parse(&self.bytes);
            self.bytes.drain(..consumed);

            if frame.is_some() || consumed == 0 {
                return frame;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }
}
