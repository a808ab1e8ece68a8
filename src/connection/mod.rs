//! The protocol engine: request/reply correlation over a byte transport.
//!
//! Every operation returns `Result<Result<T, SoftFailure>, ConnectionError>`.
//! The outer error is a hard failure of the channel (the transport broke or a
//! request could not be encoded) while the inner [`SoftFailure`] is an expected
//! outcome the caller may retry, such as a timeout or a device rejecting the
//! command. The engine never retries on its own.

use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use thiserror::Error;

use crate::{
    decode::{DecodeError, DecodeErrorKind},
    encode::{Encode, EncodeError},
    frame::FrameBuffer,
    packets::{
        config::{
            DeviceConfig, GetConfigPacket, GetConfigReplyPacket, ResetPacket, ResetReplyPacket,
            SetConfigPacket, SetConfigReplyPacket, SetDefaultConfigPacket,
            SetDefaultConfigReplyPacket,
        },
        descriptor::{
            GetUsbStringPacket, GetUsbStringReplyPacket, SetUsbStringPacket,
            SetUsbStringReplyPacket, UsbDescriptor, UsbStringKind,
        },
        hid::{
            AbsoluteMouseReport, AbsoluteMouseReportPacket, AbsoluteMouseReportReplyPacket,
            KeyReport, KeyboardReportPacket, KeyboardReportReplyPacket, MediaReport,
            MediaReportPacket, MediaReportReplyPacket, Modifiers, MouseButtons,
            RelativeMouseReport, RelativeMouseReportPacket, RelativeMouseReportReplyPacket,
        },
        info::{DeviceInfo, GetInfoPacket, GetInfoReplyPacket},
        Ack, Command, DeviceStatus, Reply, BROADCAST_ADDRESS, DEFAULT_ADDRESS,
    },
};

#[cfg(feature = "serial")]
pub mod serial;

#[cfg(test)]
pub(crate) mod stub;

/// Upper bound on reads spent draining stale input before a request.
const MAX_STALE_READS: usize = 16;

/// A raw, bidirectional byte channel to the chip.
///
/// Transports never interpret what they carry. Reads may return fragments of
/// a frame or several frames at once.
pub trait Transport {
    /// Writes all of `data`.
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Reads up to `max_len` bytes. An empty result means nothing arrived
    /// before the transport's own read timeout and is not an error.
    fn read(&mut self, max_len: usize) -> Result<Vec<u8>, TransportError>;

    fn is_open(&self) -> bool;

    /// Closes the transport. Closing twice is a no-op.
    fn close(&mut self);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        (**self).write(data)
    }

    fn read(&mut self, max_len: usize) -> Result<Vec<u8>, TransportError> {
        (**self).read(max_len)
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),

    #[cfg(feature = "serial")]
    #[error("Serialport Error: {0}")]
    SerialportError(#[from] serialport::Error),

    #[error("Transport is closed")]
    Closed,
}

/// A hard failure. The channel (or the request itself) is unusable.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("Could not encode request: {0}")]
    Encode(#[from] EncodeError),
}

/// An expected, retryable outcome of a single request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SoftFailure {
    #[error("No reply to command 0x{command:02X} within {timeout:?}")]
    Timeout { command: u8, timeout: Duration },

    #[error("Device rejected command 0x{command:02X}: {status}")]
    Rejected { command: u8, status: DeviceStatus },

    #[error("Invalid reply to command 0x{command:02X}: {error}")]
    InvalidReply { command: u8, error: DecodeError },
}

/// Result of a request that reached the device.
pub type Outcome<T> = Result<T, SoftFailure>;

/// Tunables for a [`Connection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Address of the chip. [`BROADCAST_ADDRESS`] reaches every chip on the bus.
    pub address: u8,

    /// How long to wait for a reply.
    pub timeout: Duration,

    /// Largest read requested from the transport at once.
    pub read_chunk_size: usize,

    /// Drop any unread input before each request, so that a late reply to an
    /// earlier request is never taken as the answer to a new one.
    pub discard_stale_input: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            timeout: Duration::from_millis(500),
            read_chunk_size: 64,
            discard_stale_input: true,
        }
    }
}

impl ConnectionOptions {
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_read_chunk_size(mut self, read_chunk_size: usize) -> Self {
        self.read_chunk_size = read_chunk_size.max(1);
        self
    }

    pub fn with_discard_stale_input(mut self, discard_stale_input: bool) -> Self {
        self.discard_stale_input = discard_stale_input;
        self
    }
}

/// An open connection to a CH9329.
///
/// At most one request is in flight at a time; every operation blocks until
/// its reply arrives or the timeout elapses. The transport is closed when the
/// connection is dropped.
pub struct Connection<T: Transport> {
    transport: T,
    options: ConnectionOptions,
    incoming: FrameBuffer,
    sequence: u64,
}

impl<T: Transport> Connection<T> {
    pub fn new(transport: T) -> Self {
        Self::with_options(transport, ConnectionOptions::default())
    }

    pub fn with_options(transport: T, options: ConnectionOptions) -> Self {
        Self {
            transport,
            options,
            incoming: FrameBuffer::new(),
            sequence: 0,
        }
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut ConnectionOptions {
        &mut self.options
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    /// Closes the underlying transport. Later requests fail with
    /// [`TransportError::Closed`].
    pub fn close(&mut self) {
        if self.transport.is_open() {
            debug!("Closing transport after {} requests", self.sequence);
            self.transport.close();
        }
        self.incoming.clear();
    }

    /// Frames and writes a command without waiting for a reply.
    pub fn send(&mut self, command: &impl Command) -> Result<(), ConnectionError> {
        if !self.transport.is_open() {
            return Err(TransportError::Closed.into());
        }

        let encoded = command.to_frame(self.options.address)?.to_bytes();
        trace!("[#{}] sent frame: {:02x?}", self.sequence, encoded);
        self.transport.write(&encoded)?;

        Ok(())
    }

    /// Sends a command and waits for its reply.
    ///
    /// Frames that do not answer the command are logged and skipped. When the
    /// connection targets [`BROADCAST_ADDRESS`], commands whose reply is a bare
    /// [`Ack`] succeed as soon as they are written.
    pub fn handshake<R: Reply>(
        &mut self,
        command: impl Command,
    ) -> Result<Outcome<R::Payload>, ConnectionError> {
        self.sequence += 1;

        if self.options.discard_stale_input {
            self.discard_stale_input()?;
        }

        self.send(&command)?;

        if self.options.address == BROADCAST_ADDRESS {
            if let Some(payload) = R::unanswered() {
                return Ok(Ok(payload));
            }
        }

        self.recv::<R>()
    }

    fn recv<R: Reply>(&mut self) -> Result<Outcome<R::Payload>, ConnectionError> {
        let timeout = self.options.timeout;
        let deadline = Instant::now() + timeout;

        loop {
            while let Some(frame) = self.incoming.next_frame() {
                trace!("[#{}] received frame: {:02x?}", self.sequence, frame);

                if !R::answers(&frame) {
                    debug!(
                        "[#{}] Skipping frame with unrelated command 0x{:02X}",
                        self.sequence, frame.command
                    );
                    continue;
                }

                if self.options.address != BROADCAST_ADDRESS
                    && frame.address != self.options.address
                {
                    debug!(
                        "[#{}] Skipping reply from address 0x{:02X}, expected 0x{:02X}",
                        self.sequence, frame.address, self.options.address
                    );
                    continue;
                }

                let outcome = match R::decode_frame(&frame) {
                    Ok(reply) => reply.into_payload().map_err(|status| {
                        warn!("[#{}] Command 0x{:02X} rejected: {}", self.sequence, R::CMD, status);
                        SoftFailure::Rejected {
                            command: R::CMD,
                            status,
                        }
                    }),
                    Err(error) => {
                        warn!("[#{}] Could not decode reply: {}", self.sequence, error);
                        Err(SoftFailure::InvalidReply {
                            command: R::CMD,
                            error,
                        })
                    }
                };

                return Ok(outcome);
            }

            if Instant::now() >= deadline {
                warn!(
                    "[#{}] Timed out after {:?} waiting for a reply to command 0x{:02X}",
                    self.sequence,
                    timeout,
                    R::CMD
                );
                return Ok(Err(SoftFailure::Timeout {
                    command: R::CMD,
                    timeout,
                }));
            }

            if !self.transport.is_open() {
                return Err(TransportError::Closed.into());
            }

            let chunk = self.transport.read(self.options.read_chunk_size)?;
            if chunk.is_empty() {
                std::thread::yield_now();
            } else {
                self.incoming.extend(&chunk);
            }
        }
    }

    fn discard_stale_input(&mut self) -> Result<(), ConnectionError> {
        if !self.incoming.is_empty() {
            debug!("Discarding {} buffered bytes", self.incoming.len());
            self.incoming.clear();
        }

        if !self.transport.is_open() {
            return Err(TransportError::Closed.into());
        }

        for _ in 0..MAX_STALE_READS {
            let stale = self.transport.read(self.options.read_chunk_size)?;
            if stale.is_empty() {
                break;
            }
            debug!("Discarding stale input: {:02x?}", stale);
        }

        Ok(())
    }

    fn acknowledged<R: Reply<Payload = Ack>>(
        &mut self,
        command: impl Command,
    ) -> Result<Outcome<()>, ConnectionError> {
        Ok(self.handshake::<R>(command)?.map(|Ack| ()))
    }

    /// Queries firmware version, USB enumeration state and keyboard LEDs.
    pub fn get_info(&mut self) -> Result<Outcome<DeviceInfo>, ConnectionError> {
        self.handshake::<GetInfoReplyPacket>(GetInfoPacket::new(()))
    }

    /// Sends a keyboard report with up to six pressed keys.
    ///
    /// An empty `keys` slice with no modifiers releases everything.
    pub fn send_keyboard(
        &mut self,
        modifiers: Modifiers,
        keys: &[u8],
    ) -> Result<Outcome<()>, ConnectionError> {
        let report = KeyReport::new(modifiers, keys)?;
        self.acknowledged::<KeyboardReportReplyPacket>(KeyboardReportPacket::new(report))
    }

    pub fn send_media(&mut self, report: MediaReport) -> Result<Outcome<()>, ConnectionError> {
        self.acknowledged::<MediaReportReplyPacket>(MediaReportPacket::new(report))
    }

    pub fn send_mouse_rel(
        &mut self,
        dx: i8,
        dy: i8,
        buttons: MouseButtons,
        wheel: i8,
    ) -> Result<Outcome<()>, ConnectionError> {
        let report = RelativeMouseReport {
            buttons,
            dx,
            dy,
            wheel,
        };
        self.acknowledged::<RelativeMouseReportReplyPacket>(RelativeMouseReportPacket::new(report))
    }

    /// Moves the cursor to `(x, y)` on the chip's `0..=4095` grid.
    pub fn send_mouse_abs(
        &mut self,
        x: u16,
        y: u16,
        buttons: MouseButtons,
        wheel: i8,
    ) -> Result<Outcome<()>, ConnectionError> {
        let report = AbsoluteMouseReport::new(buttons, x, y, wheel)?;
        self.acknowledged::<AbsoluteMouseReportReplyPacket>(AbsoluteMouseReportPacket::new(report))
    }

    pub fn get_config(&mut self) -> Result<Outcome<DeviceConfig>, ConnectionError> {
        self.handshake::<GetConfigReplyPacket>(GetConfigPacket::new(()))
    }

    /// Writes a configuration after validating it. Most fields take effect
    /// after [`chip_reset`](Self::chip_reset).
    pub fn set_config(&mut self, config: &DeviceConfig) -> Result<Outcome<()>, ConnectionError> {
        config.validate()?;
        self.acknowledged::<SetConfigReplyPacket>(SetConfigPacket::new(config.clone()))
    }

    pub fn get_usb_descriptor(
        &mut self,
        kind: UsbStringKind,
    ) -> Result<Outcome<String>, ConnectionError> {
        let descriptor = match self.handshake::<GetUsbStringReplyPacket>(GetUsbStringPacket::new(kind))? {
            Ok(descriptor) => descriptor,
            Err(failure) => return Ok(Err(failure)),
        };

        if descriptor.kind != kind {
            warn!(
                "Requested {:?} descriptor, device answered with {:?}",
                kind, descriptor.kind
            );
            return Ok(Err(SoftFailure::InvalidReply {
                command: GetUsbStringReplyPacket::CMD,
                error: DecodeError::new::<UsbDescriptor>(DecodeErrorKind::UnexpectedByte {
                    name: "UsbStringKind",
                    value: descriptor.kind as u8,
                    expected: &[],
                }),
            }));
        }

        Ok(Ok(descriptor.value.into_string()))
    }

    /// Stores a custom string descriptor. An empty `value` clears it.
    pub fn set_usb_descriptor(
        &mut self,
        kind: UsbStringKind,
        value: &str,
    ) -> Result<Outcome<()>, ConnectionError> {
        let descriptor = UsbDescriptor::new(kind, value)?;
        self.acknowledged::<SetUsbStringReplyPacket>(SetUsbStringPacket::new(descriptor))
    }

    /// Restores the factory configuration.
    pub fn set_config_to_default(&mut self) -> Result<Outcome<()>, ConnectionError> {
        self.acknowledged::<SetDefaultConfigReplyPacket>(SetDefaultConfigPacket::new(()))
    }

    /// Restarts the chip's firmware.
    pub fn chip_reset(&mut self) -> Result<Outcome<()>, ConnectionError> {
        self.acknowledged::<ResetReplyPacket>(ResetPacket::new(()))
    }
}

impl<T: Transport> Drop for Connection<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T: Transport> std::fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("options", &self.options)
            .field("open", &self.transport.is_open())
            .field("sequence", &self.sequence)
            .finish()
    }
}
