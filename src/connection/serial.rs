//! Opening and talking to a CH9329 over a serial port. This module does not have async support.

use log::{debug, trace};
use serialport::SerialPort;
use std::{
    io::{ErrorKind, Read, Write},
    time::Duration,
};

use super::{Connection, ConnectionOptions, Transport, TransportError};

/// Baud rate of a chip with factory configuration.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// How long a single read waits for the first byte.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(5);

/// A [`Transport`] over a serial port (8N1, no flow control).
pub struct SerialTransport {
    port_name: String,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    /// Opens `path` at `baud_rate`. Reads that see no data for `read_timeout`
    /// return empty.
    pub fn open(
        path: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Self, TransportError> {
        debug!("Opening serial port {} at {} baud", path, baud_rate);

        let port = serialport::new(path, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(read_timeout)
            .open()?;

        Ok(Self {
            port_name: path.to_owned(),
            port: Some(port),
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>, TransportError> {
        self.port.as_mut().ok_or(TransportError::Closed)
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let port = self.port_mut()?;
        port.write_all(data)?;
        port.flush()?;

        Ok(())
    }

    fn read(&mut self, max_len: usize) -> Result<Vec<u8>, TransportError> {
        let port = self.port_mut()?;
        let mut buf = vec![0; max_len];

        match port.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                if n > 0 {
                    trace!("read {} bytes: {:02x?}", n, buf);
                }
                Ok(buf)
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            debug!("Closed serial port {}", self.port_name);
        }
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("port_name", &self.port_name)
            .field("open", &self.port.is_some())
            .finish()
    }
}

/// Opens a serial port and wraps it in a [`Connection`].
pub fn connect(
    path: &str,
    baud_rate: u32,
    options: ConnectionOptions,
) -> Result<Connection<SerialTransport>, TransportError> {
    let transport = SerialTransport::open(path, baud_rate, DEFAULT_READ_TIMEOUT)?;
    Ok(Connection::with_options(transport, options))
}
