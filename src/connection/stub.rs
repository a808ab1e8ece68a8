//! An in-memory chip for exercising the engine without hardware.

use std::{cell::RefCell, collections::VecDeque, io, rc::Rc};

use super::{Transport, TransportError};
use crate::{
    encode::Encode,
    frame::{self, FrameBuffer},
    packets::{cmds, config::DeviceConfig, BROADCAST_ADDRESS, ERROR_FLAG, REPLY_FLAG},
};

pub(crate) struct StubState {
    pub open: bool,
    pub address: u8,
    pub info: Vec<u8>,
    pub config: Vec<u8>,
    pub descriptors: [Vec<u8>; 3],

    /// Raw bytes of every write, one entry per call.
    pub written: Vec<Vec<u8>>,
    /// Bytes waiting to be read by the host.
    pub pending: VecDeque<u8>,

    pub silent: bool,
    pub fail_writes: bool,
    pub fail_reads: bool,
    /// Answer every command with an error frame carrying this status.
    pub reject_with: Option<u8>,
    /// Status byte placed in ACK replies.
    pub ack_status: u8,
    /// Largest number of bytes returned by a single read.
    pub max_read: usize,
    /// Garbage sent ahead of every reply.
    pub noise: Vec<u8>,
    /// Frames sent ahead of every reply.
    pub unsolicited: Vec<Vec<u8>>,
    pub descriptor_slot_override: Option<u8>,
}

impl Default for StubState {
    fn default() -> Self {
        Self {
            open: true,
            address: 0x00,
            info: vec![0x30, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
            config: DeviceConfig::default().to_bytes(),
            descriptors: Default::default(),
            written: Vec::new(),
            pending: VecDeque::new(),
            silent: false,
            fail_writes: false,
            fail_reads: false,
            reject_with: None,
            ack_status: 0x00,
            max_read: usize::MAX,
            noise: Vec::new(),
            unsolicited: Vec::new(),
            descriptor_slot_override: None,
        }
    }
}

impl StubState {
    fn respond(&mut self, command: u8, payload: &[u8]) {
        self.pending.extend(self.noise.iter().copied());
        for unsolicited in &self.unsolicited {
            self.pending.extend(unsolicited.iter().copied());
        }

        let reply = match self.reject_with {
            Some(status) => frame::encode(self.address, command | ERROR_FLAG, &[status]),
            None => frame::encode(self.address, command | REPLY_FLAG, payload),
        };
        if let Ok(reply) = reply {
            self.pending.extend(reply);
        }
    }

    fn handle(&mut self, command: u8, payload: &[u8]) {
        let ack = [self.ack_status];

        match command {
            cmds::GET_INFO => {
                let info = self.info.clone();
                self.respond(command, &info);
            }
            cmds::SEND_KB_GENERAL_DATA
            | cmds::SEND_KB_MEDIA_DATA
            | cmds::SEND_MS_ABS_DATA
            | cmds::SEND_MS_REL_DATA
            | cmds::RESET => self.respond(command, &ack),
            cmds::GET_PARA_CFG => {
                let config = self.config.clone();
                self.respond(command, &config);
            }
            cmds::SET_PARA_CFG => {
                if payload.len() == DeviceConfig::SIZE {
                    self.config = payload.to_vec();
                    self.respond(command, &ack);
                } else {
                    self.respond(command, &[0xE5]);
                }
            }
            cmds::SET_DEFAULT_CFG => {
                self.config = DeviceConfig::default().to_bytes();
                self.respond(command, &ack);
            }
            cmds::GET_USB_STRING => {
                let slot = payload.first().copied().unwrap_or(0xFF);
                let Some(value) = self.descriptors.get(slot as usize).cloned() else {
                    self.respond(command, &[0xE5]);
                    return;
                };

                let mut reply = vec![self.descriptor_slot_override.unwrap_or(slot), value.len() as u8];
                reply.extend(value);
                self.respond(command, &reply);
            }
            cmds::SET_USB_STRING => {
                if let [slot @ 0..=2, len, value @ ..] = payload {
                    if *len as usize == value.len() {
                        self.descriptors[*slot as usize] = value.to_vec();
                        self.respond(command, &ack);
                        return;
                    }
                }
                self.respond(command, &[0xE5]);
            }
            _ => {
                if let Ok(reply) = frame::encode(self.address, command | ERROR_FLAG, &[0xE3]) {
                    self.pending.extend(reply);
                }
            }
        }
    }
}

pub(crate) struct StubDevice {
    state: Rc<RefCell<StubState>>,
}

impl StubDevice {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(StubState::default())),
        }
    }

    /// Shared handle for inspecting the device after it was moved into a
    /// connection.
    pub fn state(&self) -> Rc<RefCell<StubState>> {
        Rc::clone(&self.state)
    }
}

impl Transport for StubDevice {
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        if !state.open {
            return Err(TransportError::Closed);
        }
        if state.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "stub write failure").into());
        }

        state.written.push(data.to_vec());

        let mut requests = FrameBuffer::new();
        requests.extend(data);
        while let Some(request) = requests.next_frame() {
            if state.silent || request.address == BROADCAST_ADDRESS {
                continue;
            }
            state.handle(request.command, request.payload());
        }

        Ok(())
    }

    fn read(&mut self, max_len: usize) -> Result<Vec<u8>, TransportError> {
        let mut state = self.state.borrow_mut();
        if !state.open {
            return Err(TransportError::Closed);
        }
        if state.fail_reads {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "stub read failure").into());
        }

        let len = max_len.min(state.max_read).min(state.pending.len());
        Ok(state.pending.drain(..len).collect())
    }

    fn is_open(&self) -> bool {
        self.state.borrow().open
    }

    fn close(&mut self) {
        self.state.borrow_mut().open = false;
    }
}
