// In-memory network driver
//
// Frames queued with `inject` are returned by `receive` in order; frames
// passed to `send` are kept for inspection. Useful on hosts and in tests.

use super::NetworkDriver;
use crate::error::LinkLocalError;
use alloc::collections::VecDeque;
use alloc::vec::Vec;

pub struct MemoryDriver {
    mac: [u8; 6],
    link_up: bool,
    rx_queue: VecDeque<Vec<u8>>,
    transmitted: Vec<Vec<u8>>,
}

impl MemoryDriver {
    pub fn new(mac: [u8; 6]) -> Self {
        Self {
            mac,
            link_up: true,
            rx_queue: VecDeque::new(),
            transmitted: Vec::new(),
        }
    }

    /// Queue a frame for reception
    pub fn inject(&mut self, frame: Vec<u8>) {
        self.rx_queue.push_back(frame);
    }

    /// Frames waiting to be received
    pub fn pending(&self) -> usize {
        self.rx_queue.len()
    }

    /// Every frame sent so far, oldest first
    pub fn transmitted(&self) -> &[Vec<u8>] {
        &self.transmitted
    }

    pub fn set_link_up(&mut self, up: bool) {
        self.link_up = up;
    }
}

impl NetworkDriver for MemoryDriver {
    fn send(&mut self, packet: &[u8]) -> Result<(), LinkLocalError> {
        if !self.link_up {
            return Err(LinkLocalError::LinkDown);
        }
        self.transmitted.push(packet.to_vec());
        Ok(())
    }

    fn receive(&mut self) -> Result<Option<Vec<u8>>, LinkLocalError> {
        Ok(self.rx_queue.pop_front())
    }

    fn mac_address(&self) -> [u8; 6] {
        self.mac
    }

    fn is_link_up(&self) -> bool {
        self.link_up
    }

    fn poll(&mut self) -> Result<(), LinkLocalError> {
        Ok(())
    }
}
