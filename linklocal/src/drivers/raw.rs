//! Raw frame socket over a `NetworkDriver`
//!
//! Gives the negotiation a MACRAW-style channel: frames are staged byte by
//! byte and handed to the driver whole, and received frames are consumed
//! through a read cursor. Only one frame is held at a time.

use super::{NetworkDriver, RawLinkChannel};
use crate::error::LinkLocalError;
use alloc::vec::Vec;
use log::{debug, warn};
use smoltcp::wire::Ipv4Address;

/// Largest frame the staging buffer holds (Ethernet header + 1500 payload)
pub const MAX_FRAME_LEN: usize = 1514;

/// Zero-length frames skipped by one `parse_packet` before it reports none
const MAX_EMPTY_FRAMES: usize = 16;

/// `RawLinkChannel` implementation backed by a network driver
pub struct RawSocket<D: NetworkDriver> {
    driver: D,
    open: bool,
    destination: Ipv4Address,
    port: u16,
    tx: Vec<u8>,
    rx: Vec<u8>,
    rx_offset: usize,
}

impl<D: NetworkDriver> RawSocket<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            open: false,
            destination: Ipv4Address::UNSPECIFIED,
            port: 0,
            tx: Vec::with_capacity(MAX_FRAME_LEN),
            rx: Vec::new(),
            rx_offset: 0,
        }
    }

    /// Whether `open` has succeeded and `stop` has not been called since
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Destination context of the frame being staged
    pub fn destination(&self) -> (Ipv4Address, u16) {
        (self.destination, self.port)
    }

    /// Bytes staged for the next `end_packet`
    pub fn staged(&self) -> &[u8] {
        &self.tx
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Give the driver back, e.g. to hand it to the network stack
    pub fn into_driver(self) -> D {
        self.driver
    }

    fn discard_current(&mut self) {
        self.rx.clear();
        self.rx_offset = 0;
    }
}

impl<D: NetworkDriver> RawLinkChannel for RawSocket<D> {
    fn open(&mut self) -> Result<(), LinkLocalError> {
        if self.open {
            return Err(LinkLocalError::ChannelBusy);
        }
        self.driver.poll()?;
        if !self.driver.is_link_up() {
            return Err(LinkLocalError::LinkDown);
        }
        self.tx.clear();
        self.discard_current();
        self.open = true;
        Ok(())
    }

    fn begin_packet(&mut self, destination: Ipv4Address, port: u16) -> Result<(), LinkLocalError> {
        if !self.open {
            return Err(LinkLocalError::ChannelClosed);
        }
        self.tx.clear();
        self.destination = destination;
        self.port = port;
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> usize {
        if !self.open {
            return 0;
        }
        let accepted = bytes.len().min(MAX_FRAME_LEN - self.tx.len());
        self.tx.extend_from_slice(&bytes[..accepted]);
        accepted
    }

    fn end_packet(&mut self) -> Result<(), LinkLocalError> {
        if !self.open {
            return Err(LinkLocalError::ChannelClosed);
        }
        if self.tx.is_empty() {
            return Err(LinkLocalError::EmptyFrame);
        }
        self.driver.send(&self.tx)?;
        debug!("raw: sent {} byte frame", self.tx.len());
        self.tx.clear();
        Ok(())
    }

    fn parse_packet(&mut self) -> usize {
        if !self.open {
            return 0;
        }
        self.discard_current();

        if let Err(e) = self.driver.poll() {
            warn!("raw: driver poll failed: {}", e);
            return 0;
        }
        for _ in 0..=MAX_EMPTY_FRAMES {
            match self.driver.receive() {
                Ok(Some(frame)) if frame.is_empty() => {
                    debug!("raw: skipped empty frame");
                }
                Ok(Some(frame)) => {
                    self.rx = frame;
                    return self.rx.len();
                }
                Ok(None) => return 0,
                Err(e) => {
                    warn!("raw: receive failed: {}", e);
                    return 0;
                }
            }
        }
        warn!("raw: giving up after {} empty frames", MAX_EMPTY_FRAMES + 1);
        0
    }

    fn available(&self) -> usize {
        self.rx.len() - self.rx_offset
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, LinkLocalError> {
        let remaining = self.available();
        if remaining == 0 || buf.is_empty() {
            return Err(LinkLocalError::NoData);
        }
        let count = remaining.min(buf.len());
        buf[..count].copy_from_slice(&self.rx[self.rx_offset..self.rx_offset + count]);
        self.rx_offset += count;
        Ok(count)
    }

    fn read_byte(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.rx_offset += 1;
        Some(byte)
    }

    fn peek(&self) -> Option<u8> {
        if !self.open {
            return None;
        }
        self.rx.get(self.rx_offset).copied()
    }

    fn stop(&mut self) {
        self.open = false;
        self.tx.clear();
        self.discard_current();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::memory::MemoryDriver;

    const MAC: [u8; 6] = [0x02, 0, 0, 0, 0, 1];

    fn open_socket() -> RawSocket<MemoryDriver> {
        let mut socket = RawSocket::new(MemoryDriver::new(MAC));
        socket.open().unwrap();
        socket
    }

    #[test]
    fn test_open_requires_link() {
        let mut driver = MemoryDriver::new(MAC);
        driver.set_link_up(false);
        let mut socket = RawSocket::new(driver);
        assert_eq!(socket.open(), Err(LinkLocalError::LinkDown));
        assert!(!socket.is_open());
    }

    #[test]
    fn test_open_is_exclusive() {
        let mut socket = open_socket();
        assert_eq!(socket.open(), Err(LinkLocalError::ChannelBusy));
        socket.stop();
        assert!(socket.open().is_ok());
    }

    #[test]
    fn test_staged_send() {
        let mut socket = open_socket();
        socket
            .begin_packet(Ipv4Address::new(169, 254, 167, 5), 0)
            .unwrap();
        assert_eq!(socket.write(&[1, 2, 3]), 3);
        assert_eq!(socket.write(&[4]), 1);
        assert_eq!(socket.staged(), &[1, 2, 3, 4]);
        socket.end_packet().unwrap();

        assert_eq!(socket.driver().transmitted(), &[vec![1, 2, 3, 4]]);
        assert!(socket.staged().is_empty());
        assert_eq!(socket.destination().0, Ipv4Address::new(169, 254, 167, 5));
    }

    #[test]
    fn test_write_capped_at_frame_size() {
        let mut socket = open_socket();
        socket.begin_packet(Ipv4Address::UNSPECIFIED, 0).unwrap();
        let big = vec![0u8; MAX_FRAME_LEN + 100];
        assert_eq!(socket.write(&big), MAX_FRAME_LEN);
        assert_eq!(socket.write(&[1]), 0);
    }

    #[test]
    fn test_closed_channel_rejects_io() {
        let mut socket = RawSocket::new(MemoryDriver::new(MAC));
        assert_eq!(
            socket.begin_packet(Ipv4Address::UNSPECIFIED, 0),
            Err(LinkLocalError::ChannelClosed)
        );
        assert_eq!(socket.write(&[1]), 0);
        assert_eq!(socket.end_packet(), Err(LinkLocalError::ChannelClosed));
        assert_eq!(socket.parse_packet(), 0);
    }

    #[test]
    fn test_empty_frame_not_sent() {
        let mut socket = open_socket();
        socket.begin_packet(Ipv4Address::UNSPECIFIED, 0).unwrap();
        assert_eq!(socket.end_packet(), Err(LinkLocalError::EmptyFrame));
        assert!(socket.driver().transmitted().is_empty());
    }

    #[test]
    fn test_parse_discards_partial_frame() {
        let mut socket = open_socket();
        socket.driver_mut().inject(vec![1, 2, 3, 4]);
        socket.driver_mut().inject(vec![9, 8]);

        assert_eq!(socket.parse_packet(), 4);
        assert_eq!(socket.peek(), Some(1));
        assert_eq!(socket.read_byte(), Some(1));
        assert_eq!(socket.available(), 3);

        // rest of the first frame is dropped
        assert_eq!(socket.parse_packet(), 2);
        let mut buf = [0u8; 8];
        assert_eq!(socket.read(&mut buf), Ok(2));
        assert_eq!(&buf[..2], &[9, 8]);
        assert_eq!(socket.read(&mut buf), Err(LinkLocalError::NoData));
        assert_eq!(socket.peek(), None);
        assert_eq!(socket.parse_packet(), 0);
    }

    #[test]
    fn test_parse_skips_empty_frames() {
        let mut socket = open_socket();
        socket.driver_mut().inject(Vec::new());
        socket.driver_mut().inject(Vec::new());
        socket.driver_mut().inject(vec![5, 6, 7]);

        assert_eq!(socket.parse_packet(), 3);
        assert_eq!(socket.read_byte(), Some(5));
        assert_eq!(socket.driver().pending(), 0);
    }

    #[test]
    fn test_parse_bounded_on_empty_flood() {
        let mut socket = open_socket();
        for _ in 0..MAX_EMPTY_FRAMES + 3 {
            socket.driver_mut().inject(Vec::new());
        }
        socket.driver_mut().inject(vec![1]);

        assert_eq!(socket.parse_packet(), 0);
        assert_eq!(socket.driver().pending(), 3);
    }

    #[test]
    fn test_read_into_small_buffer() {
        let mut socket = open_socket();
        socket.driver_mut().inject(vec![1, 2, 3, 4, 5]);
        socket.parse_packet();

        let mut buf = [0u8; 2];
        assert_eq!(socket.read(&mut buf), Ok(2));
        assert_eq!(buf, [1, 2]);
        assert_eq!(socket.available(), 3);
    }

    #[test]
    fn test_peek_before_parse() {
        let mut socket = open_socket();
        socket.driver_mut().inject(vec![7]);
        assert_eq!(socket.peek(), None);
        assert_eq!(socket.read_byte(), None);
    }
}
