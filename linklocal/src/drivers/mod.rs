// Link-layer transport used by the negotiation

pub mod memory;
pub mod raw;

use crate::error::LinkLocalError;
use alloc::vec::Vec;
use smoltcp::wire::Ipv4Address;

/// Trait for network drivers
///
/// All network drivers must implement this trait to carry raw frames for the
/// link-local probe and, afterwards, the smoltcp interface.
pub trait NetworkDriver: Send {
    /// Send a raw Ethernet frame
    ///
    /// # Arguments
    /// * `packet` - The Ethernet frame to send (including Ethernet header)
    ///
    /// # Returns
    /// * `Ok(())` if the packet was successfully queued for transmission
    /// * `Err(LinkLocalError)` if transmission failed
    fn send(&mut self, packet: &[u8]) -> Result<(), LinkLocalError>;

    /// Receive a raw Ethernet frame (non-blocking)
    ///
    /// # Returns
    /// * `Ok(Some(packet))` if a packet was received
    /// * `Ok(None)` if no packet is available
    /// * `Err(LinkLocalError)` if an error occurred
    fn receive(&mut self) -> Result<Option<Vec<u8>>, LinkLocalError>;

    /// Get the MAC address of the network interface
    fn mac_address(&self) -> [u8; 6];

    /// Check if the network link is up
    fn is_link_up(&self) -> bool;

    /// Poll the device for new packets and link changes
    fn poll(&mut self) -> Result<(), LinkLocalError>;
}

/// Exclusive raw frame channel
///
/// Transmission is staged: `begin_packet` resets the staging buffer, `write`
/// appends to it and `end_packet` sends it as one frame. Reception works one
/// frame at a time: `parse_packet` drops whatever is left of the current frame
/// and announces the size of the next one, which is then consumed with the
/// `read` family.
pub trait RawLinkChannel {
    /// Acquire the channel. Fails if the link is unavailable or already held.
    fn open(&mut self) -> Result<(), LinkLocalError>;

    /// Start staging a frame for `destination`/`port`
    fn begin_packet(&mut self, destination: Ipv4Address, port: u16) -> Result<(), LinkLocalError>;

    /// Stage payload bytes; returns how many were accepted
    fn write(&mut self, bytes: &[u8]) -> usize;

    /// Send the staged frame
    fn end_packet(&mut self) -> Result<(), LinkLocalError>;

    /// Discard the current frame and return the length of the next (0 if none)
    ///
    /// Zero-length frames are skipped rather than returned as 0.
    fn parse_packet(&mut self) -> usize;

    /// Bytes left in the current frame
    fn available(&self) -> usize;

    /// Read up to `buf.len()` bytes of the current frame
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, LinkLocalError>;

    /// Read a single byte of the current frame
    fn read_byte(&mut self) -> Option<u8>;

    /// Look at the next byte without consuming it
    fn peek(&self) -> Option<u8>;

    /// Release the channel
    fn stop(&mut self);
}
