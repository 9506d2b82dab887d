//! ARP probe frame codec
//!
//! Encodes and decodes the fixed-layout Ethernet + ARP frame used to probe a
//! link-local candidate. Every field is read and written at an explicit byte
//! offset in network byte order.
//!
//! Frame layout:
//! ```text
//!  0      6      12   14    16    18 19 20   22      28     32      38     42       52       56
//! +------+------+----+-----+-----+--+--+----+-------+------+-------+------+--------+--------+
//! | dst  | src  |type|htype|ptype|hl|pl| op | sha   | spa  | tha   | tpa  |padding |checksum|
//! +------+------+----+-----+-----+--+--+----+-------+------+-------+------+--------+--------+
//! ```
//!
//! The trailing checksum field is always written as zero and never verified.

use smoltcp::wire::{EthernetAddress, Ipv4Address};

/// Total size of an encoded probe frame
pub const FRAME_LEN: usize = 56;

/// EtherType carried by ARP frames
pub const ETHERTYPE_ARP: u16 = 0x0806;

/// ARP hardware type for Ethernet
pub const HARDWARE_TYPE_ETHERNET: u16 = 1;

/// ARP protocol type for IPv4
pub const PROTOCOL_TYPE_IPV4: u16 = 0x0800;

const DESTINATION: usize = 0;
const SOURCE: usize = 6;
const ETHERTYPE: usize = 12;
const HARDWARE_TYPE: usize = 14;
const PROTOCOL_TYPE: usize = 16;
const HARDWARE_LEN: usize = 18;
const PROTOCOL_LEN: usize = 19;
const OPCODE: usize = 20;
const SENDER_HARDWARE: usize = 22;
const SENDER_PROTOCOL: usize = 28;
const TARGET_HARDWARE: usize = 32;
const TARGET_PROTOCOL: usize = 38;
const PADDING: usize = 42;
const CHECKSUM: usize = 52;

/// ARP operation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ArpOperation {
    Request = 1,
    Reply = 2,
}

impl ArpOperation {
    /// Convert from a wire opcode
    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            1 => Some(ArpOperation::Request),
            2 => Some(ArpOperation::Reply),
            _ => None,
        }
    }
}

/// ARP payload for IPv4 over Ethernet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpPayload {
    pub hardware_type: u16,
    pub protocol_type: u16,
    pub hardware_len: u8,
    pub protocol_len: u8,
    /// Raw opcode, kept unconverted so unknown operations survive decoding
    pub opcode: u16,
    pub sender_hardware: EthernetAddress,
    pub sender_protocol: Ipv4Address,
    pub target_hardware: EthernetAddress,
    pub target_protocol: Ipv4Address,
}

impl ArpPayload {
    /// Operation, if it is one the probe understands
    pub fn operation(&self) -> Option<ArpOperation> {
        ArpOperation::from_u16(self.opcode)
    }

    /// True for IPv4-over-Ethernet payloads
    pub fn is_ethernet_ipv4(&self) -> bool {
        self.hardware_type == HARDWARE_TYPE_ETHERNET && self.protocol_type == PROTOCOL_TYPE_IPV4
    }
}

/// Ethernet frame carrying an ARP payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeFrame {
    pub destination: EthernetAddress,
    pub source: EthernetAddress,
    pub ethertype: u16,
    pub arp: ArpPayload,
    /// Unused, zero on transmit
    pub checksum: u32,
}

impl ProbeFrame {
    /// Build an ARP probe for `candidate` (RFC 3927 section 2.2.1)
    ///
    /// Sender protocol address is 0.0.0.0 and the Ethernet destination is the
    /// all-zero sentinel.
    pub fn probe(source: EthernetAddress, candidate: Ipv4Address) -> Self {
        Self {
            destination: EthernetAddress([0; 6]),
            source,
            ethertype: ETHERTYPE_ARP,
            arp: ArpPayload {
                hardware_type: HARDWARE_TYPE_ETHERNET,
                protocol_type: PROTOCOL_TYPE_IPV4,
                hardware_len: 6,
                protocol_len: 4,
                opcode: ArpOperation::Request as u16,
                sender_hardware: source,
                sender_protocol: Ipv4Address::UNSPECIFIED,
                target_hardware: EthernetAddress([0; 6]),
                target_protocol: candidate,
            },
            checksum: 0,
        }
    }

    /// Serialize the frame (big-endian)
    pub fn to_bytes(&self) -> [u8; FRAME_LEN] {
        let mut bytes = [0u8; FRAME_LEN];
        bytes[DESTINATION..SOURCE].copy_from_slice(self.destination.as_bytes());
        bytes[SOURCE..ETHERTYPE].copy_from_slice(self.source.as_bytes());
        bytes[ETHERTYPE..HARDWARE_TYPE].copy_from_slice(&self.ethertype.to_be_bytes());
        bytes[HARDWARE_TYPE..PROTOCOL_TYPE].copy_from_slice(&self.arp.hardware_type.to_be_bytes());
        bytes[PROTOCOL_TYPE..HARDWARE_LEN].copy_from_slice(&self.arp.protocol_type.to_be_bytes());
        bytes[HARDWARE_LEN] = self.arp.hardware_len;
        bytes[PROTOCOL_LEN] = self.arp.protocol_len;
        bytes[OPCODE..SENDER_HARDWARE].copy_from_slice(&self.arp.opcode.to_be_bytes());
        bytes[SENDER_HARDWARE..SENDER_PROTOCOL].copy_from_slice(self.arp.sender_hardware.as_bytes());
        bytes[SENDER_PROTOCOL..TARGET_HARDWARE].copy_from_slice(self.arp.sender_protocol.as_bytes());
        bytes[TARGET_HARDWARE..TARGET_PROTOCOL].copy_from_slice(self.arp.target_hardware.as_bytes());
        bytes[TARGET_PROTOCOL..PADDING].copy_from_slice(self.arp.target_protocol.as_bytes());
        // padding stays zero
        bytes[CHECKSUM..FRAME_LEN].copy_from_slice(&self.checksum.to_be_bytes());
        bytes
    }

    /// Parse a frame from bytes (big-endian)
    ///
    /// Returns `None` if fewer than `FRAME_LEN` bytes are supplied. Trailing
    /// bytes are ignored and the checksum field is taken as-is.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < FRAME_LEN {
            return None;
        }

        Some(Self {
            destination: EthernetAddress::from_bytes(&bytes[DESTINATION..SOURCE]),
            source: EthernetAddress::from_bytes(&bytes[SOURCE..ETHERTYPE]),
            ethertype: read_u16(bytes, ETHERTYPE),
            arp: ArpPayload {
                hardware_type: read_u16(bytes, HARDWARE_TYPE),
                protocol_type: read_u16(bytes, PROTOCOL_TYPE),
                hardware_len: bytes[HARDWARE_LEN],
                protocol_len: bytes[PROTOCOL_LEN],
                opcode: read_u16(bytes, OPCODE),
                sender_hardware: EthernetAddress::from_bytes(&bytes[SENDER_HARDWARE..SENDER_PROTOCOL]),
                sender_protocol: Ipv4Address::from_bytes(&bytes[SENDER_PROTOCOL..TARGET_HARDWARE]),
                target_hardware: EthernetAddress::from_bytes(&bytes[TARGET_HARDWARE..TARGET_PROTOCOL]),
                target_protocol: Ipv4Address::from_bytes(&bytes[TARGET_PROTOCOL..PADDING]),
            },
            checksum: read_u32(bytes, CHECKSUM),
        })
    }

    /// True if the Ethernet type field announces ARP
    pub fn is_arp(&self) -> bool {
        self.ethertype == ETHERTYPE_ARP
    }
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Encode a probe for `candidate` sent from `source`
pub fn encode_probe(source: EthernetAddress, candidate: Ipv4Address) -> [u8; FRAME_LEN] {
    ProbeFrame::probe(source, candidate).to_bytes()
}

/// Decode a received frame; `None` if the buffer is too short
pub fn decode(bytes: &[u8]) -> Option<ProbeFrame> {
    ProbeFrame::from_bytes(bytes)
}
