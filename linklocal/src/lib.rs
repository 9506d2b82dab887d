#![no_std]

// IPv4 link-local address negotiation (RFC 3927 "AutoIP")
// Claims a 169.254.167.0/24 address by ARP probing over a raw link channel

#[macro_use]
extern crate alloc;

pub mod arp;
pub mod autoip;
pub mod candidate;
pub mod config;
pub mod drivers;
pub mod error;
pub mod probe;
pub mod stack;
pub mod time;

// Re-export commonly used types
pub use arp::{decode, encode_probe, ArpOperation, ProbeFrame, FRAME_LEN};
pub use autoip::{FailureReason, LinkLocalState, NegotiationAttempt, NegotiationEngine, NegotiationResult};
pub use candidate::{next_candidate, ConflictSet, LINK_LOCAL_NETMASK, LINK_LOCAL_PREFIX};
pub use config::{AutoIpConfig, ConflictPolicy, MAX_CONFLICTS};
pub use drivers::memory::MemoryDriver;
pub use drivers::raw::RawSocket;
pub use drivers::{NetworkDriver, RawLinkChannel};
pub use error::LinkLocalError;
pub use probe::{classify, ConflictProbe, ProbeOutcome, ProbeReport, ProbeState, Verdict};
pub use stack::{installed_config, AddressSink, DriverDevice, GlobalConfig, IpConfig};
pub use time::{Delay, SpinDelay};
