//! Candidate address generation
//!
//! Candidates live in a fixed /24 inside 169.254.0.0/16. Only the host octet is
//! random; it is drawn uniformly from [1, 253] so that 0, 254 and 255 are never
//! proposed. The prefix is a fixed policy constant rather than being derived
//! from the node's hardware address.

use crate::config::MAX_CONFLICTS;
use crate::error::LinkLocalError;
use heapless::Vec;
use rand_core::RngCore;
use smoltcp::wire::Ipv4Address;

/// Network prefix shared by every candidate
pub const LINK_LOCAL_PREFIX: [u8; 3] = [169, 254, 167];

/// Subnet mask handed out with the negotiated address
pub const LINK_LOCAL_NETMASK: Ipv4Address = Ipv4Address([255, 255, 255, 0]);

/// Lowest host octet a candidate may carry
pub const FIRST_HOST: u8 = 1;

/// Highest host octet a candidate may carry
pub const LAST_HOST: u8 = 253;

/// Host octets already found to conflict during one negotiation run
///
/// Insertion order is preserved. Capacity equals the largest attempt budget,
/// so a run can never record more conflicts than it has attempts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictSet {
    octets: Vec<u8, MAX_CONFLICTS>,
}

impl ConflictSet {
    pub fn new() -> Self {
        Self { octets: Vec::new() }
    }

    /// Record a conflicting host octet. Recording an octet twice is a no-op.
    pub fn record(&mut self, octet: u8) -> Result<(), LinkLocalError> {
        if self.contains(octet) {
            return Ok(());
        }
        self.octets
            .push(octet)
            .map_err(|_| LinkLocalError::ConflictTableFull)
    }

    pub fn contains(&self, octet: u8) -> bool {
        self.octets.iter().any(|&o| o == octet)
    }

    pub fn len(&self) -> usize {
        self.octets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.octets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &u8> {
        self.octets.iter()
    }

    /// Conflicting octets as full addresses, oldest first
    pub fn addresses(&self) -> impl Iterator<Item = Ipv4Address> + '_ {
        self.octets.iter().map(|&octet| candidate_address(octet))
    }
}

/// Build the full address for a host octet
pub fn candidate_address(octet: u8) -> Ipv4Address {
    let [a, b, c] = LINK_LOCAL_PREFIX;
    Ipv4Address::new(a, b, c, octet)
}

/// True if `address` is a well-formed candidate
pub fn is_candidate(address: Ipv4Address) -> bool {
    let bytes = address.as_bytes();
    bytes[..3] == LINK_LOCAL_PREFIX && (FIRST_HOST..=LAST_HOST).contains(&bytes[3])
}

/// Draw a value uniformly from `[min, max)`. Returns `min` for an empty range.
pub fn random_between<R: RngCore>(rng: &mut R, min: u64, max: u64) -> u64 {
    if max <= min {
        return min;
    }
    let span = max - min;
    // reject the tail that would bias the modulo
    let zone = u64::MAX - (u64::MAX % span);
    loop {
        let value = rng.next_u64();
        if value < zone {
            return min + value % span;
        }
    }
}

/// Pick the next candidate, skipping any host octet in `excluding`
///
/// `excluding` holds at most `MAX_CONFLICTS` octets out of 253, so the
/// resampling loop always has free octets to land on.
pub fn next_candidate<R: RngCore>(rng: &mut R, excluding: &ConflictSet) -> Ipv4Address {
    loop {
        let octet = random_between(rng, FIRST_HOST as u64, LAST_HOST as u64 + 1) as u8;
        if !excluding.contains(octet) {
            return candidate_address(octet);
        }
    }
}
