//! Negotiation policy for link-local address assignment
//!
//! Timing and retry constants follow RFC 3927 section 9, scaled the way the
//! node firmware has always used them (probe delays of one to two seconds,
//! ten conflicts before giving up).

use crate::error::LinkLocalError;
use smoltcp::time::Duration;

/// Upper bound on the attempt budget, and capacity of the conflict record
pub const MAX_CONFLICTS: usize = 10;

/// How a received ARP frame is matched against the candidate under test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Ethernet source address bytes compared against the candidate IPv4 bytes.
    ///
    /// This is the comparison deployed nodes have always made. It is not the
    /// RFC 3927 check and will only fire for peers whose MAC happens to start
    /// with the candidate octets.
    LinkSourceMatchesCandidate,
    /// ARP sender protocol address compared against the candidate (RFC 3927 2.2.1)
    SenderProtocolMatchesCandidate,
}

impl Default for ConflictPolicy {
    fn default() -> Self {
        ConflictPolicy::LinkSourceMatchesCandidate
    }
}

/// Link-local negotiation configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AutoIpConfig {
    /// Number of distinct candidates tried before giving up
    pub max_conflicts: u8,
    /// Probes sent per candidate
    pub probe_count: u8,
    /// Upper bound of the random delay taken once before the first attempt
    pub probe_wait: Duration,
    /// Lower bound of the delay following each probe
    pub probe_min: Duration,
    /// Upper bound (exclusive) of the delay following each probe
    pub probe_max: Duration,
    /// Quiet period after the last probe before replies are examined
    pub announce_wait: Duration,
    /// Maximum frames examined per listening window or drain
    pub max_drain_frames: u16,
    /// Port handed to the channel with each probe
    pub port: u16,
    pub conflict_policy: ConflictPolicy,
}

impl Default for AutoIpConfig {
    fn default() -> Self {
        Self {
            max_conflicts: MAX_CONFLICTS as u8,
            probe_count: 5,
            probe_wait: Duration::from_secs(1),
            probe_min: Duration::from_secs(1),
            probe_max: Duration::from_secs(2),
            announce_wait: Duration::from_secs(2),
            max_drain_frames: 64,
            port: 0,
            conflict_policy: ConflictPolicy::default(),
        }
    }
}

impl AutoIpConfig {
    /// Set the attempt budget
    pub fn with_max_conflicts(mut self, max_conflicts: u8) -> Self {
        self.max_conflicts = max_conflicts;
        self
    }

    /// Set the conflict classification policy
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    /// Zero every delay. Used on simulated links where wall time is irrelevant.
    pub fn without_delays(mut self) -> Self {
        self.probe_wait = Duration::ZERO;
        self.probe_min = Duration::ZERO;
        self.probe_max = Duration::ZERO;
        self.announce_wait = Duration::ZERO;
        self
    }

    /// Check the configuration for values the negotiation cannot honour
    pub fn validate(&self) -> Result<(), LinkLocalError> {
        if self.max_conflicts == 0 || self.max_conflicts as usize > MAX_CONFLICTS {
            return Err(LinkLocalError::invalid_config(
                "max_conflicts must be between 1 and MAX_CONFLICTS",
            ));
        }
        if self.probe_count == 0 {
            return Err(LinkLocalError::invalid_config("probe_count must be non-zero"));
        }
        if self.probe_min > self.probe_max {
            return Err(LinkLocalError::invalid_config(
                "probe_min must not exceed probe_max",
            ));
        }
        if self.max_drain_frames == 0 {
            return Err(LinkLocalError::invalid_config(
                "max_drain_frames must be non-zero",
            ));
        }
        Ok(())
    }
}
