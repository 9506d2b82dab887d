//! Conflict probe for a single candidate address
//!
//! One probe cycle walks `Idle -> Probing -> Listening -> {Conflicted | Clear}`:
//!
//! 1. Stale frames left on the channel by an earlier attempt are flushed.
//! 2. `probe_count` ARP probes are sent back to back, each followed by a
//!    random delay in `[probe_min, probe_max)`.
//! 3. After `announce_wait` every frame that arrived is decoded and
//!    classified. The first conflict ends the cycle and drains the channel.
//!
//! Both the listening pass and the drains stop after `max_drain_frames`
//! frames, so a channel that keeps reporting data cannot hold the probe
//! forever.

use crate::arp::{self, ArpOperation, ProbeFrame, FRAME_LEN};
use crate::candidate::random_between;
use crate::config::{AutoIpConfig, ConflictPolicy};
use crate::drivers::RawLinkChannel;
use crate::error::LinkLocalError;
use crate::time::Delay;
use log::{debug, warn};
use rand_core::RngCore;
use smoltcp::wire::{EthernetAddress, Ipv4Address};

/// Probe cycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    /// Nothing sent yet
    Idle,
    /// Sending the probe burst
    Probing,
    /// Examining received frames
    Listening,
    /// Another host claims the candidate
    Conflicted,
    /// Listening window passed without a conflict
    Clear,
}

impl core::fmt::Display for ProbeState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ProbeState::Idle => write!(f, "Idle"),
            ProbeState::Probing => write!(f, "Probing"),
            ProbeState::Listening => write!(f, "Listening"),
            ProbeState::Conflicted => write!(f, "Conflicted"),
            ProbeState::Clear => write!(f, "Clear"),
        }
    }
}

/// Classification of one received frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Conflict,
    Ignore,
}

/// Final outcome of a probe cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Clear,
    Conflicted,
}

/// What happened during one probe cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReport {
    pub candidate: Ipv4Address,
    pub outcome: ProbeOutcome,
    pub probes_sent: usize,
    /// Frames read and classified while listening
    pub frames_examined: usize,
    /// Frames dropped unread, before probing and after a conflict
    pub frames_flushed: usize,
}

/// Decide whether `frame` shows that `candidate` is taken
///
/// Only IPv4-over-Ethernet ARP requests and replies are considered.
pub fn classify(frame: &ProbeFrame, candidate: Ipv4Address, policy: ConflictPolicy) -> Verdict {
    if !frame.is_arp() || !frame.arp.is_ethernet_ipv4() {
        return Verdict::Ignore;
    }
    match frame.arp.operation() {
        Some(ArpOperation::Request) | Some(ArpOperation::Reply) => {}
        None => return Verdict::Ignore,
    }

    let matches = match policy {
        ConflictPolicy::LinkSourceMatchesCandidate => {
            frame.source.as_bytes()[..4] == *candidate.as_bytes()
        }
        ConflictPolicy::SenderProtocolMatchesCandidate => {
            frame.arp.sender_protocol == candidate
        }
    };

    if matches {
        Verdict::Conflict
    } else {
        Verdict::Ignore
    }
}

/// Drop up to `limit` queued frames, returning how many were dropped
pub fn drain<C: RawLinkChannel + ?Sized>(channel: &mut C, limit: usize) -> usize {
    let mut drained = 0;
    while drained < limit && channel.parse_packet() > 0 {
        drained += 1;
    }
    drained
}

/// One probe cycle over a borrowed channel
pub struct ConflictProbe<'a, C, T, R> {
    channel: &'a mut C,
    delay: &'a mut T,
    rng: &'a mut R,
    config: &'a AutoIpConfig,
    hardware: EthernetAddress,
    state: ProbeState,
}

impl<'a, C, T, R> ConflictProbe<'a, C, T, R>
where
    C: RawLinkChannel,
    T: Delay,
    R: RngCore,
{
    pub fn new(
        channel: &'a mut C,
        delay: &'a mut T,
        rng: &'a mut R,
        config: &'a AutoIpConfig,
        hardware: EthernetAddress,
    ) -> Self {
        Self {
            channel,
            delay,
            rng,
            config,
            hardware,
            state: ProbeState::Idle,
        }
    }

    pub fn state(&self) -> ProbeState {
        self.state
    }

    /// Probe `candidate` and report whether another host answered for it
    ///
    /// Only transmit failures are errors; anything odd on the receive side is
    /// treated as noise.
    pub fn run(&mut self, candidate: Ipv4Address) -> Result<ProbeReport, LinkLocalError> {
        let limit = self.config.max_drain_frames as usize;
        let mut report = ProbeReport {
            candidate,
            outcome: ProbeOutcome::Clear,
            probes_sent: 0,
            frames_examined: 0,
            frames_flushed: drain(&mut *self.channel, limit),
        };
        if report.frames_flushed > 0 {
            debug!("probe: flushed {} stale frames", report.frames_flushed);
        }

        self.state = ProbeState::Probing;
        report.probes_sent = self.send_burst(candidate)?;

        self.delay.sleep(self.config.announce_wait);
        self.state = ProbeState::Listening;

        let (verdict, examined) = self.listen(candidate, limit);
        report.frames_examined = examined;

        match verdict {
            Verdict::Conflict => {
                report.frames_flushed += drain(&mut *self.channel, limit);
                report.outcome = ProbeOutcome::Conflicted;
                self.state = ProbeState::Conflicted;
                warn!("probe: {} is in use on the link", candidate);
            }
            Verdict::Ignore => {
                self.state = ProbeState::Clear;
                debug!("probe: no conflict for {}", candidate);
            }
        }
        Ok(report)
    }

    fn send_burst(&mut self, candidate: Ipv4Address) -> Result<usize, LinkLocalError> {
        let frame = arp::encode_probe(self.hardware, candidate);
        let min = self.config.probe_min.total_millis();
        let max = self.config.probe_max.total_millis();

        for n in 0..self.config.probe_count {
            self.channel.begin_packet(candidate, self.config.port)?;
            let written = self.channel.write(&frame);
            if written != frame.len() {
                return Err(LinkLocalError::DriverError(alloc::format!(
                    "probe truncated to {} of {} bytes",
                    written,
                    frame.len()
                )));
            }
            self.channel.end_packet()?;
            debug!("probe: sent {}/{} for {}", n + 1, self.config.probe_count, candidate);

            self.delay.sleep_ms(random_between(&mut *self.rng, min, max));
        }
        Ok(self.config.probe_count as usize)
    }

    fn listen(&mut self, candidate: Ipv4Address, limit: usize) -> (Verdict, usize) {
        let mut buf = [0u8; FRAME_LEN];
        let mut examined = 0;

        while examined < limit {
            if self.channel.parse_packet() == 0 {
                return (Verdict::Ignore, examined);
            }
            examined += 1;

            let received = match self.channel.read(&mut buf) {
                Ok(count) => count,
                Err(e) => {
                    warn!("probe: receive failed: {}", e);
                    continue;
                }
            };
            let frame = match arp::decode(&buf[..received]) {
                Some(frame) => frame,
                None => {
                    debug!("probe: ignoring {} byte frame", received);
                    continue;
                }
            };

            if classify(&frame, candidate, self.config.conflict_policy) == Verdict::Conflict {
                debug!("probe: conflicting frame from {}", frame.source);
                return (Verdict::Conflict, examined);
            }
        }

        warn!("probe: listening window hit the {} frame limit", limit);
        (Verdict::Ignore, examined)
    }
}
