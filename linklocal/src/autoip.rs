//! Link-local address negotiation (RFC 3927 "AutoIP")
//!
//! The engine claims an address in 169.254.167.0/24 without any server:
//! 1. Wait a random time below `probe_wait` so nodes booting together do
//!    not probe in lockstep
//! 2. Pick a candidate that has not conflicted yet in this run
//! 3. Probe it (see `probe`); on conflict remember it and go back to 2
//! 4. Stop on the first clear candidate or after `max_conflicts` attempts
//!
//! The raw channel is held for the whole run and released on every exit.

use crate::candidate::{next_candidate, random_between, ConflictSet, LINK_LOCAL_NETMASK};
use crate::config::AutoIpConfig;
use crate::drivers::RawLinkChannel;
use crate::error::LinkLocalError;
use crate::probe::{ConflictProbe, ProbeOutcome, ProbeReport};
use crate::stack::{AddressSink, IpConfig};
use crate::time::Delay;
use log::{debug, info, warn};
use rand_core::RngCore;
use smoltcp::wire::{EthernetAddress, Ipv4Address};

/// Negotiation engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkLocalState {
    /// No run started
    Idle,
    /// Probing candidates
    Negotiating,
    /// Address claimed
    Configured,
    /// Attempt budget exhausted
    Failed,
}

impl core::fmt::Display for LinkLocalState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LinkLocalState::Idle => write!(f, "Idle"),
            LinkLocalState::Negotiating => write!(f, "Negotiating"),
            LinkLocalState::Configured => write!(f, "Configured"),
            LinkLocalState::Failed => write!(f, "Failed"),
        }
    }
}

/// Why a negotiation gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// Every candidate in the attempt budget conflicted
    ExhaustedAttempts,
}

/// Outcome of a negotiation run
#[derive(Debug, Clone, PartialEq)]
pub enum NegotiationResult {
    Success(IpConfig),
    Failure(FailureReason),
}

impl NegotiationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, NegotiationResult::Success(_))
    }

    /// Negotiated configuration, if any
    pub fn config(&self) -> Option<&IpConfig> {
        match self {
            NegotiationResult::Success(config) => Some(config),
            NegotiationResult::Failure(_) => None,
        }
    }
}

/// Per-attempt negotiation record
///
/// Passed by value from one attempt to the next; only the engine creates or
/// advances it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiationAttempt {
    candidate: Ipv4Address,
    conflicts: ConflictSet,
    index: u8,
}

impl NegotiationAttempt {
    fn first() -> Self {
        Self {
            candidate: Ipv4Address::UNSPECIFIED,
            conflicts: ConflictSet::new(),
            index: 0,
        }
    }

    fn with_candidate(self, candidate: Ipv4Address) -> Self {
        Self { candidate, ..self }
    }

    /// Record the current candidate as taken and move to the next index
    fn conflicted(mut self) -> Result<Self, LinkLocalError> {
        self.conflicts.record(self.candidate.as_bytes()[3])?;
        self.index += 1;
        self.candidate = Ipv4Address::UNSPECIFIED;
        Ok(self)
    }

    pub fn candidate(&self) -> Ipv4Address {
        self.candidate
    }

    pub fn conflicts(&self) -> &ConflictSet {
        &self.conflicts
    }

    /// Zero-based attempt number
    pub fn index(&self) -> u8 {
        self.index
    }
}

/// Drives the probe/retry loop over an exclusively owned channel
pub struct NegotiationEngine<C, T, R> {
    channel: C,
    delay: T,
    rng: R,
    config: AutoIpConfig,
    state: LinkLocalState,
    reports: alloc::vec::Vec<ProbeReport>,
    last_attempt: Option<NegotiationAttempt>,
    negotiated: Option<IpConfig>,
}

impl<C, T, R> NegotiationEngine<C, T, R>
where
    C: RawLinkChannel,
    T: Delay,
    R: RngCore,
{
    /// Create an engine; fails if `config` does not validate
    pub fn new(channel: C, delay: T, rng: R, config: AutoIpConfig) -> Result<Self, LinkLocalError> {
        config.validate()?;
        Ok(Self {
            channel,
            delay,
            rng,
            config,
            state: LinkLocalState::Idle,
            reports: alloc::vec::Vec::new(),
            last_attempt: None,
            negotiated: None,
        })
    }

    pub fn state(&self) -> LinkLocalState {
        self.state
    }

    /// Timing and policy settings the engine was built with
    pub fn settings(&self) -> &AutoIpConfig {
        &self.config
    }

    /// Configuration claimed by the most recent successful run
    ///
    /// Cleared when a new run starts, so a failed or aborted run leaves `None`.
    pub fn config(&self) -> Option<&IpConfig> {
        self.negotiated.as_ref()
    }

    /// One report per attempt of the most recent run
    pub fn reports(&self) -> &[ProbeReport] {
        &self.reports
    }

    /// Attempt record the most recent run finished with
    pub fn last_attempt(&self) -> Option<&NegotiationAttempt> {
        self.last_attempt.as_ref()
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Release the channel, delay and randomness source
    pub fn into_parts(self) -> (C, T, R) {
        (self.channel, self.delay, self.rng)
    }

    /// Negotiate an address for the node identified by `hardware`
    ///
    /// # Returns
    /// * `Ok(NegotiationResult::Success(config))` - address claimed
    /// * `Ok(NegotiationResult::Failure(_))` - every attempt conflicted
    /// * `Err(LinkLocalError)` - the channel could not be opened or a send failed
    pub fn run(&mut self, hardware: EthernetAddress) -> Result<NegotiationResult, LinkLocalError> {
        self.reports.clear();
        self.last_attempt = None;
        self.negotiated = None;

        self.channel.open()?;
        self.state = LinkLocalState::Negotiating;
        info!("autoip: negotiating link-local address for {}", hardware);

        let result = self.negotiate(hardware);
        self.channel.stop();

        match &result {
            Ok(NegotiationResult::Success(config)) => {
                self.state = LinkLocalState::Configured;
                self.negotiated = Some(config.clone());
                info!("autoip: claimed {}/{}", config.ip, config.prefix_len());
            }
            Ok(NegotiationResult::Failure(_)) => {
                self.state = LinkLocalState::Failed;
                warn!("autoip: too many link-local assignment conflicts");
            }
            Err(e) => {
                self.state = LinkLocalState::Idle;
                warn!("autoip: negotiation aborted: {}", e);
            }
        }
        result
    }

    /// Run the negotiation and hand a successful result to `sink`
    pub fn run_and_apply<S: AddressSink + ?Sized>(
        &mut self,
        hardware: EthernetAddress,
        sink: &mut S,
    ) -> Result<NegotiationResult, LinkLocalError> {
        let result = self.run(hardware)?;
        if let NegotiationResult::Success(config) = &result {
            sink.apply(config)?;
        }
        Ok(result)
    }

    fn negotiate(&mut self, hardware: EthernetAddress) -> Result<NegotiationResult, LinkLocalError> {
        let startup = random_between(&mut self.rng, 0, self.config.probe_wait.total_millis());
        debug!("autoip: waiting {} ms before first probe", startup);
        self.delay.sleep_ms(startup);

        let mut attempt = NegotiationAttempt::first();
        while attempt.index() < self.config.max_conflicts {
            let candidate = next_candidate(&mut self.rng, attempt.conflicts());
            attempt = attempt.with_candidate(candidate);
            info!(
                "autoip: attempt {}/{} with {}",
                attempt.index() + 1,
                self.config.max_conflicts,
                candidate
            );

            let report = ConflictProbe::new(
                &mut self.channel,
                &mut self.delay,
                &mut self.rng,
                &self.config,
                hardware,
            )
            .run(candidate)?;
            self.reports.push(report);

            match report.outcome {
                ProbeOutcome::Clear => {
                    self.last_attempt = Some(attempt);
                    return Ok(NegotiationResult::Success(IpConfig::link_local(
                        candidate,
                        LINK_LOCAL_NETMASK,
                    )));
                }
                ProbeOutcome::Conflicted => {
                    attempt = attempt.conflicted()?;
                }
            }
        }

        self.last_attempt = Some(attempt);
        Ok(NegotiationResult::Failure(FailureReason::ExhaustedAttempts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::memory::MemoryDriver;
    use crate::drivers::raw::RawSocket;
    use crate::time::Recorder;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    const MAC: EthernetAddress = EthernetAddress([0x02, 0x00, 0x00, 0xab, 0xcd, 0xef]);

    struct Collect(Option<IpConfig>);

    impl AddressSink for Collect {
        fn apply(&mut self, config: &IpConfig) -> Result<(), LinkLocalError> {
            self.0 = Some(config.clone());
            Ok(())
        }
    }

    fn engine(
        driver: MemoryDriver,
        seed: u64,
    ) -> NegotiationEngine<RawSocket<MemoryDriver>, Recorder, SmallRng> {
        NegotiationEngine::new(
            RawSocket::new(driver),
            Recorder::default(),
            SmallRng::seed_from_u64(seed),
            AutoIpConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_link_local_state_display() {
        assert_eq!(format!("{}", LinkLocalState::Idle), "Idle");
        assert_eq!(format!("{}", LinkLocalState::Negotiating), "Negotiating");
        assert_eq!(format!("{}", LinkLocalState::Configured), "Configured");
        assert_eq!(format!("{}", LinkLocalState::Failed), "Failed");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = NegotiationEngine::new(
            RawSocket::new(MemoryDriver::new(MAC.0)),
            Recorder::default(),
            SmallRng::seed_from_u64(0),
            AutoIpConfig::default().with_max_conflicts(0),
        );
        assert!(matches!(result, Err(LinkLocalError::InvalidConfig(_))));
    }

    #[test]
    fn test_quiet_link_succeeds_first_attempt() {
        let mut engine = engine(MemoryDriver::new(MAC.0), 42);
        let result = engine.run(MAC).unwrap();

        let config = result.config().unwrap().clone();
        assert!(crate::candidate::is_candidate(config.ip));
        assert_eq!(config.subnet_mask, Ipv4Address::new(255, 255, 255, 0));
        assert_eq!(config.gateway, Some(config.ip));
        assert_eq!(config.dns, vec![config.ip]);

        assert_eq!(engine.state(), LinkLocalState::Configured);
        assert_eq!(engine.reports().len(), 1);
        assert_eq!(engine.last_attempt().unwrap().index(), 0);
        assert_eq!(engine.last_attempt().unwrap().candidate(), config.ip);
        assert!(!engine.channel().is_open());
        assert_eq!(engine.channel().driver().transmitted().len(), 5);
    }

    #[test]
    fn test_same_seed_same_address() {
        let first = engine(MemoryDriver::new(MAC.0), 7).run(MAC).unwrap();
        let second = engine(MemoryDriver::new(MAC.0), 7).run(MAC).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_delay_schedule() {
        let mut engine = engine(MemoryDriver::new(MAC.0), 9);
        engine.run(MAC).unwrap();
        let (_, delay, _) = engine.into_parts();

        // startup, five probe gaps, announce wait
        assert_eq!(delay.0.len(), 7);
        assert!(delay.0[0] < 1000);
        assert!(delay.0[1..6].iter().all(|ms| (1000..2000).contains(ms)));
        assert_eq!(delay.0[6], 2000);
    }

    #[test]
    fn test_engine_keeps_negotiated_config() {
        let mut engine = engine(MemoryDriver::new(MAC.0), 12);
        assert_eq!(engine.config(), None);
        assert_eq!(engine.settings(), &AutoIpConfig::default());

        let result = engine.run(MAC).unwrap();
        let config = engine.config().unwrap();
        assert_eq!(Some(config), result.config());
        assert_eq!(config.subnet_mask, LINK_LOCAL_NETMASK);
        assert_eq!(config.gateway, Some(config.ip));

        // a failed run forgets the previous address
        engine.channel_mut().driver_mut().set_link_up(false);
        assert_eq!(engine.run(MAC), Err(LinkLocalError::LinkDown));
        assert_eq!(engine.config(), None);
    }

    #[test]
    fn test_link_down_is_startup_error() {
        let mut driver = MemoryDriver::new(MAC.0);
        driver.set_link_up(false);
        let mut engine = engine(driver, 1);

        assert_eq!(engine.run(MAC), Err(LinkLocalError::LinkDown));
        assert_eq!(engine.state(), LinkLocalState::Idle);
        assert!(engine.reports().is_empty());
    }

    #[test]
    fn test_run_and_apply() {
        let mut engine = engine(MemoryDriver::new(MAC.0), 11);
        let mut sink = Collect(None);
        let result = engine.run_and_apply(MAC, &mut sink).unwrap();
        assert_eq!(sink.0.as_ref(), result.config());
    }

    #[test]
    fn test_attempt_records_conflicts() {
        let attempt = NegotiationAttempt::first()
            .with_candidate(Ipv4Address::new(169, 254, 167, 10))
            .conflicted()
            .unwrap()
            .with_candidate(Ipv4Address::new(169, 254, 167, 20))
            .conflicted()
            .unwrap();

        assert_eq!(attempt.index(), 2);
        assert_eq!(attempt.conflicts().len(), 2);
        assert!(attempt.conflicts().contains(10));
        assert!(attempt.conflicts().contains(20));
        assert_eq!(attempt.candidate(), Ipv4Address::UNSPECIFIED);
    }
}
