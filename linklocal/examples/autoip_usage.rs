//! Example demonstrating link-local address negotiation
//!
//! Runs a full negotiation over the in-memory driver. On a real node the
//! `MemoryDriver` is replaced by the NIC driver and `SpinDelay` by a timer
//! backed delay; the rest is unchanged.
//!
//! # Flow
//!
//! 1. Wrap the driver in a `RawSocket` so the engine can stage raw frames
//! 2. Build a `NegotiationEngine` with a delay and a randomness source
//! 3. `run_and_apply` probes candidates until one is clear and publishes
//!    the result through an `AddressSink`
//! 4. Hand the driver to smoltcp through `DriverDevice`

use linklocal::stack::installed_config;
use linklocal::{
    AddressSink, AutoIpConfig, DriverDevice, GlobalConfig, MemoryDriver, NegotiationEngine,
    NegotiationResult, RawSocket, SpinDelay,
};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use smoltcp::iface::{Config, Interface};
use smoltcp::time::Instant;
use smoltcp::wire::{EthernetAddress, HardwareAddress};

fn main() {
    let mac = EthernetAddress([0x02, 0x00, 0x5e, 0x12, 0x34, 0x56]);

    // Simulated link: no delays needed
    let config = AutoIpConfig::default().without_delays();
    let mut engine = match NegotiationEngine::new(
        RawSocket::new(MemoryDriver::new(mac.0)),
        SpinDelay::default(),
        SmallRng::seed_from_u64(0x5eed),
        config,
    ) {
        Ok(engine) => engine,
        Err(e) => {
            println!("Invalid configuration: {}", e);
            return;
        }
    };

    let config = match engine.run_and_apply(mac, &mut GlobalConfig) {
        Ok(NegotiationResult::Success(config)) => config,
        Ok(NegotiationResult::Failure(reason)) => {
            println!("Negotiation failed: {:?}", reason);
            return;
        }
        Err(e) => {
            println!("Network error: {}", e);
            return;
        }
    };

    println!("Claimed {} after {} attempt(s)", config.ip, engine.reports().len());
    println!("  Subnet mask: {}", config.subnet_mask);
    if let Some(gateway) = config.gateway {
        println!("  Gateway: {}", gateway);
    }
    for dns in &config.dns {
        println!("  DNS: {}", dns);
    }
    println!("Published: {:?}", installed_config().map(|c| c.ip));

    // Bring up smoltcp on the same driver
    let (socket, _, _) = engine.into_parts();
    let mut device = DriverDevice::new(socket.into_driver());
    let mut iface = Interface::new(
        Config::new(HardwareAddress::Ethernet(mac)),
        &mut device,
        Instant::ZERO,
    );
    match iface.apply(&config) {
        Ok(()) => println!("Interface addresses: {:?}", iface.ip_addrs()),
        Err(e) => println!("Failed to configure interface: {}", e),
    }
}
