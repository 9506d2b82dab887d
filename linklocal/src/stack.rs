// Installation of the negotiated configuration
// Hands the result to smoltcp or to a global slot read by the rest of the node

use crate::drivers::NetworkDriver;
use crate::error::LinkLocalError;
use alloc::vec::Vec;
use log::{info, warn};
use smoltcp::iface::Interface;
use smoltcp::phy::{Device, DeviceCapabilities, Medium, RxToken, TxToken};
use smoltcp::time::Instant;
use smoltcp::wire::{IpAddress, IpCidr, Ipv4Address};
use spin::Mutex;

/// IP configuration produced by a successful negotiation
#[derive(Debug, Clone, PartialEq)]
pub struct IpConfig {
    /// Assigned IP address
    pub ip: Ipv4Address,
    /// Subnet mask
    pub subnet_mask: Ipv4Address,
    /// Gateway/router IP address
    pub gateway: Option<Ipv4Address>,
    /// DNS server addresses
    pub dns: Vec<Ipv4Address>,
}

impl IpConfig {
    /// Create a new IpConfig with the given IP address and subnet mask
    pub fn new(ip: Ipv4Address, subnet_mask: Ipv4Address) -> Self {
        Self {
            ip,
            subnet_mask,
            gateway: None,
            dns: Vec::new(),
        }
    }

    /// Link-local result: the address doubles as gateway and DNS server
    pub fn link_local(ip: Ipv4Address, subnet_mask: Ipv4Address) -> Self {
        let mut config = Self::new(ip, subnet_mask).with_gateway(ip);
        config.add_dns(ip);
        config
    }

    /// Set the gateway address
    pub fn with_gateway(mut self, gateway: Ipv4Address) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Add a DNS server address
    pub fn add_dns(&mut self, dns: Ipv4Address) {
        self.dns.push(dns);
    }

    /// Prefix length of the subnet mask
    pub fn prefix_len(&self) -> u8 {
        u32::from_be_bytes(self.subnet_mask.0).count_ones() as u8
    }

    /// Address and prefix as a CIDR
    pub fn cidr(&self) -> IpCidr {
        IpCidr::new(IpAddress::Ipv4(self.ip), self.prefix_len())
    }
}

/// Consumer of the negotiated configuration
pub trait AddressSink {
    fn apply(&mut self, config: &IpConfig) -> Result<(), LinkLocalError>;
}

impl AddressSink for Interface {
    /// Replace the interface addresses and install the default route.
    /// smoltcp has no resolver state, so DNS servers are left to the caller.
    fn apply(&mut self, config: &IpConfig) -> Result<(), LinkLocalError> {
        let cidr = config.cidr();
        let mut pushed = true;
        self.update_ip_addrs(|addrs| {
            addrs.clear();
            pushed = addrs.push(cidr).is_ok();
        });
        if !pushed {
            return Err(LinkLocalError::apply_failed("Failed to add IP address"));
        }

        if let Some(gateway) = config.gateway {
            self.routes_mut()
                .add_default_ipv4_route(gateway)
                .map_err(|_| LinkLocalError::apply_failed("Route table full"))?;
        }
        info!("stack: interface configured as {}", cidr);
        Ok(())
    }
}

/// Global link-local configuration (protected by mutex)
static INSTALLED_CONFIG: Mutex<Option<IpConfig>> = Mutex::new(None);

/// Sink that publishes the configuration to the global slot
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobalConfig;

impl AddressSink for GlobalConfig {
    fn apply(&mut self, config: &IpConfig) -> Result<(), LinkLocalError> {
        let mut slot = INSTALLED_CONFIG.lock();
        if let Some(previous) = slot.as_ref() {
            warn!("stack: replacing installed address {}", previous.ip);
        }
        *slot = Some(config.clone());
        Ok(())
    }
}

/// Configuration most recently published through `GlobalConfig`
pub fn installed_config() -> Option<IpConfig> {
    INSTALLED_CONFIG.lock().clone()
}

/// Clear the global slot, e.g. before renegotiating
pub fn clear_installed_config() -> Option<IpConfig> {
    INSTALLED_CONFIG.lock().take()
}

/// Adapts a `NetworkDriver` to smoltcp's `Device` trait
///
/// Lets the driver that carried the probes back the interface once an
/// address is claimed.
pub struct DriverDevice<D: NetworkDriver> {
    driver: D,
}

impl<D: NetworkDriver> DriverDevice<D> {
    pub fn new(driver: D) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }
}

/// RX token implementation for smoltcp
pub struct DriverRxToken {
    buffer: Vec<u8>,
}

impl RxToken for DriverRxToken {
    fn consume<R, F>(mut self, f: F) -> R
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        f(&mut self.buffer)
    }
}

/// TX token implementation for smoltcp
pub struct DriverTxToken<'a, D: NetworkDriver> {
    driver: &'a mut D,
}

impl<'a, D: NetworkDriver> TxToken for DriverTxToken<'a, D> {
    fn consume<R, F>(self, len: usize, f: F) -> R
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        let mut buffer = vec![0u8; len];
        let result = f(&mut buffer);

        // smoltcp has no channel for transmit errors
        if let Err(e) = self.driver.send(&buffer) {
            warn!("stack: transmit failed: {}", e);
        }

        result
    }
}

impl<D: NetworkDriver> Device for DriverDevice<D> {
    type RxToken<'a> = DriverRxToken where Self: 'a;
    type TxToken<'a> = DriverTxToken<'a, D> where Self: 'a;

    fn receive(&mut self, _timestamp: Instant) -> Option<(Self::RxToken<'_>, Self::TxToken<'_>)> {
        match self.driver.receive() {
            Ok(Some(packet)) => Some((
                DriverRxToken { buffer: packet },
                DriverTxToken {
                    driver: &mut self.driver,
                },
            )),
            Ok(None) => None,
            Err(_) => None,
        }
    }

    fn transmit(&mut self, _timestamp: Instant) -> Option<Self::TxToken<'_>> {
        Some(DriverTxToken {
            driver: &mut self.driver,
        })
    }

    fn capabilities(&self) -> DeviceCapabilities {
        let mut caps = DeviceCapabilities::default();
        caps.max_transmission_unit = 1514;
        caps.max_burst_size = Some(1);
        caps.medium = Medium::Ethernet;
        caps
    }
}
