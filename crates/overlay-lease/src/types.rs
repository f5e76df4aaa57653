use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

use crate::error::HardwareAddressError;

/// A host's exclusive claim on one overlay subnet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    /// Stable identifier of the underlay host, usually its underlay IP.
    pub host_identifier: String,
    pub overlay_subnet: Ipv4Net,
    /// VTEP hardware address, derived from [`Lease::gateway_ip`].
    pub overlay_hardware_address: HardwareAddress,
}

impl Lease {
    pub fn gateway_ip(&self) -> Ipv4Addr {
        gateway_ip(&self.overlay_subnet)
    }
}

/// Gateway (VTEP) address of an overlay subnet: its network address.
pub fn gateway_ip(subnet: &Ipv4Net) -> Ipv4Addr {
    subnet.network()
}

/// A 48-bit MAC address, rendered as `ee:ee:0a:ff:04:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HardwareAddress([u8; 6]);

impl HardwareAddress {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_locally_administered(&self) -> bool {
        let [first, ..] = self.0;
        first & 0x02 != 0
    }

    pub fn is_multicast(&self) -> bool {
        let [first, ..] = self.0;
        first & 0x01 != 0
    }
}

impl fmt::Display for HardwareAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for HardwareAddress {
    type Err = HardwareAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in &mut octets {
            let part = parts
                .next()
                .filter(|p| p.len() == 2)
                .ok_or_else(|| HardwareAddressError::Parse(s.to_string()))?;
            *octet = u8::from_str_radix(part, 16)
                .map_err(|_| HardwareAddressError::Parse(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(HardwareAddressError::Parse(s.to_string()));
        }
        Ok(Self(octets))
    }
}

impl TryFrom<String> for HardwareAddress {
    type Error = HardwareAddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HardwareAddress> for String {
    fn from(value: HardwareAddress) -> Self {
        value.to_string()
    }
}
