use std::net::IpAddr;

use crate::error::HardwareAddressError;
use crate::types::HardwareAddress;

/// Derives the VTEP hardware address bound to a subnet's gateway IP.
pub trait HardwareAddressGenerator: Send + Sync {
    fn generate_for_vtep(&self, ip: IpAddr) -> Result<HardwareAddress, HardwareAddressError>;
}

/// Leading bytes of every VTEP address. `0xee` is locally administered and
/// unicast.
const VTEP_PREFIX: [u8; 2] = [0xee, 0xee];

/// `ee:ee:` followed by the four IPv4 octets, so distinct IPv4 addresses
/// always map to distinct hardware addresses.
#[derive(Debug, Clone, Copy, Default)]
pub struct VtepAddressGenerator;

impl HardwareAddressGenerator for VtepAddressGenerator {
    fn generate_for_vtep(&self, ip: IpAddr) -> Result<HardwareAddress, HardwareAddressError> {
        let IpAddr::V4(v4) = ip else {
            return Err(HardwareAddressError::UnsupportedFamily(ip));
        };
        let [p0, p1] = VTEP_PREFIX;
        let [a, b, c, d] = v4.octets();
        Ok(HardwareAddress::new([p0, p1, a, b, c, d]))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::net::{Ipv4Addr, Ipv6Addr};

    use super::*;

    #[test]
    fn embeds_ipv4_octets() {
        let mac = VtepAddressGenerator
            .generate_for_vtep(IpAddr::V4(Ipv4Addr::new(10, 255, 4, 0)))
            .unwrap();
        assert_eq!(mac.to_string(), "ee:ee:0a:ff:04:00");
    }

    #[test]
    fn deterministic() {
        let ip = IpAddr::V4(Ipv4Addr::new(10, 255, 17, 0));
        let a = VtepAddressGenerator.generate_for_vtep(ip).unwrap();
        let b = VtepAddressGenerator.generate_for_vtep(ip).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_ips_distinct_addresses() {
        let mut seen = HashSet::new();
        for third in 0..=255u8 {
            let ip = IpAddr::V4(Ipv4Addr::new(10, 255, third, 0));
            let mac = VtepAddressGenerator.generate_for_vtep(ip).unwrap();
            assert!(seen.insert(mac), "duplicate address {mac} for {ip}");
        }
    }

    #[test]
    fn locally_administered_unicast() {
        let mac = VtepAddressGenerator
            .generate_for_vtep(IpAddr::V4(Ipv4Addr::new(255, 255, 255, 255)))
            .unwrap();
        assert!(mac.is_locally_administered());
        assert!(!mac.is_multicast());
    }

    #[test]
    fn rejects_ipv6() {
        let err = VtepAddressGenerator
            .generate_for_vtep(IpAddr::V6(Ipv6Addr::LOCALHOST))
            .unwrap_err();
        assert!(matches!(err, HardwareAddressError::UnsupportedFamily(_)));
    }
}
