use std::net::Ipv4Addr;

use netbind_addr::MacAddr;

/// Last-known address configuration, kept independent of stack state.
///
/// The DHCP fallback path re-asserts these values when no lease arrives, so
/// setters and successful leases both refresh it.
#[derive(Debug, Clone)]
pub(crate) struct AddressCache {
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub mac: MacAddr,
    pub mtu: u32,
}

impl Default for AddressCache {
    fn default() -> Self {
        Self {
            ip: Ipv4Addr::UNSPECIFIED,
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            gateway: Ipv4Addr::UNSPECIFIED,
            mac: MacAddr::UNSPECIFIED,
            mtu: 1500,
        }
    }
}
