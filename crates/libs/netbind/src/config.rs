//! Static interface configuration parsed from an INI fragment.

use std::net::Ipv4Addr;

use crate::error::NetifError;

/// Static configuration for one interface.
///
/// ```text
/// [interface:eth0]
/// ip = 192.0.2.10
/// netmask = 255.255.255.0
/// gateway = 192.0.2.1
/// mtu = 1500
/// dhcp = yes
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetifConfig {
    pub name: String,
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub mtu: u32,
    pub dhcp: bool,
}

impl NetifConfig {
    pub fn from_ini(ini: &str) -> Result<Self, NetifError> {
        let mut name = None;
        let mut ip = Ipv4Addr::UNSPECIFIED;
        let mut netmask = Ipv4Addr::new(255, 255, 255, 0);
        let mut gateway = Ipv4Addr::UNSPECIFIED;
        let mut mtu = 1500u32;
        let mut dhcp = false;
        let mut in_section = false;

        for raw_line in ini.lines() {
            let line = raw_line.trim();

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                let section = line[1..line.len() - 1].trim();
                match section.strip_prefix("interface:") {
                    Some(section_name) if !section_name.trim().is_empty() => {
                        name = Some(section_name.trim().to_string());
                        in_section = true;
                    }
                    _ => in_section = false,
                }
                continue;
            }

            if !in_section {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(NetifError::invalid_argument(format!(
                    "expected `key = value`, got `{line}`"
                )));
            };

            let value = value.trim();
            match key.trim() {
                "ip" => ip = parse_addr(value, line)?,
                "netmask" => netmask = parse_addr(value, line)?,
                "gateway" => gateway = parse_addr(value, line)?,
                "mtu" => {
                    mtu = value.parse().map_err(|_| {
                        NetifError::invalid_argument(format!("invalid mtu in `{line}`"))
                    })?;
                }
                "dhcp" => {
                    dhcp = matches!(
                        value.to_ascii_lowercase().as_str(),
                        "1" | "true" | "yes" | "on"
                    );
                }
                _ => {}
            }
        }

        let name = name.ok_or_else(|| {
            NetifError::invalid_argument("missing [interface:<name>] section")
        })?;

        Ok(Self { name, ip, netmask, gateway, mtu, dhcp })
    }
}

fn parse_addr(value: &str, line: &str) -> Result<Ipv4Addr, NetifError> {
    value
        .parse()
        .map_err(|_| NetifError::invalid_argument(format!("invalid address in `{line}`")))
}
