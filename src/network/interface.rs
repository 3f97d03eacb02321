//! TUN interface configuration

use crate::errors::{Result, SupervisorError};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Configuration for the interface the stack process creates
///
/// The name is fixed by the stack binary (the TUN driver hands it `tun0` in
/// the usual deployment); the supervisor only assigns the address and brings
/// the link up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceConfig {
    /// Interface name
    pub name: String,
    /// IPv4 address assigned to the host side
    pub ipv4: Ipv4Addr,
    /// Prefix length
    pub prefix_len: u8,
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            name: "tun0".to_string(),
            ipv4: Ipv4Addr::new(192, 168, 0, 1),
            prefix_len: 24,
        }
    }
}

impl InterfaceConfig {
    /// Create new interface configuration
    pub fn new(name: &str, ipv4: Ipv4Addr, prefix_len: u8) -> Self {
        Self {
            name: name.to_string(),
            ipv4,
            prefix_len,
        }
    }

    /// Validate interface configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(SupervisorError::InvalidConfig(
                "Interface name cannot be empty".to_string(),
            ));
        }

        if self.prefix_len > 32 {
            return Err(SupervisorError::InvalidConfig(format!(
                "Invalid prefix length /{}",
                self.prefix_len
            )));
        }

        if self.ipv4.is_unspecified() || self.ipv4.is_broadcast() {
            return Err(SupervisorError::InvalidConfig(
                "Invalid IP address for interface".to_string(),
            ));
        }

        Ok(())
    }

    /// Get CIDR notation
    pub fn cidr(&self) -> String {
        format!("{}/{}", self.ipv4, self.prefix_len)
    }

    /// Replace the address from a "addr/prefix" string
    pub fn with_cidr(mut self, cidr: &str) -> Result<Self> {
        let (ipv4, prefix_len) = parse_cidr(cidr)?;
        self.ipv4 = ipv4;
        self.prefix_len = prefix_len;
        Ok(self)
    }
}

/// Parse "addr/prefix" notation
pub fn parse_cidr(cidr: &str) -> Result<(Ipv4Addr, u8)> {
    let (addr_part, prefix_part) = cidr.split_once('/').ok_or_else(|| {
        SupervisorError::InvalidConfig(format!("Expected addr/prefix, got '{}'", cidr))
    })?;

    let ipv4 = Ipv4Addr::from_str(addr_part)
        .map_err(|_| SupervisorError::InvalidConfig(format!("Invalid IPv4 address '{}'", addr_part)))?;

    let prefix_len: u8 = prefix_part
        .parse()
        .map_err(|_| SupervisorError::InvalidConfig(format!("Invalid prefix '{}'", prefix_part)))?;

    if prefix_len > 32 {
        return Err(SupervisorError::InvalidConfig(format!(
            "Invalid prefix length /{}",
            prefix_len
        )));
    }

    Ok((ipv4, prefix_len))
}
