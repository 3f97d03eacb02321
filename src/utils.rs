//! Privilege and system probes for supervisor operations

use crate::errors::{Result, SupervisorError};
#[cfg(test)]
use std::cell::Cell;
use std::fs;
use std::path::Path;

#[cfg(test)]
thread_local! {
    static NET_ADMIN_OVERRIDE: Cell<Option<bool>> = const { Cell::new(None) };
}

/// CAP_NET_ADMIN bit in the kernel capability masks
const CAP_NET_ADMIN: u32 = 12;

/// Check if running as root
pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// Get current effective UID
pub fn get_euid() -> u32 {
    unsafe { libc::geteuid() }
}

/// Get current effective GID
pub fn get_egid() -> u32 {
    unsafe { libc::getegid() }
}

/// Check if the current process holds CAP_NET_ADMIN
pub fn has_net_admin() -> bool {
    #[cfg(test)]
    {
        if let Some(value) = NET_ADMIN_OVERRIDE.with(|cell| cell.get()) {
            return value;
        }
    }

    if is_root() {
        return true;
    }

    match fs::read_to_string("/proc/self/status") {
        Ok(status) => cap_eff_has(&status, CAP_NET_ADMIN),
        Err(_) => false,
    }
}

/// Ensure the process can configure network interfaces
pub fn require_net_admin() -> Result<()> {
    if has_net_admin() {
        Ok(())
    } else {
        Err(SupervisorError::PermissionDenied(
            "configuring network interfaces requires root or CAP_NET_ADMIN".to_string(),
        ))
    }
}

/// Parse a /proc status dump and test a bit in the CapEff mask
fn cap_eff_has(status: &str, cap: u32) -> bool {
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("CapEff:") {
            if let Ok(mask) = u64::from_str_radix(rest.trim(), 16) {
                return mask & (1u64 << cap) != 0;
            }
        }
    }
    false
}

/// Check if the TUN driver is available
pub fn has_tun_device() -> bool {
    Path::new("/dev/net/tun").exists()
}

/// Check if the `ip` utility is on PATH
pub fn has_ip_command() -> bool {
    let path = std::env::var_os("PATH").unwrap_or_default();
    std::env::split_paths(&path).any(|dir| dir.join("ip").is_file())
}

/// Detected system readiness for running the supervisor
///
/// Probes the running kernel and system configuration so failures can be
/// diagnosed before any phase runs, allowing graceful degradation in the
/// `check` command.
#[derive(Debug, Clone)]
pub struct SystemReadiness {
    /// Running as root (euid == 0)
    pub has_root: bool,
    /// CAP_NET_ADMIN present in the effective set
    pub has_net_admin: bool,
    /// /dev/net/tun exists
    pub has_tun_device: bool,
    /// `ip` utility found on PATH
    pub has_ip_command: bool,
}

impl SystemReadiness {
    /// Detect all readiness conditions on the current system
    pub fn detect() -> Self {
        Self {
            has_root: is_root(),
            has_net_admin: has_net_admin(),
            has_tun_device: has_tun_device(),
            has_ip_command: has_ip_command(),
        }
    }

    /// Check whether the supervisor can provision interfaces
    pub fn can_provision(&self) -> bool {
        self.has_net_admin && self.has_ip_command
    }

    /// Get a human-readable summary of readiness
    pub fn summary(&self) -> String {
        let check = |available: bool| if available { "[ok]" } else { "[--]" };

        let lines = vec![
            format!("{} Root privileges", check(self.has_root)),
            format!("{} CAP_NET_ADMIN", check(self.has_net_admin)),
            format!("{} TUN driver (/dev/net/tun)", check(self.has_tun_device)),
            format!("{} ip utility on PATH", check(self.has_ip_command)),
        ];

        lines.join("\n")
    }
}

#[cfg(test)]
pub fn override_net_admin(value: Option<bool>) {
    NET_ADMIN_OVERRIDE.with(|cell| cell.set(value));
}
