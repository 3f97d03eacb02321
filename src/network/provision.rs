//! Interface provisioning via the OS network-configuration layer

use std::path::Path;
use std::process::Command;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::errors::{Result, SupervisorError};
use crate::network::interface::InterfaceConfig;
use crate::utils;

/// OS operations the supervisor needs on a network interface
pub trait NetConfigurer {
    /// Whether the interface currently exists
    fn interface_exists(&self, name: &str) -> bool;

    /// Assign address+prefix to the interface
    fn add_address(&self, config: &InterfaceConfig) -> Result<()>;

    /// Set the interface administratively up
    fn set_link_up(&self, name: &str) -> Result<()>;
}

/// Configures interfaces by shelling out to the `ip` utility
#[derive(Debug, Clone, Default)]
pub struct IpCommand;

impl IpCommand {
    pub fn new() -> Self {
        Self
    }

    fn run_ip(&self, args: &[&str]) -> Result<()> {
        utils::require_net_admin()?;

        debug!("ip {}", args.join(" "));
        let output = Command::new("ip")
            .args(args)
            .output()
            .map_err(|e| SupervisorError::Configuration(format!("failed to invoke ip: {}", e)))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);

        // Re-applying the same address is not an error at the OS level
        if stderr.contains("File exists") {
            debug!("ip {}: already applied", args.join(" "));
            return Ok(());
        }

        if stderr.contains("Operation not permitted") {
            return Err(SupervisorError::PermissionDenied(format!(
                "ip {} requires root or CAP_NET_ADMIN",
                args.join(" ")
            )));
        }

        Err(SupervisorError::Configuration(format!(
            "ip {} exited with {}: {}",
            args.join(" "),
            output.status,
            stderr.trim()
        )))
    }
}

impl NetConfigurer for IpCommand {
    fn interface_exists(&self, name: &str) -> bool {
        Path::new("/sys/class/net").join(name).exists()
    }

    fn add_address(&self, config: &InterfaceConfig) -> Result<()> {
        self.run_ip(&["addr", "add", &config.cidr(), "dev", &config.name])
    }

    fn set_link_up(&self, name: &str) -> Result<()> {
        self.run_ip(&["link", "set", "up", "dev", name])
    }
}

/// Wait for the stack process to create its interface
///
/// The interface appears asynchronously some time after the child starts, so
/// existence is polled with a bounded deadline instead of assuming the
/// creation wins the race.
pub fn wait_for_interface(
    net: &dyn NetConfigurer,
    name: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let start = Instant::now();
    loop {
        if net.interface_exists(name) {
            info!("Interface {} is present after {:?}", name, start.elapsed());
            return Ok(());
        }
        if start.elapsed() >= timeout {
            return Err(SupervisorError::InterfaceNotReady {
                name: name.to_string(),
                waited: start.elapsed(),
            });
        }
        std::thread::sleep(poll_interval.min(timeout.saturating_sub(start.elapsed())));
    }
}
