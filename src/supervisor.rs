//! Main supervisor orchestration
//!
//! Drives the three phases — build, launch, provision — then blocks in a
//! poll-wait over child exit and shutdown requests, terminating the stack
//! process exactly once when asked to.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use nix::sys::signal::Signal;
use serde::{Deserialize, Serialize};

use crate::build::{BuildStep, CargoBuild, PrebuiltBinary};
use crate::errors::{Result, SupervisorError};
use crate::execution::{BinaryLauncher, ChildHandle, Launcher, StackExit};
use crate::network::{wait_for_interface, InterfaceConfig, IpCommand, NetConfigurer};

/// Supervisor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Interface the stack process creates
    pub interface: InterfaceConfig,
    /// How long to wait for the interface to appear
    pub ready_timeout_ms: u64,
    /// Poll interval for the readiness and exit waits
    pub poll_interval_ms: u64,
    /// Grace period between SIGTERM and SIGKILL on shutdown
    pub term_grace_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            interface: InterfaceConfig::default(),
            ready_timeout_ms: 5_000,
            poll_interval_ms: 100,
            term_grace_ms: 5_000,
        }
    }
}

impl SupervisorConfig {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn term_grace(&self) -> Duration {
        Duration::from_millis(self.term_grace_ms)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        serde_json::from_str(&content).map_err(|e| {
            SupervisorError::InvalidConfig(format!(
                "{}: {}",
                path.as_ref().display(),
                e
            ))
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.interface.validate()?;

        if self.ready_timeout_ms == 0 {
            return Err(SupervisorError::InvalidConfig(
                "ready timeout must be non-zero".to_string(),
            ));
        }

        if self.poll_interval_ms == 0 {
            return Err(SupervisorError::InvalidConfig(
                "poll interval must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Supervisor lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Child alive, interface configured, waiting for exit or shutdown
    Running,
    /// Termination signal sent to the child, waiting for it to exit
    ShuttingDown,
    /// Child reaped; exit status recorded
    Terminated,
}

/// Builder pattern for supervisor creation
pub struct SupervisorBuilder {
    config: SupervisorConfig,
    build_step: Option<Box<dyn BuildStep>>,
    launcher: Box<dyn Launcher>,
    net: Box<dyn NetConfigurer>,
}

impl SupervisorBuilder {
    /// Create new builder with the production collaborators
    pub fn new() -> Self {
        Self {
            config: SupervisorConfig::default(),
            build_step: None,
            launcher: Box::new(BinaryLauncher::new()),
            net: Box::new(IpCommand::new()),
        }
    }

    /// Set the interface configuration
    pub fn interface(mut self, interface: InterfaceConfig) -> Self {
        self.config.interface = interface;
        self
    }

    /// Set the interface address from "addr/prefix" notation
    pub fn cidr(mut self, cidr: &str) -> Result<Self> {
        self.config.interface = self.config.interface.clone().with_cidr(cidr)?;
        Ok(self)
    }

    /// Set how long to wait for the interface to appear
    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.config.ready_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the poll interval for readiness and exit waits
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the grace period between SIGTERM and SIGKILL
    pub fn term_grace(mut self, grace: Duration) -> Self {
        self.config.term_grace_ms = grace.as_millis() as u64;
        self
    }

    /// Replace the whole configuration (e.g. loaded from a file)
    pub fn config(mut self, config: SupervisorConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the stack binary with cargo before launching
    pub fn cargo_build(mut self, manifest_dir: impl AsRef<Path>, bin_name: &str) -> Self {
        self.build_step = Some(Box::new(CargoBuild::new(manifest_dir, bin_name)));
        self
    }

    /// Launch an already-built stack binary
    pub fn prebuilt(mut self, binary: impl AsRef<Path>) -> Self {
        self.build_step = Some(Box::new(PrebuiltBinary::new(binary)));
        self
    }

    /// Build supervisor
    pub fn build(self) -> Result<Supervisor> {
        self.config.validate()?;

        let build_step = self.build_step.ok_or_else(|| {
            SupervisorError::InvalidConfig(
                "no stack binary configured (cargo_build or prebuilt)".to_string(),
            )
        })?;

        Ok(Supervisor::with_collaborators(
            self.config,
            build_step,
            self.launcher,
            self.net,
        ))
    }
}

impl Default for SupervisorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Supervisor for the stack process and its interface
pub struct Supervisor {
    config: SupervisorConfig,
    build_step: Box<dyn BuildStep>,
    launcher: Box<dyn Launcher>,
    net: Box<dyn NetConfigurer>,
    shutdown: Arc<AtomicBool>,
    state: SupervisorState,
    child: Option<Box<dyn ChildHandle>>,
}

impl Supervisor {
    /// Create a supervisor with explicit collaborators
    ///
    /// The builder wires the production ones; tests substitute fakes here.
    pub fn with_collaborators(
        config: SupervisorConfig,
        build_step: Box<dyn BuildStep>,
        launcher: Box<dyn Launcher>,
        net: Box<dyn NetConfigurer>,
    ) -> Self {
        Self {
            config,
            build_step,
            launcher,
            net,
            shutdown: Arc::new(AtomicBool::new(false)),
            state: SupervisorState::Terminated,
            child: None,
        }
    }

    /// Flag that requests shutdown when set
    ///
    /// Register this with the signal layer; tests may set it directly.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Current lifecycle state
    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Get supervisor configuration
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Run all phases and supervise the stack process until it exits
    ///
    /// Returns the child's final status; the caller propagates it as the
    /// process exit code.
    pub fn run(&mut self) -> Result<StackExit> {
        if self.child.is_some() {
            return Err(SupervisorError::AlreadyRunning);
        }
        self.config.validate()?;

        let binary = self.build_step.build()?;

        let child = self.launcher.launch(&binary)?;
        debug!("Supervising stack process (pid {})", child.pid());
        self.child = Some(child);
        self.state = SupervisorState::Running;

        if let Err(e) = self.provision() {
            // The child holds the interface open; without provisioning it is
            // useless, so tear it down before surfacing the error.
            self.teardown_child();
            self.state = SupervisorState::Terminated;
            return Err(e);
        }

        let exit = self.supervise()?;
        self.state = SupervisorState::Terminated;
        info!(
            "Stack process exited with status {} ({:?})",
            exit.status_code(),
            exit
        );
        Ok(exit)
    }

    /// Wait for the interface, assign the address, bring the link up
    fn provision(&mut self) -> Result<()> {
        let interface = self.config.interface.clone();

        wait_for_interface(
            self.net.as_ref(),
            &interface.name,
            self.config.ready_timeout(),
            self.config.poll_interval(),
        )?;

        self.net.add_address(&interface)?;
        self.net.set_link_up(&interface.name)?;

        info!("Interface {} configured as {}", interface.name, interface.cidr());
        Ok(())
    }

    /// Block until the child exits or shutdown is requested
    fn supervise(&mut self) -> Result<StackExit> {
        let mut term_sent_at: Option<Instant> = None;

        loop {
            let child = self.child.as_mut().ok_or(SupervisorError::NotRunning)?;

            if let Some(exit) = child.try_wait()? {
                self.child = None;
                return Ok(exit);
            }

            if self.state == SupervisorState::Running && self.shutdown.load(Ordering::SeqCst) {
                info!("Shutdown requested; terminating stack (pid {})", child.pid());
                if let Err(e) = child.signal(Signal::SIGTERM) {
                    // The child may have exited in the meantime; the next
                    // try_wait reaps it.
                    debug!("SIGTERM not delivered: {}", e);
                }
                self.state = SupervisorState::ShuttingDown;
                term_sent_at = Some(Instant::now());
            }

            if let Some(at) = term_sent_at {
                if at.elapsed() >= self.config.term_grace() {
                    warn!(
                        "Stack did not exit within {:?}; sending SIGKILL",
                        self.config.term_grace()
                    );
                    if let Err(e) = child.signal(Signal::SIGKILL) {
                        debug!("SIGKILL not delivered: {}", e);
                    }
                    term_sent_at = None;
                }
            }

            thread::sleep(self.config.poll_interval());
        }
    }

    /// Terminate and reap the child after a provisioning failure
    fn teardown_child(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        warn!("Tearing down stack process (pid {})", child.pid());
        if let Err(e) = child.signal(Signal::SIGTERM) {
            debug!("SIGTERM not delivered: {}", e);
        }

        let start = Instant::now();
        let mut force_killed = false;
        loop {
            match child.try_wait() {
                Ok(Some(exit)) => {
                    debug!("Stack process exited with {:?} during teardown", exit);
                    return;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Lost track of stack process during teardown: {}", e);
                    return;
                }
            }
            if !force_killed && start.elapsed() >= self.config.term_grace() {
                if let Err(e) = child.signal(Signal::SIGKILL) {
                    debug!("SIGKILL not delivered: {}", e);
                }
                force_killed = true;
            }
            thread::sleep(self.config.poll_interval());
        }
    }
}
