//! Launching and reaping the stack process

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};

use log::{debug, info, warn};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use crate::errors::{Result, SupervisorError};
use crate::utils;

/// Final status of the stack process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackExit {
    /// Exit code, if the process exited normally
    pub code: Option<i32>,
    /// Signal that terminated the process, if any
    pub signal: Option<i32>,
}

impl StackExit {
    pub fn from_code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn from_signal(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    pub fn from_status(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
            signal: status.signal(),
        }
    }

    /// Process exit code to propagate: the child's own code, or the
    /// conventional 128 + signo for a signal death
    pub fn status_code(&self) -> i32 {
        match (self.code, self.signal) {
            (Some(code), _) => code,
            (None, Some(signal)) => 128 + signal,
            (None, None) => -1,
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Handle to a running stack process
///
/// The supervisor owns exactly one of these per run and reaps it exactly
/// once; `try_wait` returning `Some` consumes the exit status.
pub trait ChildHandle {
    /// OS process identifier
    fn pid(&self) -> u32;

    /// Non-blocking reap; `Some` exactly once, when the child has exited
    fn try_wait(&mut self) -> Result<Option<StackExit>>;

    /// Deliver a signal to the child
    fn signal(&mut self, signal: Signal) -> Result<()>;
}

/// Spawns the stack binary as a detached background child
pub trait Launcher {
    fn launch(&self, binary: &Path) -> Result<Box<dyn ChildHandle>>;
}

/// Real stack process backed by a spawned OS child
pub struct StackProcess {
    child: Child,
    reaped: bool,
}

impl StackProcess {
    fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }
}

impl ChildHandle for StackProcess {
    fn pid(&self) -> u32 {
        self.child.id()
    }

    fn try_wait(&mut self) -> Result<Option<StackExit>> {
        if self.reaped {
            return Err(SupervisorError::NotRunning);
        }
        match self.child.try_wait()? {
            Some(status) => {
                self.reaped = true;
                Ok(Some(StackExit::from_status(status)))
            }
            None => Ok(None),
        }
    }

    fn signal(&mut self, signal: Signal) -> Result<()> {
        kill(Pid::from_raw(self.child.id() as i32), signal)
            .map_err(|e| SupervisorError::Syscall(format!("failed to send {}: {}", signal, e)))
    }
}

/// Launches the stack executable with pass-through stdio
#[derive(Debug, Clone, Default)]
pub struct BinaryLauncher {
    /// Working directory for the child, if any
    cwd: Option<PathBuf>,
    /// Arguments passed to the stack binary (none in the usual deployment)
    args: Vec<String>,
}

impl BinaryLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

impl Launcher for BinaryLauncher {
    fn launch(&self, binary: &Path) -> Result<Box<dyn ChildHandle>> {
        if !utils::has_net_admin() {
            warn!(
                "Neither root nor CAP_NET_ADMIN; {} will likely fail to open /dev/net/tun",
                binary.display()
            );
        }

        let mut command = Command::new(binary);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }

        let child = command.spawn().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                SupervisorError::Launch(format!("stack binary {} not found", binary.display()))
            }
            io::ErrorKind::PermissionDenied => {
                SupervisorError::Launch(format!("permission denied executing {}", binary.display()))
            }
            _ => SupervisorError::Launch(format!("failed to spawn {}: {}", binary.display(), e)),
        })?;

        info!("Launched {} (pid {})", binary.display(), child.id());
        debug!("Stack process stdio passes through to the terminal");

        Ok(Box::new(StackProcess::new(child)))
    }
}
