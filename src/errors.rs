//! Error types for supervisor operations

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type for supervisor operations
pub type Result<T> = std::result::Result<T, SupervisorError>;

/// Errors that can occur while supervising the stack process
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Build failed: {0}")]
    Build(String),

    #[error("Launch failed: {0}")]
    Launch(String),

    #[error("Interface {name} not ready after {waited:?}")]
    InterfaceNotReady { name: String, waited: Duration },

    #[error("Interface configuration failed: {0}")]
    Configuration(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Syscall error: {0}")]
    Syscall(String),

    #[error("Supervisor already running")]
    AlreadyRunning,

    #[error("Supervisor not running")]
    NotRunning,
}
