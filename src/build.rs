//! Build step producing the optimized stack binary

use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info};

use crate::errors::{Result, SupervisorError};

/// Produces a runnable optimized executable or fails
pub trait BuildStep {
    /// Build the stack binary and return the artifact path
    fn build(&self) -> Result<PathBuf>;
}

/// Builds the stack binary with `cargo build --release`
#[derive(Debug, Clone)]
pub struct CargoBuild {
    /// Directory containing the stack crate's Cargo.toml
    manifest_dir: PathBuf,
    /// Binary name under target/release
    bin_name: String,
}

impl CargoBuild {
    pub fn new(manifest_dir: impl AsRef<Path>, bin_name: &str) -> Self {
        Self {
            manifest_dir: manifest_dir.as_ref().to_path_buf(),
            bin_name: bin_name.to_string(),
        }
    }

    /// Path the artifact lands at after a release build
    pub fn artifact_path(&self) -> PathBuf {
        self.manifest_dir
            .join("target")
            .join("release")
            .join(&self.bin_name)
    }
}

impl BuildStep for CargoBuild {
    fn build(&self) -> Result<PathBuf> {
        info!(
            "Building {} in {}",
            self.bin_name,
            self.manifest_dir.display()
        );

        // Build output goes straight to the operator's terminal
        let status = Command::new("cargo")
            .args(["build", "--release"])
            .current_dir(&self.manifest_dir)
            .status()
            .map_err(|e| SupervisorError::Build(format!("failed to invoke cargo: {}", e)))?;

        if !status.success() {
            return Err(SupervisorError::Build(format!(
                "cargo build --release exited with {}",
                status
            )));
        }

        let artifact = self.artifact_path();
        if !artifact.is_file() {
            return Err(SupervisorError::Build(format!(
                "build succeeded but {} is missing",
                artifact.display()
            )));
        }

        debug!("Build artifact ready at {}", artifact.display());
        Ok(artifact)
    }
}

/// No-op build step for a prebuilt binary
#[derive(Debug, Clone)]
pub struct PrebuiltBinary {
    path: PathBuf,
}

impl PrebuiltBinary {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl BuildStep for PrebuiltBinary {
    fn build(&self) -> Result<PathBuf> {
        if !self.path.is_file() {
            return Err(SupervisorError::Build(format!(
                "prebuilt binary {} not found",
                self.path.display()
            )));
        }
        Ok(self.path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_path_is_release() {
        let build = CargoBuild::new("/srv/stack", "netstack");
        assert_eq!(
            build.artifact_path(),
            PathBuf::from("/srv/stack/target/release/netstack")
        );
    }

    #[test]
    fn test_prebuilt_missing_is_build_error() {
        let step = PrebuiltBinary::new("/nonexistent/netstack");
        match step.build() {
            Err(SupervisorError::Build(msg)) => assert!(msg.contains("not found")),
            other => panic!("expected Build error, got {:?}", other.map(|p| p.display().to_string())),
        }
    }
}
