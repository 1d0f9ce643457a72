//! Build gate: worker binaries are compiled before anything is spawned.

use crate::error::{LaunchError, Result};
use crate::settings::LauncherSettings;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::{error, info};

/// Worker package built by `run-all` and `run-party`.
pub const MATCHER_PACKAGE: &str = "matcher";

/// Worker package built by `run-local`.
pub const TEST_APP_PACKAGE: &str = "mpc_test_app";

/// Offline precomputation tool.
pub const DEALER_PACKAGE: &str = "dealer";

/// External tool that compiles a package.
#[async_trait]
pub trait BuildTool: Send + Sync {
    /// Build `package`, failing with [`LaunchError::Build`] on a non-zero exit.
    async fn build(&self, package: &str) -> Result<()>;

    /// Tool name for log messages.
    fn name(&self) -> &str;
}

/// `cargo build -p <package>` with the configured profile.
#[derive(Debug, Clone)]
pub struct CargoBuild {
    cargo: PathBuf,
    profile: String,
}

impl CargoBuild {
    pub fn new(cargo: impl Into<PathBuf>, profile: &str) -> Self {
        Self {
            cargo: cargo.into(),
            profile: profile.to_string(),
        }
    }

    pub fn from_settings(settings: &LauncherSettings) -> Self {
        Self::new(&settings.cargo, &settings.profile)
    }

    /// Arguments passed to cargo for `package`.
    pub fn args(&self, package: &str) -> Vec<String> {
        let mut args = vec!["build".to_string()];
        if self.profile == "release" {
            args.push("--release".to_string());
        } else {
            args.push("--profile".to_string());
            args.push(self.profile.clone());
        }
        args.push("-p".to_string());
        args.push(package.to_string());
        args
    }
}

#[async_trait]
impl BuildTool for CargoBuild {
    async fn build(&self, package: &str) -> Result<()> {
        let status = Command::new(&self.cargo)
            .args(self.args(package))
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|source| LaunchError::Tool {
                tool: self.cargo.display().to_string(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(LaunchError::Build {
                package: package.to_string(),
                exit_code: status.code(),
            })
        }
    }

    fn name(&self) -> &str {
        "cargo"
    }
}

/// Runs the build step and stops the launch when it fails.
pub struct BuildGate<'a> {
    tool: &'a dyn BuildTool,
}

impl<'a> BuildGate<'a> {
    pub fn new(tool: &'a dyn BuildTool) -> Self {
        Self { tool }
    }

    /// Block until `package` is built. Failures are fatal and not retried.
    pub async fn pass(&self, package: &str) -> Result<()> {
        let start = Instant::now();
        info!(package, tool = self.tool.name(), "Building worker");

        match self.tool.build(package).await {
            Ok(()) => {
                info!(
                    package,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Build finished"
                );
                Ok(())
            }
            Err(e) => {
                error!(package, error = %e, "Build failed, nothing will be launched");
                Err(e)
            }
        }
    }
}
