//! Launcher settings resolved from the environment.

use std::path::PathBuf;

/// Default test environment directory.
pub const DEFAULT_ENV_DIR: &str = "test-env";

/// Default cargo profile used for worker builds.
pub const DEFAULT_PROFILE: &str = "release";

/// Paths and tools the launcher works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherSettings {
    /// Root of the test environment (`common/`, `node<i>/`).
    pub env_dir: PathBuf,
    /// Cargo target directory holding the built workers.
    pub target_dir: PathBuf,
    /// Cargo profile to build with (`release`, `dev`, or a custom one).
    pub profile: String,
    /// Cargo executable.
    pub cargo: PathBuf,
    /// OpenSSL config used when issuing certificates.
    pub openssl_config: PathBuf,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        LauncherSettings {
            env_dir: std::env::var("MPC_LAUNCH_DIR")
                .unwrap_or_else(|_| DEFAULT_ENV_DIR.to_string())
                .into(),
            target_dir: std::env::var("CARGO_TARGET_DIR")
                .unwrap_or_else(|_| "target".to_string())
                .into(),
            profile: std::env::var("MPC_LAUNCH_PROFILE")
                .unwrap_or_else(|_| DEFAULT_PROFILE.to_string()),
            cargo: std::env::var("CARGO")
                .unwrap_or_else(|_| "cargo".to_string())
                .into(),
            openssl_config: std::env::var("MPC_LAUNCH_OPENSSL_CNF")
                .unwrap_or_else(|_| "openssl.cnf".to_string())
                .into(),
        }
    }
}

impl LauncherSettings {
    /// Create settings from environment variables.
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Use a different test environment directory.
    pub fn with_env_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.env_dir = dir.into();
        self
    }

    /// Use a different cargo target directory.
    pub fn with_target_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.target_dir = dir.into();
        self
    }

    /// Build with a different cargo profile.
    pub fn with_profile(mut self, profile: &str) -> Self {
        self.profile = profile.to_string();
        self
    }

    /// Directory cargo places binaries of the configured profile in.
    ///
    /// Cargo maps the `dev` profile onto `target/debug`.
    pub fn profile_dir(&self) -> PathBuf {
        let dir = match self.profile.as_str() {
            "dev" | "test" => "debug",
            other => other,
        };
        self.target_dir.join(dir)
    }
}
