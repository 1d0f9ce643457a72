//! Which binary to build and how to invoke it.

use crate::build::{DEALER_PACKAGE, MATCHER_PACKAGE, TEST_APP_PACKAGE};
use crate::launch_spec::PreferencePolicy;
use crate::settings::LauncherSettings;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// A buildable worker package and the command that runs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worker {
    package: String,
    program: PathBuf,
    program_args: Vec<OsString>,
    preferences: PreferencePolicy,
}

impl Worker {
    /// Worker whose binary is `<target>/<profile>/<package>`.
    pub fn new(package: &str, settings: &LauncherSettings) -> Self {
        let binary = format!("{package}{}", std::env::consts::EXE_SUFFIX);
        Self {
            package: package.to_string(),
            program: settings.profile_dir().join(binary),
            program_args: Vec::new(),
            preferences: PreferencePolicy::None,
        }
    }

    /// Matching worker, fed the derived test preferences.
    pub fn matcher(settings: &LauncherSettings) -> Self {
        Self::new(MATCHER_PACKAGE, settings).with_preferences(PreferencePolicy::Derived)
    }

    /// Protocol smoke-test worker; takes no preferences.
    pub fn test_app(settings: &LauncherSettings) -> Self {
        Self::new(TEST_APP_PACKAGE, settings)
    }

    /// Offline dealer for precomputed data.
    pub fn dealer(settings: &LauncherSettings) -> Self {
        Self::new(DEALER_PACKAGE, settings)
    }

    pub fn with_preferences(mut self, policy: PreferencePolicy) -> Self {
        self.preferences = policy;
        self
    }

    /// Run a different program, with `args` placed before the worker arguments.
    pub fn with_program<I, S>(mut self, program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.program = program.into();
        self.program_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn program_args(&self) -> &[OsString] {
        &self.program_args
    }

    pub fn preferences(&self) -> &PreferencePolicy {
        &self.preferences
    }
}
