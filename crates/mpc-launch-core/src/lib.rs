//! mpc-launch core library
//!
//! Launches a local cluster of multi-party protocol workers:
//! - reads the cluster description and derives per-party launch specs
//! - gates the launch on a successful worker build
//! - spawns one worker per party, fire-and-forget or in the foreground
//! - merges every worker's stdout and stderr into one tagged console stream

pub mod build;
pub mod cluster;
pub mod error;
pub mod fakes;
pub mod launch_spec;
pub mod launcher;
pub mod layout;
pub mod multiplex;
pub mod precompute;
pub mod provision;
pub mod settings;
pub mod sink;
pub mod supervisor;
pub mod telemetry;
pub mod worker;

// Re-export key types
pub use build::{BuildGate, BuildTool, CargoBuild};
pub use cluster::{ClusterConfig, Party};
pub use error::{ConfigError, LaunchError, Result};
pub use launch_spec::{
    derive_preferences, parse_preferences, LaunchSpec, LaunchSpecBuilder, PreferencePolicy,
};
pub use launcher::Launcher;
pub use layout::EnvLayout;
pub use multiplex::{ReaderSummary, StreamMultiplexer};
pub use precompute::{run_dealer, DealerRequest};
pub use provision::{prepare_test_env, CertIssuer, CertRequest, OpensslCertIssuer, ProvisionOptions};
pub use settings::LauncherSettings;
pub use sink::{LineFormat, LogLine, OutputSink, StreamKind};
pub use supervisor::{ChildProcess, Cluster, PartyExit, ProcessSupervisor, SpawnFailure};
pub use telemetry::init_tracing;
pub use worker::Worker;
