//! Error taxonomy for the launcher.

use std::path::PathBuf;

/// Problems with the cluster description file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cluster config not found: {path}")]
    Missing { path: PathBuf },

    #[error("failed to read cluster config {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed cluster config {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cluster config {path} lists no parties")]
    NoParties { path: PathBuf },

    #[error("party {party_id} has invalid address {address:?} (expected host:port)")]
    InvalidAddress { party_id: usize, address: String },

    #[error("port {base_port} + {offset} does not fit in a u16")]
    PortOverflow { base_port: u16, offset: usize },
}

/// Launcher errors.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("party id {party_id} out of range (cluster has {num_parties} parties)")]
    InvalidPartyId { party_id: usize, num_parties: usize },

    #[error("build of {package} failed with {}", describe_exit(.exit_code))]
    Build {
        package: String,
        exit_code: Option<i32>,
    },

    #[error("failed to spawn worker for party {party_id}: {source}")]
    Spawn {
        party_id: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to run {tool}: {source}")]
    Tool {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("credential issue for party {party_id} failed: {reason}")]
    Provision { party_id: usize, reason: String },

    #[error("target directory `{}` already exists, please remove it first", .0.display())]
    TargetExists(PathBuf),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

/// Result type for launcher operations.
pub type Result<T> = std::result::Result<T, LaunchError>;
