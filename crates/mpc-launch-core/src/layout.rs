//! On-disk layout of a test environment.
//!
//! ```text
//! <dir>/common/config.json
//! <dir>/common/node<i>.pem
//! <dir>/node<i>/private.key
//! <dir>/node<i>/precomp.bin
//! ```

use std::path::{Path, PathBuf};

/// Placeholder the dealer substitutes with the party id in output paths.
pub const PARTY_PLACEHOLDER: &str = "#";

/// Path derivation for one test environment root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvLayout {
    root: PathBuf,
}

impl EnvLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn common_dir(&self) -> PathBuf {
        self.root.join("common")
    }

    /// Shared cluster configuration file.
    pub fn config_path(&self) -> PathBuf {
        self.common_dir().join("config.json")
    }

    /// File name of a party's certificate, relative to `common/`.
    pub fn certificate_name(party_id: usize) -> String {
        format!("node{party_id}.pem")
    }

    pub fn certificate_path(&self, party_id: usize) -> PathBuf {
        self.common_dir().join(Self::certificate_name(party_id))
    }

    pub fn node_dir(&self, party_id: usize) -> PathBuf {
        self.root.join(format!("node{party_id}"))
    }

    pub fn private_key_path(&self, party_id: usize) -> PathBuf {
        self.node_dir(party_id).join("private.key")
    }

    pub fn precomp_path(&self, party_id: usize) -> PathBuf {
        self.node_dir(party_id).join("precomp.bin")
    }

    /// Precomputed-data path with the party id left as [`PARTY_PLACEHOLDER`].
    pub fn precomp_pattern(&self) -> PathBuf {
        self.root
            .join(format!("node{PARTY_PLACEHOLDER}"))
            .join("precomp.bin")
    }
}
