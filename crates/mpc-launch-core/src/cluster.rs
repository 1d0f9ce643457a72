//! Cluster description: the ordered list of parties.

use crate::error::{ConfigError, Result};
use crate::layout::EnvLayout;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One participant of the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    /// `host:port` the party listens on.
    pub address: String,
    /// Certificate file name, relative to the config file's directory.
    pub certificate: String,
}

/// Ordered party list. A party's id is its position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    parties: Vec<Party>,
}

impl ClusterConfig {
    /// Build a config from parties, validating it the same way [`load`](Self::load) does.
    pub fn from_parties(parties: Vec<Party>) -> std::result::Result<Self, ConfigError> {
        let config = Self { parties };
        config.validate(Path::new("<memory>"))?;
        Ok(config)
    }

    /// Config for `count` parties on one host with consecutive ports.
    pub fn local(
        address: &str,
        base_port: u16,
        count: usize,
    ) -> std::result::Result<Self, ConfigError> {
        let parties = (0..count)
            .map(|i| {
                let port = u16::try_from(i)
                    .ok()
                    .and_then(|offset| base_port.checked_add(offset))
                    .ok_or(ConfigError::PortOverflow {
                        base_port,
                        offset: i,
                    })?;
                Ok(Party {
                    address: format!("{address}:{port}"),
                    certificate: EnvLayout::certificate_name(i),
                })
            })
            .collect::<std::result::Result<Vec<_>, ConfigError>>()?;
        Self::from_parties(parties)
    }

    /// Load and validate a cluster file.
    pub fn load(path: impl AsRef<Path>) -> std::result::Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::Missing {
                    path: path.to_path_buf(),
                }
            } else {
                ConfigError::Unreadable {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let config: ClusterConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate(path)?;

        tracing::debug!(path = %path.display(), parties = config.len(), "Loaded cluster config");
        Ok(config)
    }

    /// Write the config as indented JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut serializer)?;
        std::fs::write(path, out)?;
        Ok(())
    }

    fn validate(&self, path: &Path) -> std::result::Result<(), ConfigError> {
        if self.parties.is_empty() {
            return Err(ConfigError::NoParties {
                path: path.to_path_buf(),
            });
        }
        for (party_id, party) in self.parties.iter().enumerate() {
            if !is_host_port(&party.address) {
                return Err(ConfigError::InvalidAddress {
                    party_id,
                    address: party.address.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn parties(&self) -> &[Party] {
        &self.parties
    }

    pub fn party(&self, party_id: usize) -> Option<&Party> {
        self.parties.get(party_id)
    }

    /// Number of parties (always at least one).
    pub fn len(&self) -> usize {
        self.parties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parties.is_empty()
    }
}

fn is_host_port(address: &str) -> bool {
    match address.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}
