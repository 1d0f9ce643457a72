//! Per-party launch parameters.

use crate::cluster::ClusterConfig;
use crate::error::{LaunchError, Result};
use crate::layout::EnvLayout;
use std::ffi::OsString;
use std::path::PathBuf;

/// Test default for a party's preference vector: `[id, id + 1, id + 5]`.
///
/// Chosen for reproducible runs only. Callers with real inputs should use
/// [`PreferencePolicy::Fixed`]. Entries saturate at `u64::MAX`.
pub fn derive_preferences(party_id: usize) -> Vec<u64> {
    let id = party_id as u64;
    vec![id, id.saturating_add(1), id.saturating_add(5)]
}

/// Parse a comma-separated preference list such as `"0,1,5"`.
pub fn parse_preferences(raw: &str) -> std::result::Result<Vec<u64>, std::num::ParseIntError> {
    raw.split(',').map(|x| x.trim().parse()).collect()
}

/// How the `--preferences` argument is filled in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PreferencePolicy {
    /// Do not pass preferences (workers without that input).
    #[default]
    None,
    /// Use [`derive_preferences`].
    Derived,
    /// Pass the same list to every party.
    Fixed(Vec<u64>),
}

impl PreferencePolicy {
    fn resolve(&self, party_id: usize) -> Option<Vec<u64>> {
        match self {
            PreferencePolicy::None => None,
            PreferencePolicy::Derived => Some(derive_preferences(party_id)),
            PreferencePolicy::Fixed(values) => Some(values.clone()),
        }
    }
}

/// Everything needed to start one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    party_id: usize,
    config_path: PathBuf,
    private_key_path: PathBuf,
    precomp_path: PathBuf,
    preferences: Option<Vec<u64>>,
}

impl LaunchSpec {
    pub fn party_id(&self) -> usize {
        self.party_id
    }

    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    pub fn private_key_path(&self) -> &PathBuf {
        &self.private_key_path
    }

    pub fn precomp_path(&self) -> &PathBuf {
        &self.precomp_path
    }

    pub fn preferences(&self) -> Option<&[u64]> {
        self.preferences.as_deref()
    }

    /// Worker command-line arguments.
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--config".into(),
            self.config_path.clone().into(),
            "--id".into(),
            self.party_id.to_string().into(),
            "--private-key".into(),
            self.private_key_path.clone().into(),
            "--precomp".into(),
            self.precomp_path.clone().into(),
        ];
        if let Some(preferences) = &self.preferences {
            args.push("--preferences".into());
            args.push(render_preferences(preferences).into());
        }
        args
    }
}

fn render_preferences(values: &[u64]) -> String {
    values
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Derives [`LaunchSpec`]s from a cluster config and a directory layout.
#[derive(Debug, Clone)]
pub struct LaunchSpecBuilder<'a> {
    layout: &'a EnvLayout,
    config: &'a ClusterConfig,
    policy: PreferencePolicy,
}

impl<'a> LaunchSpecBuilder<'a> {
    pub fn new(layout: &'a EnvLayout, config: &'a ClusterConfig) -> Self {
        Self {
            layout,
            config,
            policy: PreferencePolicy::None,
        }
    }

    pub fn with_preferences(mut self, policy: PreferencePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Spec for a single party.
    pub fn build(&self, party_id: usize) -> Result<LaunchSpec> {
        let num_parties = self.config.len();
        if party_id >= num_parties {
            return Err(LaunchError::InvalidPartyId {
                party_id,
                num_parties,
            });
        }

        Ok(LaunchSpec {
            party_id,
            config_path: self.layout.config_path(),
            private_key_path: self.layout.private_key_path(party_id),
            precomp_path: self.layout.precomp_path(party_id),
            preferences: self.policy.resolve(party_id),
        })
    }

    /// One spec per party, in id order.
    pub fn build_all(&self) -> Result<Vec<LaunchSpec>> {
        (0..self.config.len()).map(|id| self.build(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_party_config() -> ClusterConfig {
        ClusterConfig::local("127.0.0.1", 5000, 3).unwrap()
    }

    #[test]
    fn test_derive_preferences_formula() {
        assert_eq!(derive_preferences(0), vec![0, 1, 5]);
        assert_eq!(derive_preferences(1), vec![1, 2, 6]);
        assert_eq!(derive_preferences(2), vec![2, 3, 7]);
    }

    #[test]
    fn test_derive_preferences_is_pure() {
        for id in 0..64 {
            assert_eq!(derive_preferences(id), derive_preferences(id));
        }
    }

    #[test]
    fn test_derive_preferences_saturates_at_max_id() {
        let max = usize::MAX as u64;
        assert_eq!(
            derive_preferences(usize::MAX),
            vec![max, max.saturating_add(1), max.saturating_add(5)]
        );
    }

    #[test]
    fn test_parse_preferences() {
        assert_eq!(parse_preferences("0,1,5").unwrap(), vec![0, 1, 5]);
        assert_eq!(parse_preferences(" 3, 4 ").unwrap(), vec![3, 4]);
        assert!(parse_preferences("1,x").is_err());
    }

    #[test]
    fn test_build_all_covers_every_party() {
        let layout = EnvLayout::new("test-env");
        let config = three_party_config();
        let specs = LaunchSpecBuilder::new(&layout, &config).build_all().unwrap();

        let ids: Vec<usize> = specs.iter().map(LaunchSpec::party_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_build_paths_and_args() {
        let layout = EnvLayout::new("test-env");
        let config = three_party_config();
        let spec = LaunchSpecBuilder::new(&layout, &config)
            .with_preferences(PreferencePolicy::Derived)
            .build(1)
            .unwrap();

        assert_eq!(spec.private_key_path(), &PathBuf::from("test-env/node1/private.key"));
        assert_eq!(spec.precomp_path(), &PathBuf::from("test-env/node1/precomp.bin"));
        assert_eq!(spec.config_path(), &PathBuf::from("test-env/common/config.json"));

        let args: Vec<String> = spec
            .to_args()
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "--config",
                "test-env/common/config.json",
                "--id",
                "1",
                "--private-key",
                "test-env/node1/private.key",
                "--precomp",
                "test-env/node1/precomp.bin",
                "--preferences",
                "1,2,6",
            ]
        );
    }

    #[test]
    fn test_no_preferences_flag_by_default() {
        let layout = EnvLayout::new("env");
        let config = three_party_config();
        let spec = LaunchSpecBuilder::new(&layout, &config).build(0).unwrap();
        assert!(spec.preferences().is_none());
        assert!(!spec.to_args().iter().any(|a| a == "--preferences"));
    }

    #[test]
    fn test_fixed_preferences_override_formula() {
        let layout = EnvLayout::new("env");
        let config = three_party_config();
        let specs = LaunchSpecBuilder::new(&layout, &config)
            .with_preferences(PreferencePolicy::Fixed(vec![9, 8]))
            .build_all()
            .unwrap();
        assert!(specs.iter().all(|s| s.preferences() == Some(&[9, 8][..])));
    }

    #[test]
    fn test_party_id_out_of_range() {
        let layout = EnvLayout::new("env");
        let config = three_party_config();
        let err = LaunchSpecBuilder::new(&layout, &config).build(3).unwrap_err();
        assert!(matches!(
            err,
            LaunchError::InvalidPartyId {
                party_id: 3,
                num_parties: 3
            }
        ));
    }
}
