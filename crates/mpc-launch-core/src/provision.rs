//! Test environment provisioning: directory tree, credentials, cluster file.

use crate::cluster::ClusterConfig;
use crate::error::{LaunchError, Result};
use crate::layout::EnvLayout;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::info;

/// Key and certificate locations for one party.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertRequest {
    pub party_id: usize,
    pub key_path: PathBuf,
    pub cert_path: PathBuf,
}

impl CertRequest {
    pub fn for_party(layout: &EnvLayout, party_id: usize) -> Self {
        Self {
            party_id,
            key_path: layout.private_key_path(party_id),
            cert_path: layout.certificate_path(party_id),
        }
    }
}

/// Issues a private key and a certificate for a party.
#[async_trait]
pub trait CertIssuer: Send + Sync {
    async fn issue(&self, request: &CertRequest) -> Result<()>;
}

/// Self-signed RSA certificates via the `openssl` command.
#[derive(Debug, Clone)]
pub struct OpensslCertIssuer {
    openssl: PathBuf,
    config: PathBuf,
    days: u32,
}

impl OpensslCertIssuer {
    pub fn new(config: impl Into<PathBuf>) -> Self {
        Self {
            openssl: PathBuf::from("openssl"),
            config: config.into(),
            days: 365,
        }
    }

    pub fn args(&self, request: &CertRequest) -> Vec<String> {
        vec![
            "req".to_string(),
            "-newkey".to_string(),
            "rsa:2048".to_string(),
            "-nodes".to_string(),
            "-keyout".to_string(),
            request.key_path.display().to_string(),
            "-x509".to_string(),
            "-days".to_string(),
            self.days.to_string(),
            "-out".to_string(),
            request.cert_path.display().to_string(),
            "-subj".to_string(),
            "/".to_string(),
            "-config".to_string(),
            self.config.display().to_string(),
            "-extensions".to_string(),
            "v3_req".to_string(),
        ]
    }
}

#[async_trait]
impl CertIssuer for OpensslCertIssuer {
    async fn issue(&self, request: &CertRequest) -> Result<()> {
        let output = Command::new(&self.openssl)
            .args(self.args(request))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| LaunchError::Tool {
                tool: self.openssl.display().to_string(),
                source,
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(LaunchError::Provision {
                party_id: request.party_id,
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

/// Shape of a freshly provisioned cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionOptions {
    pub parties: usize,
    pub address: String,
    pub base_port: u16,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            parties: 3,
            address: "127.0.0.1".to_string(),
            base_port: 5000,
        }
    }
}

/// Create a new test environment under `layout`.
///
/// Refuses to touch an existing directory. Writes `common/config.json` last,
/// after every party has its credentials.
pub async fn prepare_test_env(
    layout: &EnvLayout,
    options: &ProvisionOptions,
    issuer: &dyn CertIssuer,
) -> Result<ClusterConfig> {
    if layout.root().exists() {
        return Err(LaunchError::TargetExists(layout.root().to_path_buf()));
    }
    let config = ClusterConfig::local(&options.address, options.base_port, options.parties)?;

    std::fs::create_dir_all(layout.common_dir())?;
    for party_id in 0..config.len() {
        std::fs::create_dir(layout.node_dir(party_id))?;
        issuer.issue(&CertRequest::for_party(layout, party_id)).await?;
    }
    config.save(layout.config_path())?;

    info!(
        dir = %layout.root().display(),
        parties = config.len(),
        "Prepared test environment"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::fakes::FakeCertIssuer;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_prepare_creates_layout_and_config() {
        let dir = tempdir().unwrap();
        let layout = EnvLayout::new(dir.path().join("test-env"));
        let issuer = FakeCertIssuer::new();

        let config = prepare_test_env(&layout, &ProvisionOptions::default(), &issuer)
            .await
            .unwrap();

        assert_eq!(config.len(), 3);
        assert_eq!(config.party(0).unwrap().address, "127.0.0.1:5000");
        assert_eq!(config.party(2).unwrap().address, "127.0.0.1:5002");
        for party_id in 0..3 {
            assert!(layout.private_key_path(party_id).exists());
            assert!(layout.certificate_path(party_id).exists());
        }
        assert_eq!(issuer.issued(), vec![0, 1, 2]);

        let loaded = ClusterConfig::load(layout.config_path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_prepare_refuses_existing_dir() {
        let dir = tempdir().unwrap();
        let layout = EnvLayout::new(dir.path());
        let issuer = FakeCertIssuer::new();

        let err = prepare_test_env(&layout, &ProvisionOptions::default(), &issuer)
            .await
            .unwrap_err();

        assert!(matches!(err, LaunchError::TargetExists(_)));
        assert!(issuer.issued().is_empty());
    }

    #[tokio::test]
    async fn test_prepare_zero_parties_is_config_error() {
        let dir = tempdir().unwrap();
        let layout = EnvLayout::new(dir.path().join("env"));
        let options = ProvisionOptions {
            parties: 0,
            ..ProvisionOptions::default()
        };

        let err = prepare_test_env(&layout, &options, &FakeCertIssuer::new())
            .await
            .unwrap_err();

        assert!(matches!(err, LaunchError::Config(ConfigError::NoParties { .. })));
        assert!(!layout.root().exists());
    }

    #[tokio::test]
    async fn test_prepare_stops_on_issue_failure() {
        let dir = tempdir().unwrap();
        let layout = EnvLayout::new(dir.path().join("env"));
        let issuer = FakeCertIssuer::failing_at(1);

        let err = prepare_test_env(&layout, &ProvisionOptions::default(), &issuer)
            .await
            .unwrap_err();

        assert!(matches!(err, LaunchError::Provision { party_id: 1, .. }));
        assert!(!layout.config_path().exists());
    }

    #[test]
    fn test_openssl_args() {
        let layout = EnvLayout::new("env");
        let args = OpensslCertIssuer::new("openssl.cnf").args(&CertRequest::for_party(&layout, 0));
        assert_eq!(args[0], "req");
        let keyout = args.iter().position(|a| a == "-keyout").unwrap();
        assert_eq!(args[keyout + 1], "env/node0/private.key");
        let out = args.iter().position(|a| a == "-out").unwrap();
        assert_eq!(args[out + 1], "env/common/node0.pem");
        assert!(args.ends_with(&[
            "-config".to_string(),
            "openssl.cnf".to_string(),
            "-extensions".to_string(),
            "v3_req".to_string()
        ]));
    }
}
