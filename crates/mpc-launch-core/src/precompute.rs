//! Offline precomputation: runs the dealer to write every party's
//! `precomp.bin`.

use crate::error::{LaunchError, Result};
use crate::layout::EnvLayout;
use crate::supervisor::exit_code;
use crate::worker::Worker;
use std::ffi::OsString;
use std::process::Stdio;
use tokio::process::Command;
use tracing::info;

/// Parameters for one dealer run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DealerRequest {
    pub parties: usize,
    pub beaver_triples: u64,
    pub random_bits: u64,
    pub input_masks: u64,
    /// Target field (`61` or `127`); the dealer's default when unset.
    pub field: Option<String>,
}

impl DealerRequest {
    pub fn new(parties: usize) -> Self {
        Self {
            parties,
            beaver_triples: 1_000_000,
            random_bits: 1_000_000,
            input_masks: 100,
            field: None,
        }
    }

    /// Dealer arguments writing into `layout`.
    pub fn to_args(&self, layout: &EnvLayout) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--parties".into(),
            self.parties.to_string().into(),
            "--output".into(),
            layout.precomp_pattern().into(),
            "--beaver-triples".into(),
            self.beaver_triples.to_string().into(),
            "--random-bits".into(),
            self.random_bits.to_string().into(),
            "--input-masks".into(),
            self.input_masks.to_string().into(),
        ];
        if let Some(field) = &self.field {
            args.push("--field".into());
            args.push(field.into());
        }
        args
    }
}

/// Run the dealer to completion and return its exit code.
pub async fn run_dealer(
    dealer: &Worker,
    request: &DealerRequest,
    layout: &EnvLayout,
) -> Result<i32> {
    info!(
        parties = request.parties,
        beaver_triples = request.beaver_triples,
        random_bits = request.random_bits,
        input_masks = request.input_masks,
        "Generating precomputed data"
    );

    let status = Command::new(dealer.program())
        .args(dealer.program_args())
        .args(request.to_args(layout))
        .stdin(Stdio::null())
        .status()
        .await
        .map_err(|source| LaunchError::Tool {
            tool: dealer.program().display().to_string(),
            source,
        })?;

    Ok(exit_code(status))
}
