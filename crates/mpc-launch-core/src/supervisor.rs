//! Spawning and supervising worker processes.

use crate::error::{LaunchError, Result};
use crate::launch_spec::LaunchSpec;
use crate::multiplex::{ReaderSummary, StreamMultiplexer};
use crate::worker::Worker;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A running worker and the readers draining its pipes.
#[derive(Debug)]
pub struct ChildProcess {
    party_id: usize,
    child: Child,
    readers: Vec<JoinHandle<ReaderSummary>>,
}

impl ChildProcess {
    pub fn party_id(&self) -> usize {
        self.party_id
    }

    /// OS process id, if the process has not been reaped yet.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the worker to exit and its output to be fully drained.
    pub async fn wait(mut self) -> PartyExit {
        let status = self.child.wait().await;
        let mut lines = 0;
        for reader in futures::future::join_all(self.readers).await {
            match reader {
                Ok(summary) => lines += summary.lines,
                Err(e) => warn!(party_id = self.party_id, error = %e, "Output reader panicked"),
            }
        }

        let exit_code = match status {
            Ok(status) => Some(exit_code(status)),
            Err(e) => {
                error!(party_id = self.party_id, error = %e, "Failed to wait for worker");
                None
            }
        };

        PartyExit {
            party_id: self.party_id,
            exit_code,
            lines,
        }
    }
}

/// How a worker ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartyExit {
    pub party_id: usize,
    /// `None` if the exit status could not be collected.
    pub exit_code: Option<i32>,
    /// Lines forwarded from both streams.
    pub lines: u64,
}

impl PartyExit {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// A party whose worker could not be started.
#[derive(Debug)]
pub struct SpawnFailure {
    pub party_id: usize,
    pub error: LaunchError,
}

/// Workers started by a fire-and-forget launch.
#[derive(Debug, Default)]
pub struct Cluster {
    children: Vec<ChildProcess>,
    failures: Vec<SpawnFailure>,
}

impl Cluster {
    pub fn children(&self) -> &[ChildProcess] {
        &self.children
    }

    pub fn failures(&self) -> &[SpawnFailure] {
        &self.failures
    }

    pub fn spawned_count(&self) -> usize {
        self.children.len()
    }

    /// Wait for every worker to exit and drain, in party order.
    pub async fn wait(self) -> Vec<PartyExit> {
        futures::future::join_all(self.children.into_iter().map(ChildProcess::wait)).await
    }
}

/// Starts one worker process per [`LaunchSpec`].
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    program: PathBuf,
    program_args: Vec<OsString>,
    multiplexer: StreamMultiplexer,
}

impl ProcessSupervisor {
    pub fn new(program: impl Into<PathBuf>, multiplexer: StreamMultiplexer) -> Self {
        Self {
            program: program.into(),
            program_args: Vec::new(),
            multiplexer,
        }
    }

    /// Supervisor running `worker`'s program.
    pub fn for_worker(worker: &Worker, multiplexer: StreamMultiplexer) -> Self {
        Self::new(worker.program(), multiplexer).with_program_args(worker.program_args().to_vec())
    }

    /// Arguments placed before each worker's launch arguments, for running
    /// workers through a wrapper such as an interpreter or a profiler.
    pub fn with_program_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.program_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, spec: &LaunchSpec) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.program_args)
            .args(spec.to_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    /// Spawn one worker with its output attached to the multiplexer.
    pub fn spawn(&self, spec: &LaunchSpec) -> Result<ChildProcess> {
        let party_id = spec.party_id();
        let mut child = self
            .command(spec)
            .spawn()
            .map_err(|source| LaunchError::Spawn { party_id, source })?;
        let readers = self.multiplexer.attach(party_id, &mut child);

        debug!(party_id, pid = ?child.id(), program = %self.program.display(), "Spawned worker");
        Ok(ChildProcess {
            party_id,
            child,
            readers,
        })
    }

    /// Spawn every worker without waiting for any of them.
    ///
    /// A failed spawn is recorded and the remaining parties are still tried.
    pub fn launch_all(&self, specs: &[LaunchSpec]) -> Cluster {
        let mut cluster = Cluster::default();
        for spec in specs {
            match self.spawn(spec) {
                Ok(child) => cluster.children.push(child),
                Err(e) => {
                    error!(party_id = spec.party_id(), error = %e, "Worker did not start");
                    cluster.failures.push(SpawnFailure {
                        party_id: spec.party_id(),
                        error: e,
                    });
                }
            }
        }

        info!(
            spawned = cluster.spawned_count(),
            failed = cluster.failures.len(),
            "Launched workers"
        );
        cluster
    }

    /// Run a single worker to completion and return its exit code.
    pub async fn run_single(&self, spec: &LaunchSpec) -> Result<i32> {
        let child = self.spawn(spec)?;
        let exit = child.wait().await;
        info!(party_id = exit.party_id, exit_code = ?exit.exit_code, "Worker exited");
        exit.exit_code.ok_or_else(|| LaunchError::Tool {
            tool: self.program.display().to_string(),
            source: std::io::Error::new(
                std::io::ErrorKind::Other,
                "exit status of worker could not be collected",
            ),
        })
    }
}

/// Process exit code; on Unix a signal death maps to `128 + signal`.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
