//! End-to-end launch flow.
//!
//! cluster config -> launch specs -> build gate -> spawn -> multiplex.
//! Config and build failures abort before any worker is spawned.

use crate::build::{BuildGate, BuildTool};
use crate::cluster::ClusterConfig;
use crate::error::Result;
use crate::launch_spec::{LaunchSpec, LaunchSpecBuilder};
use crate::layout::EnvLayout;
use crate::multiplex::StreamMultiplexer;
use crate::precompute::{run_dealer, DealerRequest};
use crate::sink::{LineFormat, OutputSink};
use crate::supervisor::{Cluster, ProcessSupervisor};
use crate::worker::Worker;
use std::sync::Arc;
use tracing::info;

/// Drives a launch against one test environment.
pub struct Launcher<'a> {
    layout: EnvLayout,
    build_tool: &'a dyn BuildTool,
    sink: Arc<OutputSink>,
    skip_build: bool,
}

impl<'a> Launcher<'a> {
    pub fn new(layout: EnvLayout, build_tool: &'a dyn BuildTool, sink: Arc<OutputSink>) -> Self {
        Self {
            layout,
            build_tool,
            sink,
            skip_build: false,
        }
    }

    /// Use already-built binaries instead of running the build gate.
    pub fn skip_build(mut self, skip: bool) -> Self {
        self.skip_build = skip;
        self
    }

    /// Load the cluster file of this environment.
    pub fn cluster_config(&self) -> Result<ClusterConfig> {
        Ok(ClusterConfig::load(self.layout.config_path())?)
    }

    async fn build(&self, package: &str) -> Result<()> {
        if self.skip_build {
            info!(package, "Skipping build");
            return Ok(());
        }
        BuildGate::new(self.build_tool).pass(package).await
    }

    fn supervisor(&self, worker: &Worker, config: &ClusterConfig) -> ProcessSupervisor {
        let multiplexer =
            StreamMultiplexer::new(Arc::clone(&self.sink), LineFormat::for_parties(config.len()));
        ProcessSupervisor::for_worker(worker, multiplexer)
    }

    /// Start one worker per party and return without waiting for them.
    pub async fn launch_all(&self, worker: &Worker) -> Result<Cluster> {
        let config = self.cluster_config()?;
        let specs: Vec<LaunchSpec> = LaunchSpecBuilder::new(&self.layout, &config)
            .with_preferences(worker.preferences().clone())
            .build_all()?;

        self.build(worker.package()).await?;

        info!(
            package = worker.package(),
            parties = specs.len(),
            "Launching all parties"
        );
        Ok(self.supervisor(worker, &config).launch_all(&specs))
    }

    /// Run a single party in the foreground and return its exit code.
    pub async fn run_party(&self, worker: &Worker, party_id: usize) -> Result<i32> {
        let config = self.cluster_config()?;
        let spec = LaunchSpecBuilder::new(&self.layout, &config)
            .with_preferences(worker.preferences().clone())
            .build(party_id)?;

        self.build(worker.package()).await?;

        info!(package = worker.package(), party_id, "Running party");
        self.supervisor(worker, &config).run_single(&spec).await
    }

    /// Build the dealer and generate precomputed data for every party.
    ///
    /// `request.parties` is replaced with the cluster's party count.
    pub async fn precompute(&self, dealer: &Worker, request: &DealerRequest) -> Result<i32> {
        let config = self.cluster_config()?;
        let request = DealerRequest {
            parties: config.len(),
            ..request.clone()
        };

        self.build(dealer.package()).await?;
        run_dealer(dealer, &request, &self.layout).await
    }
}
