//! mpc-launch - local cluster launcher for multi-party protocol workers
//!
//! ## Commands
//!
//! - `prepare`: Create a test environment with certificates and a cluster file
//! - `precompute`: Generate precomputed data for every party with the dealer
//! - `run-all`: Start one matcher per party and merge their output
//! - `run-local`: Start one test app per party and merge their output
//! - `run-party`: Run a single matcher in the foreground

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mpc_launch_core::{
    parse_preferences, prepare_test_env, BuildTool, CargoBuild, CertIssuer, DealerRequest,
    EnvLayout, Launcher, LauncherSettings, OpensslCertIssuer, OutputSink, PreferencePolicy,
    ProvisionOptions, Worker,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "mpc-launch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Launch local multi-party protocol test clusters", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Test environment directory
    #[arg(long, global = true, env = "MPC_LAUNCH_DIR")]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new test environment
    Prepare {
        /// Number of parties
        #[arg(long, default_value_t = 3)]
        parties: usize,

        /// Address every party listens on
        #[arg(long, default_value = "127.0.0.1")]
        address: String,

        /// Port of party 0; party i listens on base_port + i
        #[arg(long, default_value_t = 5000)]
        base_port: u16,
    },

    /// Generate precomputed data for every party
    Precompute {
        #[arg(long, default_value_t = 1_000_000)]
        beaver_triples: u64,

        #[arg(long, default_value_t = 1_000_000)]
        random_bits: u64,

        #[arg(long, default_value_t = 100)]
        input_masks: u64,

        /// Target field (61 or 127)
        #[arg(long)]
        field: Option<String>,

        /// Use the already-built dealer
        #[arg(long)]
        no_build: bool,
    },

    /// Start a matcher for every party
    RunAll {
        /// Comma-separated preferences passed to every party instead of the
        /// derived per-party ones
        #[arg(long)]
        preferences: Option<String>,

        /// Use the already-built matcher
        #[arg(long)]
        no_build: bool,
    },

    /// Start the test app for every party
    RunLocal {
        /// Use the already-built test app
        #[arg(long)]
        no_build: bool,
    },

    /// Run one matcher in the foreground and exit with its status
    RunParty {
        /// Party id, 0-based
        #[arg(long)]
        id: usize,

        /// Comma-separated preferences
        #[arg(long)]
        preferences: String,

        /// Use the already-built matcher
        #[arg(long)]
        no_build: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    mpc_launch_core::init_tracing(cli.json, level);

    let mut settings = LauncherSettings::from_env();
    if let Some(dir) = cli.dir {
        settings = settings.with_env_dir(dir);
    }
    let layout = EnvLayout::new(settings.env_dir.clone());
    let cargo = CargoBuild::from_settings(&settings);

    let code = match cli.command {
        Commands::Prepare {
            parties,
            address,
            base_port,
        } => {
            let options = ProvisionOptions {
                parties,
                address,
                base_port,
            };
            let issuer = OpensslCertIssuer::new(settings.openssl_config.clone());
            cmd_prepare(&layout, &options, &issuer).await?
        }
        Commands::Precompute {
            beaver_triples,
            random_bits,
            input_masks,
            field,
            no_build,
        } => {
            let request = DealerRequest {
                beaver_triples,
                random_bits,
                input_masks,
                field,
                ..DealerRequest::new(0)
            };
            let launcher = launcher(layout, &cargo, no_build);
            cmd_precompute(&launcher, &Worker::dealer(&settings), &request).await?
        }
        Commands::RunAll {
            preferences,
            no_build,
        } => {
            let mut worker = Worker::matcher(&settings);
            if let Some(raw) = preferences {
                worker = worker.with_preferences(fixed_preferences(&raw)?);
            }
            cmd_run_all(&launcher(layout, &cargo, no_build), &worker).await?
        }
        Commands::RunLocal { no_build } => {
            cmd_run_all(
                &launcher(layout, &cargo, no_build),
                &Worker::test_app(&settings),
            )
            .await?
        }
        Commands::RunParty {
            id,
            preferences,
            no_build,
        } => {
            let worker =
                Worker::matcher(&settings).with_preferences(fixed_preferences(&preferences)?);
            cmd_run_party(&launcher(layout, &cargo, no_build), &worker, id).await?
        }
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

fn launcher(layout: EnvLayout, build_tool: &dyn BuildTool, no_build: bool) -> Launcher<'_> {
    Launcher::new(layout, build_tool, Arc::new(OutputSink::stdout())).skip_build(no_build)
}

fn fixed_preferences(raw: &str) -> Result<PreferencePolicy> {
    let values =
        parse_preferences(raw).with_context(|| format!("Invalid preferences list: {raw:?}"))?;
    Ok(PreferencePolicy::Fixed(values))
}

/// Create the test environment and print where it landed
async fn cmd_prepare(
    layout: &EnvLayout,
    options: &ProvisionOptions,
    issuer: &dyn CertIssuer,
) -> Result<i32> {
    let config = prepare_test_env(layout, options, issuer)
        .await
        .context(format!(
            "Failed to prepare test environment at {:?}",
            layout.root()
        ))?;

    println!("Prepared test environment at {:?}", layout.root());
    for (party_id, party) in config.parties().iter().enumerate() {
        println!("  party {party_id}: {}", party.address);
    }
    Ok(0)
}

/// Run the dealer and return its exit code
async fn cmd_precompute(
    launcher: &Launcher<'_>,
    dealer: &Worker,
    request: &DealerRequest,
) -> Result<i32> {
    let code = launcher
        .precompute(dealer, request)
        .await
        .context("Failed to generate precomputed data")?;
    if code != 0 {
        warn!(exit_code = code, "Dealer failed");
    }
    Ok(code)
}

/// Launch every party, then stay attached until all of them exit.
///
/// Worker exit codes are reported but never change the launcher's status.
async fn cmd_run_all(launcher: &Launcher<'_>, worker: &Worker) -> Result<i32> {
    let cluster = launcher
        .launch_all(worker)
        .await
        .context(format!("Failed to launch {}", worker.package()))?;

    for failure in cluster.failures() {
        warn!(
            party_id = failure.party_id,
            error = %failure.error,
            "Party did not start"
        );
    }
    for child in cluster.children() {
        info!(party_id = child.party_id(), pid = ?child.pid(), "Party started");
    }
    info!(
        spawned = cluster.spawned_count(),
        failed = cluster.failures().len(),
        "Cluster launched"
    );

    for exit in cluster.wait().await {
        match exit.exit_code {
            Some(code) => info!(party_id = exit.party_id, exit_code = code, "Party exited"),
            None => warn!(party_id = exit.party_id, "Party exit status unavailable"),
        }
    }
    Ok(0)
}

/// Run one party in the foreground and return its exit code
async fn cmd_run_party(launcher: &Launcher<'_>, worker: &Worker, party_id: usize) -> Result<i32> {
    launcher
        .run_party(worker, party_id)
        .await
        .context(format!("Failed to run party {party_id}"))
}
