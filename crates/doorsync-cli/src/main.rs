//! `doorsync`: synchronize a personnel directory into an access control
//! terminal.

use anyhow::Context;
use clap::{Parser, Subcommand};
use doorsync_cli::{Config, logging};
use doorsync_device::IsapiClient;
use doorsync_engine::{HttpPhotoFetcher, JsonReporter, Reporter, RunError, SyncRun, TracingReporter};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

/// Exit code when the terminal refused every request for authentication.
const EXIT_AUTH: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "doorsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, env = "DOORSYNC_CONFIG", default_value = "doorsync.toml")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply the directory to the terminal
    Run {
        /// Skip face synchronization
        #[arg(long)]
        no_faces: bool,

        /// Write a JSON report to this path (overrides [run] report_path)
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Show what a run would change without touching the terminal
    Plan {
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            let auth = e.downcast_ref::<RunError>().is_some_and(RunError::is_auth);
            if auth { ExitCode::from(EXIT_AUTH) } else { ExitCode::FAILURE }
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = Config::load(&cli.config)?;

    let source = config.directory_source()?;
    let device = IsapiClient::new(config.device_config()?).context("Failed to create device client")?;
    let fetcher = HttpPhotoFetcher::new(config.fetch_config()).context("Failed to create photo fetcher")?;

    match cli.command {
        Commands::Run { no_faces, report } => {
            let mut options = config.run_options();
            if no_faces {
                options.faces = false;
            }

            let summary = SyncRun::new(&source, &device, &fetcher, options).execute().await?;

            TracingReporter.report(&summary)?;
            if let Some(path) = report.or_else(|| config.run.report_path.clone()) {
                JsonReporter::new(path)
                    .report(&summary)
                    .context("Failed to write run report")?;
            }

            if summary.systemic_auth_failure() {
                return Ok(ExitCode::from(EXIT_AUTH));
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Plan { json } => {
            let preview = SyncRun::new(&source, &device, &fetcher, config.run_options())
                .preview()
                .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&preview)?);
            } else {
                print_plan(&preview);
            }
            info!(actions = preview.plan.action_count(), "Plan computed");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_plan(preview: &doorsync_engine::PlanPreview) {
    let plan = &preview.plan;
    println!(
        "{}: {} directory users, {} terminal users",
        preview.source, preview.source_count, preview.device_count
    );

    if plan.is_empty() {
        println!("Terminal is up to date");
    }
    for user in &plan.to_create {
        println!("  + {} {}", user.employee_no, user.name);
    }
    for user in &plan.to_update {
        let state = if user.enabled { "enabled" } else { "disabled" };
        println!("  ~ {} {} ({state})", user.employee_no, user.name);
    }
    for employee_no in &plan.to_delete {
        println!("  - {employee_no}");
    }

    for entry in &preview.directory_skipped {
        println!("  ! directory entry {}: {}", entry.position, entry.reason);
    }
    for skipped in &plan.skipped {
        println!("  ! {} record {}: {}", skipped.side, skipped.position, skipped.reason);
    }
}
