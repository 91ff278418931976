use std::{future::Future, io, sync::Arc};

use anyhow::{anyhow, bail};
use clap::{Parser, Subcommand};
use engine::{
    prerequisites, telemetry, viewer::open_in_browser, Config, ExternalToolchain, Orchestrator,
    PipelineError, PipelineStatus, StatusRecord, TriggerLoop, DEFAULT_PROMPT,
};
use tokio::signal::ctrl_c;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "label-pipeline",
    version,
    about = "Generate a label image, bake it into the 3D model and serve the viewer",
    subcommand_required = true,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run generate, export and publish once
    Run(RunArgs),
    /// Report missing prerequisites
    Check,
    /// Re-export the model whenever the label image changes
    Watch,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Label design prompt; a stock golf label prompt when omitted
    #[arg(long)]
    prompt: Option<String>,

    /// Do not open the viewer in a browser when the run completes; the server keeps running
    #[arg(long)]
    no_open: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    telemetry::init("cli", config.loki_url.as_deref())?;

    match cli.command {
        Commands::Run(args) => run(&config, args).await,
        Commands::Check => check(&config),
        Commands::Watch => watch(&config).await,
    }
}

async fn run(config: &Config, args: RunArgs) -> anyhow::Result<()> {
    let report = prerequisites::check(config);

    if !prerequisites::log_report(&report) {
        return Err(PipelineError::PrerequisiteMissing(report.issues).into());
    }

    let orchestrator = Orchestrator::new(
        Arc::new(StatusRecord::new()),
        Arc::new(ExternalToolchain::from_config(config)),
    );

    let prompt = args.prompt.as_deref().unwrap_or(DEFAULT_PROMPT);
    let handle = orchestrator.start(prompt)?;
    let mut updates = orchestrator.status().subscribe();

    let mut last_step = None;
    while let Some(status) = updates.recv().await {
        if status.current_step != last_step {
            print_status(&status);
            last_step.clone_from(&status.current_step);
        }

        if status.is_terminal() {
            break;
        }
    }

    let status = handle.await?;

    if let Some(error) = status.error {
        return Err(anyhow!(error));
    }

    let url = status
        .viewer_url
        .ok_or_else(|| anyhow!("run finished without a viewer URL"))?;
    println!("Viewer: {url}");

    if !args.no_open {
        let opened = open_in_browser(&url).await;

        if !opened.ok {
            warn!("Could not open browser: {}", opened.diagnostic());
        }
    }

    serve_viewer(orchestrator, ctrl_c()).await
}

/// Holds the orchestrator, and with it the viewer server process, until `stop` resolves.
async fn serve_viewer<F>(orchestrator: Orchestrator, stop: F) -> anyhow::Result<()>
where
    F: Future<Output = io::Result<()>>,
{
    println!("Viewer server running, press Ctrl+C to stop");
    stop.await?;

    drop(orchestrator);
    info!("Viewer server stopped");

    Ok(())
}

fn print_status(status: &PipelineStatus) {
    if let Some(step) = &status.current_step {
        println!("[{:>3}%] {step}", status.progress);
    }
}

fn check(config: &Config) -> anyhow::Result<()> {
    let report = prerequisites::check(config);

    if report.ready {
        println!("All prerequisites found");
        return Ok(());
    }

    for issue in &report.issues {
        println!("- {issue}");
    }

    bail!("{} prerequisite(s) missing", report.issues.len())
}

async fn watch(config: &Config) -> anyhow::Result<()> {
    let toolchain = Arc::new(ExternalToolchain::from_config(config));
    let watcher = TriggerLoop::new(&config.watch.path, config.watch.interval, toolchain).spawn();

    ctrl_c().await?;
    watcher.abort();
    info!("Stopped watching");

    Ok(())
}
