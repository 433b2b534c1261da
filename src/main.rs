mod catalog;
mod cli;
mod config;
mod engine;
mod error;
mod orchestrator;
mod pacing;
mod postprocess;
mod progress;
mod sheet;
mod state_machine;
mod ui;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use catalog::{AssetStore, WorkCatalog};
use cli::{Cli, Command};
use config::ForgeConfig;
use engine::{EngineClient, wait_until_ready};
use error::ForgeError;
use orchestrator::BatchOrchestrator;
use pacing::{PacingPlan, VramProbe};
use postprocess::PostProcessor;
use sheet::SheetBuilder;
use state_machine::{ItemRun, StateMachine};
use ui::BatchProgress;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = ForgeConfig::load().context("failed to load pixelforge.toml")?;
    if let Some(url) = cli.url {
        config.engine_url = url;
    }

    match cli.command {
        Command::Run {
            prompts,
            output,
            raw,
            sheet,
        } => {
            apply_paths(&mut config, prompts, output);
            if raw {
                config.process_assets = false;
            }
            if sheet {
                config.build_sheet = true;
            }
            run(&config, cli.verbose).await
        }
        Command::Status { prompts, output } => {
            apply_paths(&mut config, prompts, output);
            status(&config)
        }
        Command::Sheet { output } => {
            apply_paths(&mut config, None, output);
            build_sheet(&config, &BatchProgress::new())
        }
    }
}

/// Logs go to stderr so they never interleave with the progress line.
fn init_tracing(verbose: bool) {
    let default = if verbose { "pixelforge=debug" } else { "pixelforge=warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

fn apply_paths(config: &mut ForgeConfig, prompts: Option<PathBuf>, output: Option<PathBuf>) {
    if let Some(path) = prompts {
        config.prompts_file = path;
    }
    if let Some(dir) = output {
        config.output_dir = dir;
    }
}

fn pacing_plan(config: &ForgeConfig) -> PacingPlan {
    let vram_mb = config.vram_mb.or_else(VramProbe::total_mb);
    let plan = PacingPlan::assess(vram_mb);
    tracing::info!(?vram_mb, constrained = plan.constrained, "Pacing plan selected");
    plan
}

async fn run(config: &ForgeConfig, verbose: bool) -> Result<()> {
    let plan = pacing_plan(config);
    let store = AssetStore::new(&config.output_dir);
    let items = load_catalog(&config.prompts_file, &plan)?;
    let partition = WorkCatalog::partition(items, &store);

    let ui = BatchProgress::new();
    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let client = EngineClient::with_base_url(config.engine_url.clone())
        .context("failed to build HTTP client")?;
    if !partition.pending.is_empty() {
        let url = client.base_url().to_string();
        let ready = wait_until_ready(&client, config.health_interval(), &cancel, |attempt| {
            ui.waiting_for_engine(&url, attempt)
        })
        .await;
        if !ready {
            return Err(ForgeError::ConnectionUnavailable(format!(
                "interrupted while waiting for {url}"
            ))
            .into());
        }
        ui.engine_ready(&url);
    }

    let processor = config
        .process_assets
        .then(|| PostProcessor::with_palette_size(config.palette_size));
    let orchestrator = BatchOrchestrator::new(client, plan, store, config.generation.clone())
        .with_poll_interval(config.poll_interval())
        .with_error_penalty(config.error_penalty())
        .with_processor(processor);

    let summary = orchestrator.run(partition, &cancel, &ui).await;
    ui.print_summary(&summary);
    if verbose {
        ui.print_record(&summary);
    }

    if config.build_sheet && !summary.drained {
        build_sheet(config, &ui)?;
    }
    Ok(())
}

fn status(config: &ForgeConfig) -> Result<()> {
    let plan = pacing_plan(config);
    let store = AssetStore::new(&config.output_dir);
    let runs: Vec<ItemRun> = load_catalog(&config.prompts_file, &plan)?
        .iter()
        .map(|item| {
            let mut run = ItemRun::new(item);
            if store.is_complete(&item.content_key) {
                StateMachine::skip(&mut run);
            }
            run
        })
        .collect();
    BatchProgress::new().print_status(&runs);
    Ok(())
}

fn build_sheet(config: &ForgeConfig, ui: &BatchProgress) -> Result<()> {
    let builder = SheetBuilder::new(&config.output_dir, &config.sheet_dir);
    let manifest = builder.build().context("failed to build sprite sheet")?;
    ui.sheet_written(manifest.as_ref(), &builder.sheet_path());
    Ok(())
}

fn load_catalog(path: &Path, plan: &PacingPlan) -> Result<Vec<catalog::WorkItem>> {
    WorkCatalog::load(path, plan).context("cannot start a session without a prompts file")
}

/// First Ctrl-C drains the batch; a second one exits immediately.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::warn!("Interrupt received, finishing the current item");
        cancel.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Second interrupt, exiting now");
            std::process::exit(130);
        }
    });
}
