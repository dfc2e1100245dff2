/// # docsync CLI
///
/// Command parsing and wiring only: the concrete clients ([`DriveClient`],
/// [`LlmTransformer`], [`GitCli`], the forge selected by `forge.kind`) are
/// constructed here from the loaded configuration and handed to the core.
///
/// - `sync`: full run, prints a summary of the report.
/// - `status`: read-only, prints each unit's staleness decision.
///
/// For programmatic and integration use, call [`run`] with a constructed [`Cli`].
use crate::drive::DriveClient;
use crate::load_config::{load_config, CliConfig};
use crate::transformer::LlmTransformer;
use anyhow::Result;
use clap::{Parser, Subcommand};
use docsync_core::forge::forge_for;
use docsync_core::git::GitCli;
use docsync_core::publish::PublishOutcome;
use docsync_core::synchronise::{plan, synchronise, RunMode, SynchroniseReport, UnitPlan};
use std::path::PathBuf;

/// CLI for docsync: regenerate stale documents and propose them for review.
#[derive(Parser)]
#[clap(
    name = "docsync",
    version,
    about = "Keep a generated documentation tree in sync with a remote content source"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Regenerate stale units and open one merge proposal for the changes
    Sync {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// Show which units would be regenerated, without changing anything
    Status {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync { config } => {
            let config = load_config(config)?;
            tracing::info!(command = "sync", "Starting synchronisation process");
            let report = run_sync(&config).await?;
            print!("{}", render_report(&report));
            Ok(())
        }
        Commands::Status { config } => {
            let config = load_config(config)?;
            tracing::info!(command = "status", "Computing unit decisions");
            let source = DriveClient::new(config.source.api_url.as_deref(), &config.source.token);
            let plans = plan(&config.sync, &source).await.map_err(|e| {
                tracing::error!(command = "status", error = %e, "Status failed");
                anyhow::Error::new(e)
            })?;
            print!("{}", render_plans(&plans));
            Ok(())
        }
    }
}

async fn run_sync(config: &CliConfig) -> Result<SynchroniseReport> {
    let source = DriveClient::new(config.source.api_url.as_deref(), &config.source.token);
    let transformer = LlmTransformer::new(
        &config.transform.api_url,
        &config.transform.model,
        &config.transform.api_key,
    );
    let repo = GitCli::new(&config.git.repo_dir, config.git.remote.clone()).with_author(
        config.git.author_name.clone(),
        config.git.author_email.clone(),
    );
    let forge = forge_for(
        config.forge.kind,
        config.forge.api_url.as_deref(),
        &config.forge.project,
        &config.forge.token,
    )?;

    match synchronise(&config.sync, &source, &transformer, &repo, forge.as_ref()).await {
        Ok(report) => {
            tracing::info!(command = "sync", ?report, "Synchronisation complete");
            Ok(report)
        }
        Err(e) => {
            tracing::error!(command = "sync", error = %e, "Synchronisation failed");
            Err(anyhow::Error::new(e))
        }
    }
}

/// Human-readable summary printed after `sync`.
pub fn render_report(report: &SynchroniseReport) -> String {
    let mut out = String::new();
    if report.mode == RunMode::Resume {
        out.push_str("Resumed publication of pending changes\n");
    }
    for unit in report.units.changes.units() {
        out.push_str(&format!("updated  {unit}\n"));
    }
    for unit in &report.units.skipped {
        out.push_str(&format!("skipped  {unit}\n"));
    }
    for failure in &report.units.failed {
        out.push_str(&format!(
            "failed   {} ({}): {}\n",
            failure.unit, failure.stage, failure.message
        ));
    }
    match &report.publish {
        None => out.push_str("Nothing to publish\n"),
        Some(PublishOutcome::NothingToCommit { base_ref }) => {
            out.push_str(&format!("No changes to commit, staying on {base_ref}\n"))
        }
        Some(PublishOutcome::Proposed { branch, url, .. }) => {
            out.push_str(&format!("Pushed {branch}, merge proposal: {url}\n"))
        }
    }
    out
}

/// One line per unit, as printed by `status`.
pub fn render_plans(plans: &[UnitPlan]) -> String {
    plans
        .iter()
        .map(|p| match &p.decision {
            Ok(decision) => format!("{:<18} {}\n", decision.label(), p.unit.name),
            Err(e) => format!("{:<18} {} ({})\n", "error", p.unit.name, e),
        })
        .collect()
}
