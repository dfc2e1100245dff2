//! High-level pipeline: decides, regenerates and publishes every unit of a run.
//!
//! This module provides the top-level orchestration logic for "synchronising" the
//! generated documentation tree with the remote content source. A run:
//!   - Validates the configuration before touching anything
//!   - Checks whether a previous run left unpublished changes (resume mode)
//!   - Otherwise loads the reference context, lists every unit and, for each one,
//!     asks the diff engine whether it is stale and regenerates it if so
//!   - Publishes all regenerated documents as one branch/commit/merge proposal
//!
//! # Major Types
//! - [`SynchroniseReport`]: what changed, what was skipped, what failed, and the proposal
//! - [`RunMode`]: normal run or resumption of pending changes
//!
//! # Error Handling
//! Per-unit failures are logged and recorded in the report; they never stop the
//! loop and never change the outcome of the run. A unit whose name maps to an
//! output path already claimed by an earlier unit in the listing is recorded as
//! failed and left alone. Configuration, listing and
//! version-control failures are fatal: the working tree is returned to the branch
//! the run started on and the error is returned.
//!
//! # Navigation
//! - Main entrypoint: [`synchronise`]
//! - Read-only variant: [`plan`]

use std::collections::HashMap;

use tracing::{error, info, warn};

use crate::config::SyncConfig;
use crate::contract::{ContentSource, Forge, Repository, SourceUnit, Transformer};
use crate::diff::{self, Decision};
use crate::error::{SyncError, UnitError, UnitStage, VcsError};
use crate::process::{ProcessedUnit, UnitPaths, UnitProcessor};
use crate::publish::{ChangeSet, PublishOutcome, Publisher};
use crate::reference::load_references;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Normal,
    /// The working tree already held generated-content changes; nothing was fetched.
    Resume,
}

#[derive(Debug)]
pub struct UnitFailure {
    pub unit: String,
    pub stage: UnitStage,
    pub message: String,
}

impl From<&UnitError> for UnitFailure {
    fn from(e: &UnitError) -> Self {
        UnitFailure {
            unit: e.unit.clone(),
            stage: e.stage,
            message: e.source.to_string(),
        }
    }
}

/// Outcome of the per-unit loop.
#[derive(Debug, Default)]
pub struct UnitsReport {
    pub changes: ChangeSet,
    pub processed: Vec<ProcessedUnit>,
    pub skipped: Vec<String>,
    pub failed: Vec<UnitFailure>,
}

#[derive(Debug)]
pub struct SynchroniseReport {
    pub mode: RunMode,
    pub units: UnitsReport,
    /// `None` when the run changed nothing and version control was never touched.
    pub publish: Option<PublishOutcome>,
}

/// Decision for one unit, as computed by [`plan`].
#[derive(Debug)]
pub struct UnitPlan {
    pub unit: SourceUnit,
    pub decision: Result<Decision, UnitError>,
}

/// Whether a previous run wrote generated content without publishing it.
///
/// Resumability is inferred from working-tree dirtiness under the generated paths.
pub fn has_pending_changes<R>(repo: &R, config: &SyncConfig) -> Result<bool, VcsError>
where
    R: Repository + ?Sized,
{
    repo.has_uncommitted_changes(&config.generated_paths())
}

/// Entrypoint: run one full synchronisation.
pub async fn synchronise<S, T, R, F>(
    config: &SyncConfig,
    source: &S,
    transformer: &T,
    repo: &R,
    forge: &F,
) -> Result<SynchroniseReport, SyncError>
where
    S: ContentSource + ?Sized,
    T: Transformer + ?Sized,
    R: Repository + ?Sized,
    F: Forge + ?Sized,
{
    info!(root = %config.root_id, "[SYNC] Starting synchronisation");
    if let Err(e) = config.validate() {
        error!(error = %e, "[SYNC][ERROR] Invalid configuration");
        return Err(e.into());
    }

    let start_branch = match repo.current_branch() {
        Ok(branch) => Some(branch),
        Err(e) => {
            warn!(error = %e, "[SYNC] Could not determine starting branch");
            None
        }
    };

    let result = run(config, source, transformer, repo, forge).await;
    if let Err(e) = &result {
        error!(error = %e, "[SYNC][ERROR] Synchronisation failed");
        if let Some(branch) = &start_branch {
            if let Err(checkout_err) = repo.checkout(branch) {
                error!(branch = %branch, error = %checkout_err, "[SYNC][ERROR] Could not return to starting branch");
            }
        }
    }
    result
}

async fn run<S, T, R, F>(
    config: &SyncConfig,
    source: &S,
    transformer: &T,
    repo: &R,
    forge: &F,
) -> Result<SynchroniseReport, SyncError>
where
    S: ContentSource + ?Sized,
    T: Transformer + ?Sized,
    R: Repository + ?Sized,
    F: Forge + ?Sized,
{
    let (mode, units) = if has_pending_changes(repo, config)? {
        warn!("[SYNC] Generated content has uncommitted changes, resuming publication without fetching");
        (
            RunMode::Resume,
            UnitsReport {
                changes: ChangeSet::resumed(),
                ..UnitsReport::default()
            },
        )
    } else {
        (RunMode::Normal, sync_units(config, source, transformer).await?)
    };

    info!(
        changed = units.changes.units().len(),
        skipped = units.skipped.len(),
        failed = units.failed.len(),
        "[SYNC] Unit processing finished"
    );

    let publish = if units.changes.is_empty() {
        info!("[SYNC] No documents changed, nothing to publish");
        None
    } else {
        Some(Publisher::new(config, repo, forge).publish(&units.changes).await?)
    };

    Ok(SynchroniseReport {
        mode,
        units,
        publish,
    })
}

/// Normal-mode loop: reference context, then every unit in listing order.
pub async fn sync_units<S, T>(
    config: &SyncConfig,
    source: &S,
    transformer: &T,
) -> Result<UnitsReport, SyncError>
where
    S: ContentSource + ?Sized,
    T: Transformer + ?Sized,
{
    let references = match load_references(source, &config.root_id).await {
        Ok(references) => references,
        Err(e) => {
            warn!(error = %e, "[SYNC] Could not list reference documents, continuing without them");
            Vec::new()
        }
    };

    let units = list_units(config, source).await?;
    info!(count = units.len(), "[SYNC] Listed units");

    let processor = UnitProcessor::new(config, source, transformer, &references);
    let mut report = UnitsReport::default();
    // Output slug → name of the first unit that claimed it.
    let mut claimed: HashMap<String, &str> = HashMap::new();
    for unit in &units {
        let slug = UnitPaths::for_unit(config, &unit.name).slug;
        if let Some(owner) = claimed.get(&slug) {
            let e = UnitError::new(
                unit.name.clone(),
                UnitStage::Checking,
                format!("output path {slug}.md is already used by unit {owner:?}"),
            );
            error!(unit = %e.unit, slug = %slug, owner = %owner, "[SYNC][ERROR] Unit name collides with another unit, skipping");
            report.failed.push(UnitFailure::from(&e));
            continue;
        }
        claimed.insert(slug, &unit.name);

        match sync_unit(config, source, &processor, unit).await {
            Ok(Some(processed)) => {
                report.changes.record(unit.name.clone());
                report.processed.push(processed);
            }
            Ok(None) => report.skipped.push(unit.name.clone()),
            Err(e) => {
                error!(unit = %e.unit, stage = %e.stage, error = %e.source, "[SYNC][ERROR] Unit failed, continuing");
                report.failed.push(UnitFailure::from(&e));
            }
        }
    }
    Ok(report)
}

async fn list_units<S>(config: &SyncConfig, source: &S) -> Result<Vec<SourceUnit>, SyncError>
where
    S: ContentSource + ?Sized,
{
    source
        .list_units(&config.root_id)
        .await
        .map_err(|e| SyncError::ListUnits {
            root: config.root_id.clone(),
            source: e,
        })
}

async fn decide<S>(
    config: &SyncConfig,
    source: &S,
    unit: &SourceUnit,
) -> Result<(Decision, Option<String>), UnitError>
where
    S: ContentSource + ?Sized,
{
    let paths = UnitPaths::for_unit(config, &unit.name);
    let existing = diff::read_existing(&paths.document)
        .map_err(|e| UnitError::new(unit.name.clone(), UnitStage::Checking, e))?;
    let decision = diff::check_unit(source, unit, existing.as_deref())
        .await
        .map_err(|e| UnitError::new(unit.name.clone(), UnitStage::Checking, e))?;
    Ok((decision, existing))
}

async fn sync_unit<S, T>(
    config: &SyncConfig,
    source: &S,
    processor: &UnitProcessor<'_, S, T>,
    unit: &SourceUnit,
) -> Result<Option<ProcessedUnit>, UnitError>
where
    S: ContentSource + ?Sized,
    T: Transformer + ?Sized,
{
    let (decision, existing) = decide(config, source, unit).await?;
    if !decision.needs_update() {
        info!(unit = %unit.name, decision = decision.label(), "[SYNC] Skipping unit");
        return Ok(None);
    }
    info!(unit = %unit.name, decision = decision.label(), "[SYNC] Regenerating unit");
    processor.process(unit, existing.as_deref()).await.map(Some)
}

/// Read-only: the decision for every unit, without writing or publishing anything.
pub async fn plan<S>(config: &SyncConfig, source: &S) -> Result<Vec<UnitPlan>, SyncError>
where
    S: ContentSource + ?Sized,
{
    config.validate()?;
    let units = list_units(config, source).await?;
    let mut plans = Vec::with_capacity(units.len());
    for unit in units {
        let decision = decide(config, source, &unit).await.map(|(d, _)| d);
        plans.push(UnitPlan { unit, decision });
    }
    Ok(plans)
}
