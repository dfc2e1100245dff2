//! Staleness decision for one unit.
//!
//! Decision precedence:
//! 1. `FirstRun` (no generated document on disk)
//! 2. `MissingMetadata` (document exists, watermark absent or garbled)
//! 3. `Empty` (unit has no items; nothing to sync)
//! 4. `Stale` (newest item modified strictly after the last sync)
//! 5. `UpToDate`
//!
//! Only steps 3 to 5 need the remote item listing, so it is fetched lazily.
//! Staleness is decided on the newest item alone: removing an item without
//! touching any other leaves the newest timestamp unchanged and is not detected.

use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::contract::{ContentSource, SourceItem, SourceUnit};
use crate::error::ClientError;
use crate::metadata::{self, Watermark};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    FirstRun,
    MissingMetadata,
    Empty,
    Stale {
        latest: DateTime<Utc>,
        last_sync_at: DateTime<Utc>,
    },
    UpToDate {
        last_sync_at: DateTime<Utc>,
    },
}

impl Decision {
    pub fn needs_update(&self) -> bool {
        matches!(
            self,
            Decision::FirstRun | Decision::MissingMetadata | Decision::Stale { .. }
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            Decision::FirstRun => "first run",
            Decision::MissingMetadata => "missing metadata",
            Decision::Empty => "empty",
            Decision::Stale { .. } => "stale",
            Decision::UpToDate { .. } => "up to date",
        }
    }
}

/// Newest remote modification time across `items`.
pub fn latest_modified(items: &[SourceItem]) -> Option<DateTime<Utc>> {
    items.iter().map(|item| item.modified_at).max()
}

/// Compare the items against a decoded watermark. Equal timestamps count as synced.
pub fn compare(watermark: &Watermark, items: &[SourceItem]) -> Decision {
    match latest_modified(items) {
        None => Decision::Empty,
        Some(latest) if latest > watermark.last_sync_at => Decision::Stale {
            latest,
            last_sync_at: watermark.last_sync_at,
        },
        Some(_) => Decision::UpToDate {
            last_sync_at: watermark.last_sync_at,
        },
    }
}

/// Read a generated document if present. Undecodable bytes are replaced, which
/// leaves the watermark unparseable and forces regeneration.
pub fn read_existing(path: &Path) -> std::io::Result<Option<String>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// Decide whether `unit` needs regeneration given its existing document text.
pub async fn check_unit<S>(
    source: &S,
    unit: &SourceUnit,
    existing: Option<&str>,
) -> Result<Decision, ClientError>
where
    S: ContentSource + ?Sized,
{
    let Some(existing) = existing else {
        debug!(unit = %unit.name, "[DIFF] No generated document yet");
        return Ok(Decision::FirstRun);
    };
    let Some(watermark) = metadata::decode(existing) else {
        debug!(unit = %unit.name, "[DIFF] Generated document has no usable watermark");
        return Ok(Decision::MissingMetadata);
    };
    let items = source.list_items(&unit.id).await?;
    let decision = compare(&watermark, &items);
    debug!(
        unit = %unit.name,
        items = items.len(),
        last_sync_at = %watermark.last_sync_at,
        decision = decision.label(),
        "[DIFF] Compared remote items against watermark"
    );
    Ok(decision)
}

/// Boolean form of [`check_unit`].
pub async fn needs_update<S>(
    source: &S,
    unit: &SourceUnit,
    existing: Option<&str>,
) -> Result<bool, ClientError>
where
    S: ContentSource + ?Sized,
{
    Ok(check_unit(source, unit, existing).await?.needs_update())
}
