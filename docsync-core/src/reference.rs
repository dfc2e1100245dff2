//! Root-level reference documents handed to every transformation in a run.

use tracing::{info, warn};

use crate::contract::{ContentSource, ItemKind, ReferenceDoc, SourceItem};
use crate::error::{ClientError, ReferenceLoadError};

async fn load_one<S>(source: &S, item: &SourceItem) -> Result<ReferenceDoc, ReferenceLoadError>
where
    S: ContentSource + ?Sized,
{
    let content: Result<String, ClientError> = match item.kind {
        ItemKind::Spreadsheet => source.export_spreadsheet_csv(&item.id).await,
        _ => source.export_document_text(&item.id).await,
    };
    content
        .map(|content| ReferenceDoc {
            name: item.name.clone(),
            content,
        })
        .map_err(|source| ReferenceLoadError {
            name: item.name.clone(),
            source,
        })
}

/// Load every document/spreadsheet sitting directly under `root_id`.
///
/// Best effort: a failing document is logged and left out. Only a failure to
/// list the root itself is returned.
pub async fn load_references<S>(source: &S, root_id: &str) -> Result<Vec<ReferenceDoc>, ClientError>
where
    S: ContentSource + ?Sized,
{
    let items = source.list_items(root_id).await?;
    let mut references = Vec::new();
    for item in items
        .iter()
        .filter(|i| matches!(i.kind, ItemKind::Document | ItemKind::Spreadsheet))
    {
        match load_one(source, item).await {
            Ok(doc) => references.push(doc),
            Err(e) => warn!(error = %e, "[SYNC] Skipping reference document"),
        }
    }
    info!(count = references.len(), "[SYNC] Reference context loaded");
    Ok(references)
}
