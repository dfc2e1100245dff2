//! Per-unit pipeline: list → fetch → assemble → transform → stamp → persist.
//!
//! A unit either ends up with a freshly written document or is left exactly as
//! it was: the document is written through a temporary file and renamed into
//! place, and every failure is returned as a [`UnitError`] tagged with the
//! stage it happened in. No retries. Downloaded images are held in a hidden
//! staging directory under the assets root and only moved into the unit's
//! asset directory once the document is about to be written, so a failed unit
//! leaves no stray images behind.

use std::collections::HashSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use regex::Regex;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::contract::{ContentSource, ItemKind, ReferenceDoc, SourceItem, SourceUnit, TransformRequest, Transformer};
use crate::diff::latest_modified;
use crate::error::{ClientError, UnitError, UnitStage};
use crate::metadata::{self, ManifestEntry};

/// Image extensions kept as-is instead of appending one derived from the MIME type.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "svg", "bmp", "tiff"];

/// Prefix of the per-unit staging directories created under the assets root.
pub const STAGING_PREFIX: &str = ".docsync-staging-";

static SLUG_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("static regex"));
static UNSAFE_FILE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]").expect("static regex"));

/// Where a unit's generated files live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitPaths {
    pub slug: String,
    pub document: PathBuf,
    pub asset_dir: PathBuf,
    /// Site-relative directory the staged images are served from.
    pub asset_url: String,
}

impl UnitPaths {
    pub fn for_unit(config: &SyncConfig, unit_name: &str) -> Self {
        let slug = slugify(unit_name);
        UnitPaths {
            document: config.docs_dir.join(format!("{slug}.md")),
            asset_dir: config.assets_dir.join(&slug),
            asset_url: format!("{}/{}", config.assets_url_prefix.trim_end_matches('/'), slug),
            slug,
        }
    }
}

/// Lowercase, with every run of non-alphanumerics collapsed to `-`.
pub fn slugify(name: &str) -> String {
    let slug = SLUG_SEPARATORS
        .replace_all(&name.to_lowercase(), "-")
        .trim_matches('-')
        .to_string();
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

fn extension_for_mime(mime: Option<&str>) -> &'static str {
    match mime.unwrap_or_default() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "image/bmp" => "bmp",
        "image/tiff" => "tiff",
        _ => "png",
    }
}

/// Filesystem-safe image filename. An extension is only appended when the
/// original name does not already end in a recognised image extension.
pub fn image_file_name(name: &str, mime: Option<&str>) -> String {
    let sanitized = UNSAFE_FILE_CHARS
        .replace_all(name.trim(), "_")
        .trim_matches('.')
        .to_string();
    let sanitized = if sanitized.is_empty() { "image".to_string() } else { sanitized };
    match sanitized.rsplit_once('.') {
        Some((stem, ext)) if IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) => {
            format!("{stem}.{}", ext.to_ascii_lowercase())
        }
        _ => format!("{sanitized}.{}", extension_for_mime(mime)),
    }
}

fn unique_file_name(name: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.clone()) {
        return name;
    }
    let (stem, ext) = name.rsplit_once('.').unwrap_or((name.as_str(), ""));
    let mut n = 2;
    loop {
        let candidate = format!("{stem}-{n}.{ext}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Images downloaded for one unit that are not yet visible in its asset directory.
#[derive(Debug, Default)]
struct StagedImages {
    dir: Option<TempDir>,
    files: Vec<String>,
}

impl StagedImages {
    fn add(&mut self, assets_root: &Path, file_name: &str, bytes: &[u8]) -> io::Result<()> {
        if self.dir.is_none() {
            std::fs::create_dir_all(assets_root)?;
            let dir = tempfile::Builder::new()
                .prefix(STAGING_PREFIX)
                .tempdir_in(assets_root)?;
            self.dir = Some(dir);
        }
        if let Some(dir) = &self.dir {
            std::fs::write(dir.path().join(file_name), bytes)?;
        }
        self.files.push(file_name.to_string());
        Ok(())
    }

    /// Move every staged image into `asset_dir`, returning the paths that did
    /// not exist before. On error the images moved so far are removed again.
    fn move_into(&self, asset_dir: &Path) -> io::Result<Vec<PathBuf>> {
        let Some(dir) = &self.dir else {
            return Ok(Vec::new());
        };
        std::fs::create_dir_all(asset_dir)?;
        let mut created = Vec::new();
        for name in &self.files {
            let target = asset_dir.join(name);
            let existed = target.exists();
            if let Err(e) = std::fs::rename(dir.path().join(name), &target) {
                remove_images(asset_dir, &created);
                return Err(e);
            }
            if !existed {
                created.push(target);
            }
        }
        Ok(created)
    }
}

/// Best-effort removal of images published for a unit whose document could not be written.
fn remove_images(asset_dir: &Path, paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "[UNIT] Could not remove image");
        }
    }
    // Only succeeds when nothing else lives there.
    let _ = std::fs::remove_dir(asset_dir);
}

/// Raw material assembled from one unit's items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMaterial {
    pub text: String,
    pub image_paths: Vec<String>,
    pub manifest: Vec<ManifestEntry>,
}

/// Result of a successfully processed unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedUnit {
    pub name: String,
    pub path: PathBuf,
    pub images: usize,
    pub used_fallback: bool,
    pub synced_at: DateTime<Utc>,
}

/// Deterministic document used when the transformer is unavailable.
pub fn fallback_document(unit_name: &str, material: &RawMaterial) -> String {
    let mut doc = format!(
        "---\ntitle: \"{}\"\n---\n\n{}\n",
        unit_name.replace('"', "\\\""),
        material.text.trim()
    );
    if !material.image_paths.is_empty() {
        doc.push_str("\n## Images\n\n");
        for path in &material.image_paths {
            let alt = path.rsplit('/').next().unwrap_or(path);
            doc.push_str(&format!("![{alt}]({path})\n"));
        }
    }
    doc
}

/// Write `contents` to `path` via a sibling temporary file, creating parents.
pub fn write_atomically(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Round up to the millisecond precision the watermark is written with.
fn ceil_millis(time: DateTime<Utc>) -> DateTime<Utc> {
    let truncated = time.trunc_subsecs(3);
    if truncated < time {
        truncated + Duration::milliseconds(1)
    } else {
        truncated
    }
}

fn stage_err<E>(unit: &SourceUnit, stage: UnitStage) -> impl FnOnce(E) -> UnitError + '_
where
    E: Into<ClientError>,
{
    move |e| UnitError::new(unit.name.clone(), stage, e)
}

/// Runs the per-unit pipeline against borrowed collaborators.
pub struct UnitProcessor<'a, S: ?Sized, T: ?Sized> {
    pub config: &'a SyncConfig,
    pub source: &'a S,
    pub transformer: &'a T,
    pub references: &'a [ReferenceDoc],
}

impl<'a, S, T> UnitProcessor<'a, S, T>
where
    S: ContentSource + ?Sized,
    T: Transformer + ?Sized,
{
    pub fn new(
        config: &'a SyncConfig,
        source: &'a S,
        transformer: &'a T,
        references: &'a [ReferenceDoc],
    ) -> Self {
        UnitProcessor {
            config,
            source,
            transformer,
            references,
        }
    }

    /// Regenerate the document for `unit`. `existing` is the current document text, if any.
    pub async fn process(
        &self,
        unit: &SourceUnit,
        existing: Option<&str>,
    ) -> Result<ProcessedUnit, UnitError> {
        let paths = UnitPaths::for_unit(self.config, &unit.name);

        info!(unit = %unit.name, "[UNIT] Listing items");
        let items = self
            .source
            .list_items(&unit.id)
            .await
            .map_err(stage_err(unit, UnitStage::Listing))?;

        let (material, staged) = self.assemble(unit, &paths, &items).await?;
        info!(
            unit = %unit.name,
            items = material.manifest.len(),
            images = material.image_paths.len(),
            "[UNIT] Raw material assembled"
        );

        let request = TransformRequest {
            unit_name: unit.name.clone(),
            raw_text: material.text.clone(),
            image_paths: material.image_paths.clone(),
            existing_body: existing.map(metadata::strip),
            references: self.references.to_vec(),
        };
        let (body, used_fallback) = match self.transformer.transform(&request).await {
            Ok(body) => (body, false),
            Err(e) if self.config.fallback_on_transform_error => {
                warn!(unit = %unit.name, error = %e, "[UNIT] Transformer failed, using fallback document");
                (fallback_document(&unit.name, &material), true)
            }
            Err(e) => return Err(UnitError::new(unit.name.clone(), UnitStage::Transforming, e)),
        };

        // The watermark must never predate an item it claims to cover.
        let now = Utc::now();
        let synced_at = ceil_millis(latest_modified(&items).map_or(now, |latest| latest.max(now)));
        let document = metadata::stamp(
            &body,
            &material.manifest,
            synced_at,
            self.config.watermark_format,
        );
        debug!(unit = %unit.name, synced_at = %synced_at, "[UNIT] Watermark stamped");

        let published = staged
            .move_into(&paths.asset_dir)
            .map_err(stage_err(unit, UnitStage::Persisting))?;
        if let Err(e) = write_atomically(&paths.document, document.as_bytes()) {
            remove_images(&paths.asset_dir, &published);
            return Err(UnitError::new(unit.name.clone(), UnitStage::Persisting, e));
        }
        info!(unit = %unit.name, path = %paths.document.display(), "[UNIT] Document written");

        Ok(ProcessedUnit {
            name: unit.name.clone(),
            path: paths.document,
            images: material.image_paths.len(),
            used_fallback,
            synced_at,
        })
    }

    async fn assemble(
        &self,
        unit: &SourceUnit,
        paths: &UnitPaths,
        items: &[SourceItem],
    ) -> Result<(RawMaterial, StagedImages), UnitError> {
        let mut material = RawMaterial::default();
        let mut staged = StagedImages::default();
        let mut taken = HashSet::new();
        for item in items {
            match item.kind {
                ItemKind::Document => {
                    let text = self
                        .source
                        .export_document_text(&item.id)
                        .await
                        .map_err(stage_err(unit, UnitStage::Fetching))?;
                    material
                        .text
                        .push_str(&format!("## {}\n\n{}\n\n", item.name, text.trim()));
                }
                ItemKind::Spreadsheet => {
                    let csv = self
                        .source
                        .export_spreadsheet_csv(&item.id)
                        .await
                        .map_err(stage_err(unit, UnitStage::Fetching))?;
                    material
                        .text
                        .push_str(&format!("## {}\n\n```csv\n{}\n```\n\n", item.name, csv.trim_end()));
                }
                ItemKind::Image => {
                    let bytes = self
                        .source
                        .download_bytes(&item.id)
                        .await
                        .map_err(stage_err(unit, UnitStage::Fetching))?;
                    let file_name = unique_file_name(
                        image_file_name(&item.name, item.mime_type.as_deref()),
                        &mut taken,
                    );
                    staged
                        .add(&self.config.assets_dir, &file_name, &bytes)
                        .map_err(stage_err(unit, UnitStage::Assembling))?;
                    debug!(unit = %unit.name, file = %file_name, "[UNIT] Image staged");
                    material
                        .image_paths
                        .push(format!("{}/{}", paths.asset_url, file_name));
                }
                ItemKind::Other => {
                    debug!(unit = %unit.name, item = %item.name, "[UNIT] Ignoring item of unknown kind");
                    continue;
                }
            }
            material
                .manifest
                .push(ManifestEntry::new(item.id.clone(), item.name.clone()));
        }
        Ok((material, staged))
    }
}
