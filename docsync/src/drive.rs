//! # Drive content source
//!
//! [`DriveClient`] implements [`ContentSource`] against the Google Drive v3 REST API.
//! Units are the folders directly under the configured root; items are the
//! non-folder files inside a unit.
//!
//! - Google Docs are exported as `text/plain`, Google Sheets as `text/csv`.
//! - Images are downloaded with `alt=media`.
//! - Every listing is paginated via `nextPageToken` and includes shared drives.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docsync_core::contract::{ContentSource, ItemKind, SourceItem, SourceUnit};
use docsync_core::error::ClientError;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;

pub const DRIVE_API_URL: &str = "https://www.googleapis.com/drive/v3";

pub const MIME_FOLDER: &str = "application/vnd.google-apps.folder";
pub const MIME_DOCUMENT: &str = "application/vnd.google-apps.document";
pub const MIME_SPREADSHEET: &str = "application/vnd.google-apps.spreadsheet";

const LIST_FIELDS: &str = "nextPageToken,files(id,name,mimeType,modifiedTime)";
const PAGE_SIZE: &str = "1000";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub modified_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    pub next_page_token: Option<String>,
}

pub fn kind_for_mime(mime: &str) -> ItemKind {
    match mime {
        MIME_DOCUMENT => ItemKind::Document,
        MIME_SPREADSHEET => ItemKind::Spreadsheet,
        m if m.starts_with("image/") => ItemKind::Image,
        _ => ItemKind::Other,
    }
}

fn quote(id: &str) -> String {
    id.replace('\\', "\\\\").replace('\'', "\\'")
}

pub fn folders_query(parent: &str) -> String {
    format!(
        "'{}' in parents and mimeType = '{MIME_FOLDER}' and trashed = false",
        quote(parent)
    )
}

pub fn files_query(parent: &str) -> String {
    format!(
        "'{}' in parents and mimeType != '{MIME_FOLDER}' and trashed = false",
        quote(parent)
    )
}

impl From<DriveFile> for SourceItem {
    fn from(file: DriveFile) -> Self {
        SourceItem {
            kind: kind_for_mime(&file.mime_type),
            // Drive always reports modifiedTime for files; treat a missing one as the epoch.
            modified_at: file.modified_time.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            mime_type: Some(file.mime_type),
            id: file.id,
            name: file.name,
        }
    }
}

pub struct DriveClient {
    client: Client,
    api_url: String,
    token: String,
}

impl DriveClient {
    pub fn new(api_url: Option<&str>, token: &str) -> Self {
        let api_url = api_url.unwrap_or(DRIVE_API_URL).trim_end_matches('/').to_string();
        tracing::info!(api_url = %api_url, "Initialised Drive client");
        DriveClient {
            client: Client::new(),
            api_url,
            token: token.to_string(),
        }
    }

    fn get(&self, url: String) -> RequestBuilder {
        self.client.get(url).bearer_auth(&self.token)
    }

    async fn send(request: RequestBuilder) -> Result<Response, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<Failed to decode response body>"));
            tracing::error!(status = %status, body = %body, "Drive API returned error");
            return Err(format!("Drive API returned {status}: {body}").into());
        }
        Ok(response)
    }

    async fn list(&self, query: &str) -> Result<Vec<DriveFile>, ClientError> {
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut params = vec![
                ("q", query.to_string()),
                ("fields", LIST_FIELDS.to_string()),
                ("pageSize", PAGE_SIZE.to_string()),
                ("orderBy", "name".to_string()),
                ("supportsAllDrives", "true".to_string()),
                ("includeItemsFromAllDrives", "true".to_string()),
            ];
            if let Some(token) = &page_token {
                params.push(("pageToken", token.clone()));
            }
            let request = self.get(format!("{}/files", self.api_url)).query(&params);
            let page: FileList = Self::send(request).await?.json().await?;
            tracing::debug!(query, count = page.files.len(), "Fetched Drive listing page");
            files.extend(page.files);
            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }
        Ok(files)
    }

    async fn export(&self, id: &str, mime: &str) -> Result<String, ClientError> {
        let request = self
            .get(format!("{}/files/{}/export", self.api_url, id))
            .query(&[("mimeType", mime)]);
        Ok(Self::send(request).await?.text().await?)
    }
}

#[async_trait]
impl ContentSource for DriveClient {
    async fn list_units(&self, root_id: &str) -> Result<Vec<SourceUnit>, ClientError> {
        let folders = self.list(&folders_query(root_id)).await?;
        tracing::info!(root_id, count = folders.len(), "Listed Drive folders");
        Ok(folders
            .into_iter()
            .map(|f| SourceUnit {
                id: f.id,
                name: f.name,
                modified_at: f.modified_time,
            })
            .collect())
    }

    async fn list_items(&self, parent_id: &str) -> Result<Vec<SourceItem>, ClientError> {
        let files = self.list(&files_query(parent_id)).await?;
        Ok(files.into_iter().map(SourceItem::from).collect())
    }

    async fn export_document_text(&self, id: &str) -> Result<String, ClientError> {
        self.export(id, "text/plain").await
    }

    async fn export_spreadsheet_csv(&self, id: &str) -> Result<String, ClientError> {
        self.export(id, "text/csv").await
    }

    async fn download_bytes(&self, id: &str) -> Result<Vec<u8>, ClientError> {
        let request = self
            .get(format!("{}/files/{}", self.api_url, id))
            .query(&[("alt", "media"), ("supportsAllDrives", "true")]);
        Ok(Self::send(request).await?.bytes().await?.to_vec())
    }
}
