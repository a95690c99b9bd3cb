//! Run record loading. This sits outside the replay core: the core only ever
//! sees a fully loaded `RunRecord`.

use std::path::{Path, PathBuf};

use shared_types::RunRecord;

use crate::config::ReplayConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunSource {
    /// JSON file holding a run record.
    File(PathBuf),
    /// `GET {api_base_url}/runs/{run_id}/replay`
    Api { run_id: String },
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("IO error reading {path}: {message}")]
    Io { path: String, message: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Run not found: {0}")]
    NotFound(String),

    #[error("Invalid run record JSON: {0}")]
    Json(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        SourceError::Http(e.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(e: serde_json::Error) -> Self {
        SourceError::Json(e.to_string())
    }
}

pub fn run_url(api_base_url: &str, run_id: &str) -> String {
    format!("{}/runs/{}/replay", api_base_url.trim_end_matches('/'), run_id)
}

pub async fn load_run_record(
    source: &RunSource,
    config: &ReplayConfig,
) -> Result<RunRecord, SourceError> {
    match source {
        RunSource::File(path) => load_from_file(path).await,
        RunSource::Api { run_id } => fetch_from_api(run_id, config).await,
    }
}

async fn load_from_file(path: &Path) -> Result<RunRecord, SourceError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SourceError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
    let mut record: RunRecord = serde_json::from_str(&raw)?;
    if record.run_id.trim().is_empty() {
        // Fall back to the file stem so the player still has a run identity.
        record.run_id = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| "local-run".to_string());
    }
    tracing::info!(path = %path.display(), run_id = %record.run_id, "Loaded run record from file");
    Ok(record)
}

async fn fetch_from_api(run_id: &str, config: &ReplayConfig) -> Result<RunRecord, SourceError> {
    let url = run_url(&config.api_base_url, run_id);
    let client = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()?;

    let mut request = client.get(&url);
    if let Some(api_key) = &config.api_key {
        request = request.header("X-API-Key", api_key);
    }

    tracing::info!(url = %url, run_id, "Fetching run record");
    let response = request.send().await?;
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(SourceError::NotFound(run_id.to_string()));
    }
    let response = response.error_for_status()?;

    let mut record: RunRecord = response.json().await?;
    if record.run_id.trim().is_empty() {
        record.run_id = run_id.to_string();
    }
    Ok(record)
}
