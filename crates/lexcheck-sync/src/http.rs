//! HTTP client for the review server's `/api/data` and `/api/answers` endpoints.

use lexcheck_core::{Annotations, Dataset, Patch};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("reviewer name is required")]
    MissingReviewer,
}

#[derive(Deserialize)]
struct WriteResponse {
    #[serde(default)]
    success: bool,
}

/// Client for one review server.
pub struct ReviewClient {
    client: reqwest::Client,
    base_url: String,
}

impl ReviewClient {
    /// `base_url` should be like `http://localhost:3000` (no trailing slash).
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, SyncError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    /// Fetch the reference dataset.
    pub async fn fetch_dataset(&self) -> Result<Dataset, SyncError> {
        let url = self.url("/api/data");
        info!(url = %url, "fetching reference dataset");
        let resp = Self::check(self.client.get(&url).send().await?).await?;
        let body = resp.text().await?;
        let dataset: Dataset = serde_json::from_str(&body)?;
        info!(entries = dataset.len(), "fetched reference dataset");
        Ok(dataset)
    }

    /// Fetch the dataset, degrading to an empty one on failure.
    pub async fn fetch_dataset_or_empty(&self) -> Dataset {
        match self.fetch_dataset().await {
            Ok(dataset) => dataset,
            Err(err) => {
                error!(error = %err, "dataset fetch failed, using empty dataset");
                Dataset::default()
            }
        }
    }

    /// Fetch a reviewer's records. The server answers `{}` for a new reviewer.
    pub async fn fetch_answers(&self, reviewer: &str) -> Result<Annotations, SyncError> {
        let reviewer = non_empty(reviewer)?;
        let url = self.url("/api/answers");
        info!(url = %url, reviewer, "fetching reviewer answers");
        let resp = self
            .client
            .get(&url)
            .query(&[("userName", reviewer)])
            .send()
            .await?;
        let body = Self::check(resp).await?.text().await?;
        let answers: Annotations = serde_json::from_str(&body)?;
        info!(reviewer, records = answers.len(), "fetched reviewer answers");
        Ok(answers)
    }

    /// Send a patch to be merged into the reviewer's store.
    ///
    /// Returns the server's `success` flag.
    pub async fn push_answers(&self, reviewer: &str, patch: &Patch) -> Result<bool, SyncError> {
        let reviewer = non_empty(reviewer)?;
        let url = self.url("/api/answers");
        info!(url = %url, reviewer, keys = patch.len(), "pushing answer patch");
        let resp = self
            .client
            .post(&url)
            .query(&[("userName", reviewer)])
            .json(patch)
            .send()
            .await?;
        let body = Self::check(resp).await?.text().await?;
        let result: WriteResponse = serde_json::from_str(&body)?;
        info!(reviewer, success = result.success, "push complete");
        Ok(result.success)
    }
}

fn non_empty(reviewer: &str) -> Result<&str, SyncError> {
    let reviewer = reviewer.trim();
    if reviewer.is_empty() {
        return Err(SyncError::MissingReviewer);
    }
    Ok(reviewer)
}
