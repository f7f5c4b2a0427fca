// Record-import REST BlobStatusSource Implementation

use async_trait::async_trait;
use blob_watcher_core::domain::{BlobId, BlobState, BlobStatus};
use blob_watcher_core::error::{AppError, Result};
use blob_watcher_core::port::BlobStatusSource;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Default User-Agent sent to the record-import service
pub const DEFAULT_USER_AGENT: &str = "_RECORD-UPDATE-HANDLER";

/// Default per-request timeout (30s)
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the record-import REST API
#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    pub api_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub user_agent: String,
    pub timeout: Duration,
}

impl HttpSourceConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            username: None,
            password: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

/// Body of the state update request
#[derive(Debug, Serialize)]
struct UpdateStateRequest<'a> {
    op: &'a str,
    state: BlobState,
}

/// Reads blob metadata from and advances blobs on the record-import service
#[derive(Debug, Clone)]
pub struct HttpBlobStatusSource {
    client: reqwest::Client,
    base_url: Url,
    username: Option<String>,
    password: Option<String>,
}

impl HttpBlobStatusSource {
    pub fn new(config: HttpSourceConfig) -> Result<Self> {
        let base_url = Url::parse(&config.api_url)
            .map_err(|e| AppError::Config(format!("Invalid API URL '{}': {}", config.api_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Config(format!(
                "API URL '{}' cannot carry a path",
                config.api_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            username: config.username,
            password: config.password,
        })
    }

    /// `{api_url}/blobs/{id}`, with the id percent-encoded as a single segment
    fn blob_url(&self, blob_id: &BlobId) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                AppError::Config(format!("API URL {} cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .push("blobs")
            .push(blob_id);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.username {
            Some(username) => request.basic_auth(username, self.password.as_ref()),
            None => request,
        }
    }
}

fn map_reqwest_error(blob_id: &BlobId, err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::Transport(format!("Request for blob {} timed out", blob_id))
    } else if err.is_connect() {
        AppError::Transport(format!("Cannot connect to record-import service: {}", err))
    } else {
        AppError::Transport(format!("Request for blob {} failed: {}", blob_id, err))
    }
}

/// Turn non-2xx responses into errors
async fn check_status(blob_id: &BlobId, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(AppError::NotFound(format!("Blob {} not found", blob_id)));
    }

    let body = response.text().await.unwrap_or_default();
    warn!(blob_id = %blob_id, status = %status, "Record-import service rejected request");
    Err(AppError::Transport(format!(
        "HTTP {} for blob {}: {}",
        status.as_u16(),
        blob_id,
        body.trim()
    )))
}

#[async_trait]
impl BlobStatusSource for HttpBlobStatusSource {
    async fn read_status(&self, blob_id: &BlobId) -> Result<BlobStatus> {
        let url = self.blob_url(blob_id)?;
        debug!(blob_id = %blob_id, url = %url, "Reading blob metadata");

        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(|e| map_reqwest_error(blob_id, e))?;
        let response = check_status(blob_id, response).await?;

        response.json::<BlobStatus>().await.map_err(|e| {
            AppError::Transport(format!("Invalid metadata for blob {}: {}", blob_id, e))
        })
    }

    async fn advance_to_processed(&self, blob_id: &BlobId) -> Result<()> {
        let url = self.blob_url(blob_id)?;
        debug!(blob_id = %blob_id, "Advancing blob to PROCESSED");

        let body = UpdateStateRequest {
            op: "updateState",
            state: BlobState::Processed,
        };
        let response = self
            .authorize(self.client.post(url))
            .json(&body)
            .send()
            .await
            .map_err(|e| map_reqwest_error(blob_id, e))?;
        check_status(blob_id, response).await?;
        Ok(())
    }
}
