use std::time::Duration;

use async_trait::async_trait;
use log::trace;
use thiserror::Error;

use crate::kernel::constants::{APP_NAME, APP_VERSION};
use crate::update::model::{UpdateCheckRequest, UpdateCheckResponse};

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("update request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("update server returned HTTP {status} for {url}")]
    Status { status: u16, url: String },
}

/// Sends batched update checks.
#[async_trait]
pub trait UpdateClient: Send + Sync {
    async fn check(&self, request: &UpdateCheckRequest) -> Result<UpdateCheckResponse, UpdateError>;
}

/// [`UpdateClient`] for the modhost web API.
#[derive(Debug, Clone)]
pub struct WebApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl WebApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, UpdateError> {
        let http = reqwest::Client::builder()
            .user_agent(format!("{APP_NAME}/{APP_VERSION}"))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl UpdateClient for WebApiClient {
    async fn check(&self, request: &UpdateCheckRequest) -> Result<UpdateCheckResponse, UpdateError> {
        let url = format!("{}/mods", self.base_url);
        trace!("Checking {} mod(s) for updates at {url}", request.mods.len());
        let response = self.http.post(&url).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpdateError::Status {
                status: status.as_u16(),
                url,
            });
        }
        Ok(response.json::<UpdateCheckResponse>().await?)
    }
}
