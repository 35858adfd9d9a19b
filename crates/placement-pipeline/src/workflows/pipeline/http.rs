use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use tracing::debug;

use super::domain::{Application, ApplicationId, JobId, StatusPatch};
use super::sync::{ApiScope, PipelineApi, SyncError};
use crate::config::PipelineConfig;

const USER_AGENT: &str = concat!("placement-pipeline/", env!("CARGO_PKG_VERSION"));

/// reqwest-backed client for the collaborator REST contract.
#[derive(Debug, Clone)]
pub struct HttpPipelineClient {
    http: Client,
    base_url: String,
    scope: ApiScope,
    token: Option<String>,
}

impl HttpPipelineClient {
    pub fn new(
        base_url: impl Into<String>,
        scope: ApiScope,
        timeout: Duration,
    ) -> Result<Self, SyncError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|err| SyncError::Transport(err.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            scope,
            token: None,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, SyncError> {
        let client = Self::new(
            config.api_base_url.clone(),
            config.scope,
            config.request_timeout,
        )?;
        Ok(match &config.api_token {
            Some(token) => client.with_token(token.clone()),
            None => client,
        })
    }

    /// Bearer token issued by the surrounding session layer.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn applications_url(&self, job_id: JobId) -> String {
        format!(
            "{}/{}/job/{}/applications",
            self.base_url,
            self.scope.segment(),
            job_id
        )
    }

    pub fn status_url(&self, application_id: ApplicationId) -> String {
        format!(
            "{}/{}/application/{}/status",
            self.base_url,
            self.scope.segment(),
            application_id
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

async fn ensure_success(response: Response) -> Result<Response, SyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SyncError::Status {
        code: status.as_u16(),
        body,
    })
}

#[async_trait]
impl PipelineApi for HttpPipelineClient {
    async fn fetch_applications(&self, job_id: JobId) -> Result<Vec<Application>, SyncError> {
        let url = self.applications_url(job_id);
        debug!(%url, "fetching applications");

        let response = self
            .authorize(self.http.get(&url))
            .send()
            .await
            .map_err(|err| SyncError::Transport(err.to_string()))?;
        let response = ensure_success(response).await?;

        response
            .json::<Vec<Application>>()
            .await
            .map_err(|err| SyncError::Decode(err.to_string()))
    }

    async fn update_status(
        &self,
        application_id: ApplicationId,
        patch: &StatusPatch,
    ) -> Result<(), SyncError> {
        let url = self.status_url(application_id);
        debug!(%url, status = %patch.status, "persisting status change");

        let response = self
            .authorize(self.http.put(&url).json(patch))
            .send()
            .await
            .map_err(|err| SyncError::Transport(err.to_string()))?;
        ensure_success(response).await?;
        Ok(())
    }
}
