use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::domain::{Application, ApplicationId, JobId, StatusPatch};

/// Remote collaborator the board reads from and persists transitions to.
///
/// Implementations convert every transport or HTTP failure into [`SyncError`] and never
/// retry on their own; the caller decides what a failure means.
#[async_trait]
pub trait PipelineApi: Send + Sync {
    async fn fetch_applications(&self, job_id: JobId) -> Result<Vec<Application>, SyncError>;

    async fn update_status(
        &self,
        application_id: ApplicationId,
        patch: &StatusPatch,
    ) -> Result<(), SyncError>;
}

/// Success/failure signal for one remote status update.
pub type CommitResult = Result<(), SyncError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("remote returned HTTP {code}: {body}")]
    Status { code: u16, body: String },
    #[error("unable to decode response: {0}")]
    Decode(String),
}

/// Role segment of the collaborator routes; the payload contract is identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiScope {
    #[default]
    Company,
    Officer,
    Admin,
}

impl ApiScope {
    pub const fn segment(self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Officer => "officer",
            Self::Admin => "admin",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "company" => Some(Self::Company),
            "officer" => Some(Self::Officer),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}
