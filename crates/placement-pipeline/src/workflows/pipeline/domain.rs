use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

use super::stage::{self, Stage};

/// Identifier of one candidate's application, stable across refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub u64);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job requisition whose applications make up a pipeline context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One candidate's submission to one job, as served by the collaborator API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: ApplicationId,
    #[serde(default)]
    pub student_name: String,
    #[serde(default)]
    pub student_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_mobile: Option<String>,
    #[serde(default, deserialize_with = "stage::deserialize_lenient")]
    pub status: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_offered: Option<f64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_timestamp"
    )]
    pub applied_at: Option<NaiveDateTime>,
}

impl Application {
    pub fn new(
        id: ApplicationId,
        student_name: impl Into<String>,
        student_email: impl Into<String>,
    ) -> Self {
        Self {
            id,
            student_name: student_name.into(),
            student_email: student_email.into(),
            student_mobile: None,
            status: Some(Stage::INITIAL),
            package_offered: None,
            applied_at: None,
        }
    }

    pub fn with_status(mut self, status: Stage) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_package(mut self, package_offered: f64) -> Self {
        self.package_offered = Some(package_offered);
        self
    }

    /// Column the application renders in; absent or unknown statuses land in `Applied`.
    pub fn stage(&self) -> Stage {
        self.status.unwrap_or(Stage::INITIAL)
    }
}

/// Body of a status update: the target stage plus the package when selecting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPatch {
    pub status: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_offered: Option<f64>,
}

impl StatusPatch {
    pub const fn move_to(status: Stage) -> Self {
        Self {
            status,
            package_offered: None,
        }
    }

    pub const fn select(package_offered: f64) -> Self {
        Self {
            status: Stage::Selected,
            package_offered: Some(package_offered),
        }
    }

    /// `Selected` must carry a positive package and nothing else may carry one.
    pub fn validate(&self) -> Result<(), PatchError> {
        match (self.status, self.package_offered) {
            (Stage::Selected, None) => Err(PatchError::MissingPackage),
            (Stage::Selected, Some(value)) if !value.is_finite() || value <= 0.0 => {
                Err(PatchError::InvalidPackage(value))
            }
            (Stage::Selected, Some(_)) => Ok(()),
            (other, Some(_)) => Err(PatchError::UnexpectedPackage(other)),
            (_, None) => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatchError {
    #[error("moving to SELECTED requires a packageOffered value")]
    MissingPackage,
    #[error("packageOffered must be a positive number, got {0}")]
    InvalidPackage(f64),
    #[error("packageOffered is only accepted with SELECTED, not {0}")]
    UnexpectedPackage(Stage),
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}
