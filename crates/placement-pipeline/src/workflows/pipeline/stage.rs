use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Position of an application on the recruitment board.
///
/// `Applied -> Shortlisted -> Interview -> Selected` is the forward path; `Rejected` is a
/// parallel terminal branch. Recruiters may still move cards in any direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Applied,
    Shortlisted,
    Interview,
    Selected,
    Rejected,
}

impl Stage {
    /// Stage assigned to new applications and to any status the board cannot read.
    pub const INITIAL: Self = Self::Applied;

    pub const fn ordered() -> [Self; 5] {
        [
            Self::Applied,
            Self::Shortlisted,
            Self::Interview,
            Self::Selected,
            Self::Rejected,
        ]
    }

    pub const fn id(self) -> &'static str {
        match self {
            Self::Applied => "APPLIED",
            Self::Shortlisted => "SHORTLISTED",
            Self::Interview => "INTERVIEW",
            Self::Selected => "SELECTED",
            Self::Rejected => "REJECTED",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Applied => "Applied",
            Self::Shortlisted => "Shortlisted",
            Self::Interview => "Interview",
            Self::Selected => "Selected",
            Self::Rejected => "Rejected",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Selected | Self::Rejected)
    }

    /// Entering this stage needs an offered package captured alongside the move.
    pub const fn requires_capture(self) -> bool {
        matches!(self, Self::Selected)
    }

    /// Case-insensitive lookup that falls back to [`Stage::INITIAL`].
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        raw.and_then(|value| value.parse().ok())
            .unwrap_or(Self::INITIAL)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        Self::ordered()
            .into_iter()
            .find(|stage| stage.id().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownStage(raw.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown pipeline stage '{0}'")]
pub struct UnknownStage(pub String);

/// Column metadata rendered by the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageDescriptor {
    pub id: &'static str,
    pub display_label: &'static str,
}

pub fn registry() -> [StageDescriptor; 5] {
    Stage::ordered().map(|stage| StageDescriptor {
        id: stage.id(),
        display_label: stage.label(),
    })
}

/// Reads an optional status string, mapping anything unrecognised to `None`.
pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Option<Stage>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match value.parse::<Stage>() {
        Ok(stage) => Some(stage),
        Err(_) => {
            tracing::debug!(status = %value, "unrecognised application status");
            None
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_lists_columns_in_board_order() {
        let ids: Vec<_> = registry().iter().map(|entry| entry.id).collect();
        assert_eq!(
            ids,
            ["APPLIED", "SHORTLISTED", "INTERVIEW", "SELECTED", "REJECTED"]
        );
        assert_eq!(registry()[3].display_label, "Selected");
    }

    #[test]
    fn parses_ids_case_insensitively() {
        assert_eq!("interview".parse::<Stage>(), Ok(Stage::Interview));
        assert_eq!(" Selected ".parse::<Stage>(), Ok(Stage::Selected));
        assert_eq!(
            "ONBOARDED".parse::<Stage>(),
            Err(UnknownStage("ONBOARDED".to_string()))
        );
    }

    #[test]
    fn lenient_parse_defaults_to_applied() {
        assert_eq!(Stage::parse_lenient(None), Stage::Applied);
        assert_eq!(Stage::parse_lenient(Some("ghosted")), Stage::Applied);
        assert_eq!(Stage::parse_lenient(Some("rejected")), Stage::Rejected);
    }

    #[test]
    fn only_selected_requires_capture() {
        let capturing: Vec<_> = Stage::ordered()
            .into_iter()
            .filter(|stage| stage.requires_capture())
            .collect();
        assert_eq!(capturing, vec![Stage::Selected]);
        assert!(Stage::Rejected.is_terminal());
        assert!(!Stage::Interview.is_terminal());
    }

    #[test]
    fn wire_format_uses_screaming_ids() {
        let json = serde_json::to_string(&Stage::Shortlisted).expect("serializes");
        assert_eq!(json, "\"SHORTLISTED\"");
        let descriptor = serde_json::to_value(registry()[0]).expect("serializes");
        assert_eq!(descriptor["displayLabel"], "Applied");
    }
}
