use super::domain::{ApplicationId, StatusPatch};
use super::stage::Stage;

/// Modal gate that collects the offered package before a move into `Selected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureDialog {
    application_id: ApplicationId,
    student_name: String,
    origin: Stage,
    target: Stage,
    input: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DialogOutcome {
    Submitted(StatusPatch),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("a package value is required")]
    Missing,
    #[error("'{0}' is not a number")]
    NotNumeric(String),
    #[error("package must be greater than zero")]
    NotPositive,
}

impl CaptureDialog {
    pub fn open(
        application_id: ApplicationId,
        student_name: impl Into<String>,
        origin: Stage,
        target: Stage,
    ) -> Self {
        Self {
            application_id,
            student_name: student_name.into(),
            origin,
            target,
            input: String::new(),
        }
    }

    pub fn application_id(&self) -> ApplicationId {
        self.application_id
    }

    pub fn student_name(&self) -> &str {
        &self.student_name
    }

    pub fn origin(&self) -> Stage {
        self.origin
    }

    pub fn target(&self) -> Stage {
        self.target
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn prompt(&self) -> String {
        format!(
            "Enter the salary package offered to {} (LPA).",
            self.student_name
        )
    }

    pub fn set_input(&mut self, raw: &str) {
        self.input = raw.to_string();
    }

    pub fn parsed_value(&self) -> Result<f64, CaptureError> {
        let trimmed = self.input.trim();
        if trimmed.is_empty() {
            return Err(CaptureError::Missing);
        }
        let value = trimmed
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| CaptureError::NotNumeric(trimmed.to_string()))?;
        if value <= 0.0 {
            return Err(CaptureError::NotPositive);
        }
        Ok(value)
    }

    /// Submission stays disabled until the input is a positive number.
    pub fn can_submit(&self) -> bool {
        self.parsed_value().is_ok()
    }

    pub fn submit(&self) -> Result<DialogOutcome, CaptureError> {
        let package_offered = self.parsed_value()?;
        Ok(DialogOutcome::Submitted(StatusPatch {
            status: self.target,
            package_offered: Some(package_offered),
        }))
    }

    /// Discards whatever was typed.
    pub fn cancel(&mut self) -> DialogOutcome {
        self.input.clear();
        DialogOutcome::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dialog() -> CaptureDialog {
        CaptureDialog::open(ApplicationId(42), "Asha Rao", Stage::Interview, Stage::Selected)
    }

    #[test]
    fn submit_disabled_until_positive_number() {
        let mut dialog = dialog();
        assert!(!dialog.can_submit());
        assert_eq!(dialog.submit(), Err(CaptureError::Missing));

        dialog.set_input("twelve");
        assert_eq!(
            dialog.submit(),
            Err(CaptureError::NotNumeric("twelve".to_string()))
        );

        dialog.set_input("-4");
        assert_eq!(dialog.submit(), Err(CaptureError::NotPositive));

        dialog.set_input("NaN");
        assert!(matches!(dialog.submit(), Err(CaptureError::NotNumeric(_))));

        dialog.set_input(" 12.5 ");
        assert!(dialog.can_submit());
    }

    #[test]
    fn submitted_value_keeps_input_precision() {
        let mut dialog = dialog();
        dialog.set_input("12.5");
        assert_eq!(
            dialog.submit(),
            Ok(DialogOutcome::Submitted(StatusPatch::select(12.5)))
        );

        dialog.set_input("7.123456789");
        match dialog.submit() {
            Ok(DialogOutcome::Submitted(patch)) => {
                assert_eq!(patch.package_offered, Some(7.123456789));
            }
            other => panic!("expected submission, got {other:?}"),
        }
    }

    #[test]
    fn cancel_discards_input() {
        let mut dialog = dialog();
        dialog.set_input("9");
        assert_eq!(dialog.cancel(), DialogOutcome::Cancelled);
        assert_eq!(dialog.input(), "");
    }

    #[test]
    fn prompt_names_the_candidate() {
        assert!(dialog().prompt().contains("Asha Rao"));
    }
}
