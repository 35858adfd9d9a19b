use std::io::Write;

use serde::Serialize;

use super::domain::Application;
use super::stage::Stage;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("csv write failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("flush failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Serialize)]
struct SelectedRow<'a> {
    application_id: u64,
    student_name: &'a str,
    student_email: &'a str,
    student_mobile: &'a str,
    package_offered: Option<f64>,
}

/// Writes the candidates sitting in `Selected`, in board order. Returns the row count.
pub fn write_selected_csv<W: Write>(
    writer: W,
    applications: &[Application],
) -> Result<usize, ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    let mut rows = 0;

    for application in applications
        .iter()
        .filter(|app| app.stage() == Stage::Selected)
    {
        csv_writer.serialize(SelectedRow {
            application_id: application.id.0,
            student_name: &application.student_name,
            student_email: &application.student_email,
            student_mobile: application.student_mobile.as_deref().unwrap_or(""),
            package_offered: application.package_offered,
        })?;
        rows += 1;
    }

    if rows == 0 {
        csv_writer.write_record([
            "application_id",
            "student_name",
            "student_email",
            "student_mobile",
            "package_offered",
        ])?;
    }

    csv_writer.flush()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::pipeline::ApplicationId;

    #[test]
    fn exports_only_selected_candidates() {
        let applications = vec![
            Application::new(ApplicationId(1), "Asha Rao", "asha@example.edu")
                .with_status(Stage::Selected)
                .with_package(12.5),
            Application::new(ApplicationId(2), "Dev Patel", "dev@example.edu")
                .with_status(Stage::Interview),
        ];

        let mut buffer = Vec::new();
        let rows = write_selected_csv(&mut buffer, &applications).expect("export succeeds");
        let text = String::from_utf8(buffer).expect("utf8");

        assert_eq!(rows, 1);
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("application_id,student_name,student_email,student_mobile,package_offered")
        );
        assert_eq!(lines.next(), Some("1,Asha Rao,asha@example.edu,,12.5"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn empty_export_still_has_header() {
        let mut buffer = Vec::new();
        let rows = write_selected_csv(&mut buffer, &[]).expect("export succeeds");
        assert_eq!(rows, 0);
        assert!(String::from_utf8(buffer)
            .expect("utf8")
            .starts_with("application_id,"));
    }
}
