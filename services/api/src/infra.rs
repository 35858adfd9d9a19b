use metrics_exporter_prometheus::PrometheusHandle;
use placement_pipeline::workflows::pipeline::{
    ApiScope, Application, ApplicationId, JobId, NoticePublisher, PatchError, PipelineNotice, Stage,
    StatusPatch,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum CollaboratorError {
    #[error("application {0} not found")]
    UnknownApplication(ApplicationId),
    #[error(transparent)]
    InvalidPatch(#[from] PatchError),
    #[error("status updates are temporarily unavailable")]
    Unavailable,
}

/// Process-local stand-in for the placement REST service.
#[derive(Default, Clone)]
pub(crate) struct InMemoryCollaborator {
    jobs: Arc<Mutex<BTreeMap<JobId, Vec<Application>>>>,
    reject_next_update: Arc<AtomicBool>,
}

pub(crate) const DEMO_JOB: JobId = JobId(101);
pub(crate) const SECOND_JOB: JobId = JobId(102);

impl InMemoryCollaborator {
    pub(crate) fn seeded() -> Self {
        let collaborator = Self::default();
        let mut untracked =
            Application::new(ApplicationId(9), "Meera Iyer", "meera@example.edu");
        untracked.status = None;

        {
            let mut jobs = collaborator.jobs.lock().expect("collaborator mutex poisoned");
            jobs.insert(
                DEMO_JOB,
                vec![
                    Application::new(ApplicationId(42), "Asha Rao", "asha@example.edu"),
                    Application::new(ApplicationId(15), "Noor Khan", "noor@example.edu")
                        .with_status(Stage::Shortlisted),
                    Application::new(ApplicationId(7), "Dev Patel", "dev@example.edu")
                        .with_status(Stage::Interview),
                    Application::new(ApplicationId(8), "Kiran Das", "kiran@example.edu")
                        .with_status(Stage::Selected)
                        .with_package(9.0),
                    untracked,
                ],
            );
            jobs.insert(
                SECOND_JOB,
                vec![
                    Application::new(ApplicationId(100), "Ravi Menon", "ravi@example.edu"),
                    Application::new(ApplicationId(103), "Sara Thomas", "sara@example.edu")
                        .with_status(Stage::Rejected),
                ],
            );
        }
        collaborator
    }

    pub(crate) fn applications(&self, job_id: JobId) -> Vec<Application> {
        let guard = self.jobs.lock().expect("collaborator mutex poisoned");
        guard.get(&job_id).cloned().unwrap_or_default()
    }

    /// The next status update fails once with [`CollaboratorError::Unavailable`].
    pub(crate) fn reject_next_update(&self) {
        self.reject_next_update.store(true, Ordering::SeqCst);
    }

    pub(crate) fn update_status(
        &self,
        id: ApplicationId,
        patch: &StatusPatch,
    ) -> Result<Application, CollaboratorError> {
        patch.validate()?;
        if self.reject_next_update.swap(false, Ordering::SeqCst) {
            warn!(application_id = %id, "rejecting status update");
            return Err(CollaboratorError::Unavailable);
        }

        let mut guard = self.jobs.lock().expect("collaborator mutex poisoned");
        let record = guard
            .values_mut()
            .flat_map(|applications| applications.iter_mut())
            .find(|application| application.id == id)
            .ok_or(CollaboratorError::UnknownApplication(id))?;
        record.status = Some(patch.status);
        record.package_offered = patch.package_offered;
        info!(application_id = %id, status = %patch.status, "status stored");
        Ok(record.clone())
    }
}

/// Prints notices to the terminal the way a toast would surface them.
#[derive(Default, Clone)]
pub(crate) struct StdoutNotices {
    events: Arc<Mutex<Vec<PipelineNotice>>>,
}

impl NoticePublisher for StdoutNotices {
    fn publish(&self, notice: PipelineNotice) {
        println!("  ! {}", notice.message());
        self.events
            .lock()
            .expect("notice mutex poisoned")
            .push(notice);
    }
}

impl StdoutNotices {
    pub(crate) fn events(&self) -> Vec<PipelineNotice> {
        self.events.lock().expect("notice mutex poisoned").clone()
    }
}

pub(crate) fn parse_stage(raw: &str) -> Result<Stage, String> {
    raw.parse::<Stage>().map_err(|err| {
        let known: Vec<_> = Stage::ordered().iter().map(|stage| stage.id()).collect();
        format!("{err} (expected one of {})", known.join(", "))
    })
}

pub(crate) fn parse_scope(raw: &str) -> Result<ApiScope, String> {
    ApiScope::parse(raw)
        .ok_or_else(|| format!("unknown scope '{raw}' (expected company, officer or admin)"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_applies_patch_to_seeded_record() {
        let collaborator = InMemoryCollaborator::seeded();
        let updated = collaborator
            .update_status(ApplicationId(7), &StatusPatch::select(14.0))
            .expect("update succeeds");
        assert_eq!(updated.status, Some(Stage::Selected));
        assert_eq!(
            collaborator.applications(DEMO_JOB)[2].package_offered,
            Some(14.0)
        );
    }

    #[test]
    fn rejected_update_fails_once() {
        let collaborator = InMemoryCollaborator::seeded();
        collaborator.reject_next_update();
        let patch = StatusPatch::move_to(Stage::Shortlisted);
        assert!(matches!(
            collaborator.update_status(ApplicationId(42), &patch),
            Err(CollaboratorError::Unavailable)
        ));
        assert!(collaborator.update_status(ApplicationId(42), &patch).is_ok());
    }

    #[test]
    fn parse_stage_lists_known_ids_on_error() {
        assert_eq!(parse_stage("interview"), Ok(Stage::Interview));
        let err = parse_stage("offer").expect_err("unknown stage");
        assert!(err.contains("SELECTED"));
    }
}
