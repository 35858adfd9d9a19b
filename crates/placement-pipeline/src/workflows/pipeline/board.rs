use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::controller::{CommitRequest, ControllerError, DragController, DropOutcome, DropTarget};
use super::domain::{Application, ApplicationId, JobId};
use super::stage::Stage;
use super::store::{
    OptimisticMutation, PipelineStore, ReconcileReport, RefreshPolicy, RollbackOutcome,
    StageColumn, StageCount, StoreError,
};
use super::sync::{CommitResult, PipelineApi, SyncError};

/// Sink for transient, user-visible messages.
pub trait NoticePublisher: Send + Sync {
    fn publish(&self, notice: PipelineNotice);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineNotice {
    CommitFailed {
        application_id: ApplicationId,
        student_name: String,
        attempted: Stage,
        reason: String,
    },
}

impl PipelineNotice {
    pub fn message(&self) -> String {
        match self {
            PipelineNotice::CommitFailed {
                student_name,
                attempted,
                reason,
                ..
            } => format!(
                "Failed to move {student_name} to {}: {reason}",
                attempted.label()
            ),
        }
    }
}

/// Job whose applications are loaded, plus a generation that changes on every switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobContext {
    pub job_id: JobId,
    pub generation: u64,
}

/// An optimistic edit waiting on its remote commit.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCommit {
    pub context: JobContext,
    pub mutation: OptimisticMutation,
    pub student_name: String,
}

/// A snapshot fetch issued for one context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket {
    pub context: JobContext,
    /// Issue order across all refreshes of this board.
    pub sequence: u64,
    /// Store watermark when the fetch was issued.
    pub requested_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Confirmed,
    RolledBack(RollbackOutcome),
    /// The result belongs to a context that is no longer shown.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied(ReconcileReport),
    /// Previous state kept; the next tick tries again.
    Failed(SyncError),
    Stale,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BoardError {
    #[error("no job is selected")]
    NoContext,
    #[error("pipeline runtime has stopped")]
    RuntimeStopped,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Controller(#[from] ControllerError),
}

/// Store, drag session and sync client for the job currently on screen.
pub struct PipelineBoard<C, N> {
    api: Arc<C>,
    notices: Arc<N>,
    store: PipelineStore,
    controller: DragController,
    context: Option<JobContext>,
    generation: u64,
    policy: RefreshPolicy,
    issued_refreshes: u64,
    applied_refresh: u64,
}

impl<C, N> PipelineBoard<C, N>
where
    C: PipelineApi + 'static,
    N: NoticePublisher + 'static,
{
    pub fn new(api: Arc<C>, notices: Arc<N>, policy: RefreshPolicy) -> Self {
        Self {
            api,
            notices,
            store: PipelineStore::default(),
            controller: DragController::new(),
            context: None,
            generation: 0,
            policy,
            issued_refreshes: 0,
            applied_refresh: 0,
        }
    }

    pub fn api(&self) -> Arc<C> {
        Arc::clone(&self.api)
    }

    pub fn context(&self) -> Option<JobContext> {
        self.context
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.policy
    }

    pub fn store(&self) -> &PipelineStore {
        &self.store
    }

    pub fn controller(&self) -> &DragController {
        &self.controller
    }

    pub fn group_by_stage(&self) -> Vec<StageColumn> {
        self.store.group_by_stage()
    }

    pub fn column_counts(&self) -> Vec<StageCount> {
        self.store.column_counts()
    }

    pub fn application(&self, id: ApplicationId) -> Option<&Application> {
        self.store.get(id)
    }

    /// Results tied to the previous context are ignored from here on.
    pub fn switch_context(&mut self, job_id: JobId) -> JobContext {
        self.generation += 1;
        let context = JobContext {
            job_id,
            generation: self.generation,
        };
        self.context = Some(context);
        self.store.replace_all(Vec::new());
        self.controller.abort();
        info!(job_id = %job_id, generation = context.generation, "pipeline context switched");
        context
    }

    fn active_context(&self) -> Result<JobContext, BoardError> {
        self.context.ok_or(BoardError::NoContext)
    }

    fn is_current(&self, context: JobContext) -> bool {
        self.context == Some(context)
    }

    pub fn begin_refresh(&mut self) -> Result<RefreshTicket, BoardError> {
        let context = self.active_context()?;
        self.issued_refreshes += 1;
        Ok(RefreshTicket {
            context,
            sequence: self.issued_refreshes,
            requested_at: self.store.watermark(),
        })
    }

    pub fn complete_refresh(
        &mut self,
        ticket: RefreshTicket,
        result: Result<Vec<Application>, SyncError>,
    ) -> RefreshOutcome {
        if !self.is_current(ticket.context) {
            debug!(job_id = %ticket.context.job_id, "discarding snapshot for previous context");
            return RefreshOutcome::Stale;
        }
        if ticket.sequence <= self.applied_refresh {
            debug!(
                sequence = ticket.sequence,
                applied = self.applied_refresh,
                "discarding snapshot older than the one on screen"
            );
            return RefreshOutcome::Stale;
        }

        match result {
            Ok(snapshot) => {
                self.applied_refresh = ticket.sequence;
                let report = self
                    .store
                    .reconcile(snapshot, self.policy, ticket.requested_at);
                debug!(
                    total = report.total,
                    preserved = report.preserved.len(),
                    "snapshot applied"
                );
                RefreshOutcome::Applied(report)
            }
            Err(err) => {
                warn!(job_id = %ticket.context.job_id, error = %err, "refresh failed; keeping previous state");
                RefreshOutcome::Failed(err)
            }
        }
    }

    pub fn pick_up(&mut self, id: ApplicationId) -> Result<(), BoardError> {
        let application = self
            .store
            .get(id)
            .ok_or(StoreError::UnknownApplication(id))?;
        self.controller.pick_up(application)?;
        Ok(())
    }

    pub fn drop_on(&mut self, target: DropTarget) -> Result<DropOutcome, BoardError> {
        Ok(self.controller.drop_on(target)?)
    }

    /// Whether the open dialog would accept `raw` as its package value.
    pub fn preview_capture(&self, raw: &str) -> Result<bool, BoardError> {
        let dialog = self
            .controller
            .dialog()
            .ok_or(ControllerError::NotAwaitingCapture)?;
        let mut preview = dialog.clone();
        preview.set_input(raw);
        Ok(preview.can_submit())
    }

    pub fn submit_capture(&mut self, raw: &str) -> Result<CommitRequest, BoardError> {
        Ok(self.controller.submit_capture(raw)?)
    }

    pub fn cancel_capture(&mut self) -> Result<ApplicationId, BoardError> {
        Ok(self.controller.cancel_capture()?)
    }

    /// Applies the edit locally and closes the drag session.
    pub fn begin_commit(&mut self, request: CommitRequest) -> Result<PendingCommit, BoardError> {
        let student_name = self
            .store
            .get(request.application_id)
            .map(|app| app.student_name.clone())
            .unwrap_or_default();
        let applied = self
            .active_context()
            .and_then(|context| {
                self.store
                    .apply_optimistic(request.application_id, &request.patch)
                    .map(|mutation| (context, mutation))
                    .map_err(BoardError::from)
            });
        self.controller.finish_commit();

        let (context, mutation) = applied?;
        info!(
            application_id = %request.application_id,
            from = %request.origin,
            to = %request.patch.status,
            "committing transition"
        );
        Ok(PendingCommit {
            context,
            mutation,
            student_name,
        })
    }

    pub fn complete_commit(&mut self, pending: PendingCommit, result: CommitResult) -> CommitOutcome {
        if !self.is_current(pending.context) {
            debug!(
                application_id = %pending.mutation.application_id,
                "commit result for previous context ignored"
            );
            return CommitOutcome::Stale;
        }

        let PendingCommit {
            mutation,
            student_name,
            ..
        } = pending;
        match result {
            Ok(()) => {
                self.store.acknowledge(&mutation);
                CommitOutcome::Confirmed
            }
            Err(err) => {
                let outcome = self.store.rollback(&mutation);
                warn!(
                    application_id = %mutation.application_id,
                    error = %err,
                    ?outcome,
                    "status update failed"
                );
                self.notices.publish(PipelineNotice::CommitFailed {
                    application_id: mutation.application_id,
                    student_name,
                    attempted: mutation.patch.status,
                    reason: err.to_string(),
                });
                CommitOutcome::RolledBack(outcome)
            }
        }
    }

    /// Switches to `job_id` and loads its first snapshot.
    pub async fn load(&mut self, job_id: JobId) -> RefreshOutcome {
        self.switch_context(job_id);
        let ticket = match self.begin_refresh() {
            Ok(ticket) => ticket,
            Err(_) => return RefreshOutcome::Stale,
        };
        let result = self.api.fetch_applications(job_id).await;
        self.complete_refresh(ticket, result)
    }

    pub async fn refresh(&mut self) -> Result<RefreshOutcome, BoardError> {
        let ticket = self.begin_refresh()?;
        let result = self.api.fetch_applications(ticket.context.job_id).await;
        Ok(self.complete_refresh(ticket, result))
    }

    /// Optimistic apply, remote persist, rollback on failure, in one call.
    pub async fn commit(&mut self, request: CommitRequest) -> Result<CommitOutcome, BoardError> {
        let pending = self.begin_commit(request)?;
        let result = self
            .api
            .update_status(pending.mutation.application_id, &pending.mutation.patch)
            .await;
        Ok(self.complete_commit(pending, result))
    }
}
