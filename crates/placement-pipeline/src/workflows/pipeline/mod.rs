//! Applicant pipeline: stage registry, transition rules, the optimistic store, the
//! drag-drop session and the sync plumbing that keeps it aligned with the server.

pub mod board;
pub mod controller;
pub mod dialog;
pub mod domain;
pub mod export;
pub mod http;
pub mod runtime;
pub mod stage;
pub mod store;
pub mod sync;
pub mod transition;

#[cfg(test)]
mod tests;

pub use board::{
    BoardError, CommitOutcome, JobContext, NoticePublisher, PendingCommit, PipelineBoard,
    PipelineNotice, RefreshOutcome, RefreshTicket,
};
pub use controller::{
    CommitRequest, ControllerError, DragCard, DragController, DragState, DropOutcome, DropTarget,
};
pub use dialog::{CaptureDialog, CaptureError, DialogOutcome};
pub use domain::{Application, ApplicationId, JobId, PatchError, StatusPatch};
pub use export::{write_selected_csv, ExportError};
pub use http::HttpPipelineClient;
pub use runtime::{BoardCommand, BoardSnapshot, DragPhase, PipelineHandle, PipelineRuntime};
pub use stage::{registry, Stage, StageDescriptor, UnknownStage};
pub use store::{
    OptimisticMutation, PipelineStore, PreviousFields, ReconcileReport, RefreshPolicy,
    RollbackOutcome, StageColumn, StageCount, StoreError,
};
pub use sync::{ApiScope, CommitResult, PipelineApi, SyncError};
pub use transition::{can_transition, TransitionCheck};
