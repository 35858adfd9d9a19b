use std::mem;

use tracing::debug;

use super::dialog::{CaptureDialog, CaptureError, DialogOutcome};
use super::domain::{Application, ApplicationId, StatusPatch};
use super::stage::Stage;
use super::transition::can_transition;

/// Card picked up at the start of a drag session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragCard {
    pub application_id: ApplicationId,
    pub student_name: String,
    pub origin: Stage,
}

impl DragCard {
    pub fn of(application: &Application) -> Self {
        Self {
            application_id: application.id,
            student_name: application.student_name.clone(),
            origin: application.stage(),
        }
    }
}

/// A transition ready to be applied locally and persisted remotely.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommitRequest {
    pub application_id: ApplicationId,
    pub origin: Stage,
    pub patch: StatusPatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget {
    Column(Stage),
    Outside,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging(DragCard),
    AwaitingCapture(CaptureDialog),
    Committing(CommitRequest),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DropOutcome {
    /// Dropped outside the board or on the card's own column.
    Cancelled,
    AwaitingCapture(CaptureDialog),
    Commit(CommitRequest),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControllerError {
    #[error("no card is being dragged")]
    NotDragging,
    #[error("no package dialog is open")]
    NotAwaitingCapture,
    #[error("finish or cancel the open package dialog first")]
    CaptureOpen,
    #[error("a transition is still being committed")]
    CommitInProgress,
    #[error(transparent)]
    Capture(#[from] CaptureError),
}

/// Finite-state machine over a single drag session. Every session ends in `Idle`.
#[derive(Debug, Default)]
pub struct DragController {
    state: DragState,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, DragState::Idle)
    }

    pub fn dialog(&self) -> Option<&CaptureDialog> {
        match &self.state {
            DragState::AwaitingCapture(dialog) => Some(dialog),
            _ => None,
        }
    }

    /// Starts a fresh session; a card already in hand is simply replaced.
    pub fn pick_up(&mut self, application: &Application) -> Result<(), ControllerError> {
        match self.state {
            DragState::AwaitingCapture(_) => Err(ControllerError::CaptureOpen),
            DragState::Committing(_) => Err(ControllerError::CommitInProgress),
            DragState::Idle | DragState::Dragging(_) => {
                let card = DragCard::of(application);
                debug!(application_id = %card.application_id, origin = %card.origin, "drag started");
                self.state = DragState::Dragging(card);
                Ok(())
            }
        }
    }

    pub fn drop_on(&mut self, target: DropTarget) -> Result<DropOutcome, ControllerError> {
        let card = match mem::take(&mut self.state) {
            DragState::Dragging(card) => card,
            other => {
                self.state = other;
                return Err(ControllerError::NotDragging);
            }
        };

        let stage = match target {
            DropTarget::Column(stage) => stage,
            DropTarget::Outside => {
                debug!(application_id = %card.application_id, "dropped outside the board");
                return Ok(DropOutcome::Cancelled);
            }
        };

        let check = can_transition(card.origin, stage);
        if !check.allowed {
            debug!(application_id = %card.application_id, %stage, "dropped on its own column");
            return Ok(DropOutcome::Cancelled);
        }

        if check.requires_capture {
            let dialog =
                CaptureDialog::open(card.application_id, card.student_name, card.origin, stage);
            self.state = DragState::AwaitingCapture(dialog.clone());
            return Ok(DropOutcome::AwaitingCapture(dialog));
        }

        let request = CommitRequest {
            application_id: card.application_id,
            origin: card.origin,
            patch: StatusPatch::move_to(stage),
        };
        self.state = DragState::Committing(request);
        Ok(DropOutcome::Commit(request))
    }

    /// Keeps the dialog open with the rejected input when validation fails.
    pub fn submit_capture(&mut self, raw: &str) -> Result<CommitRequest, ControllerError> {
        let DragState::AwaitingCapture(dialog) = &mut self.state else {
            return Err(ControllerError::NotAwaitingCapture);
        };
        dialog.set_input(raw);

        let patch = match dialog.submit()? {
            DialogOutcome::Submitted(patch) => patch,
            DialogOutcome::Cancelled => return Err(ControllerError::NotAwaitingCapture),
        };
        let request = CommitRequest {
            application_id: dialog.application_id(),
            origin: dialog.origin(),
            patch,
        };
        self.state = DragState::Committing(request);
        Ok(request)
    }

    /// Card returns to its original column; nothing is mutated.
    pub fn cancel_capture(&mut self) -> Result<ApplicationId, ControllerError> {
        match mem::take(&mut self.state) {
            DragState::AwaitingCapture(mut dialog) => {
                dialog.cancel();
                debug!(application_id = %dialog.application_id(), "package dialog dismissed");
                Ok(dialog.application_id())
            }
            other => {
                self.state = other;
                Err(ControllerError::NotAwaitingCapture)
            }
        }
    }

    pub fn finish_commit(&mut self) -> Option<CommitRequest> {
        match mem::take(&mut self.state) {
            DragState::Committing(request) => Some(request),
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Drops whatever session is open, e.g. when the job context changes.
    pub fn abort(&mut self) {
        self.state = DragState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> Application {
        Application::new(ApplicationId(42), "Asha Rao", "asha@example.edu")
    }

    #[test]
    fn drop_on_same_column_cancels_without_commit() {
        let mut controller = DragController::new();
        controller.pick_up(&candidate()).expect("pick up");
        let outcome = controller
            .drop_on(DropTarget::Column(Stage::Applied))
            .expect("drop");
        assert_eq!(outcome, DropOutcome::Cancelled);
        assert!(controller.is_idle());
    }

    #[test]
    fn drop_outside_cancels() {
        let mut controller = DragController::new();
        controller.pick_up(&candidate()).expect("pick up");
        assert_eq!(
            controller.drop_on(DropTarget::Outside),
            Ok(DropOutcome::Cancelled)
        );
        assert!(controller.is_idle());
    }

    #[test]
    fn drop_on_other_column_requests_commit() {
        let mut controller = DragController::new();
        controller.pick_up(&candidate()).expect("pick up");
        let outcome = controller
            .drop_on(DropTarget::Column(Stage::Interview))
            .expect("drop");
        let DropOutcome::Commit(request) = outcome else {
            panic!("expected commit, got {outcome:?}");
        };
        assert_eq!(request.patch, StatusPatch::move_to(Stage::Interview));
        assert_eq!(request.origin, Stage::Applied);
        assert!(matches!(controller.state(), DragState::Committing(_)));
        assert_eq!(controller.finish_commit(), Some(request));
        assert!(controller.is_idle());
    }

    #[test]
    fn selected_drop_waits_for_capture() {
        let mut controller = DragController::new();
        controller.pick_up(&candidate()).expect("pick up");
        let outcome = controller
            .drop_on(DropTarget::Column(Stage::Selected))
            .expect("drop");
        assert!(matches!(outcome, DropOutcome::AwaitingCapture(ref dialog)
            if dialog.student_name() == "Asha Rao" && dialog.target() == Stage::Selected));

        assert_eq!(
            controller.pick_up(&candidate()),
            Err(ControllerError::CaptureOpen)
        );

        assert_eq!(
            controller.submit_capture("abc"),
            Err(ControllerError::Capture(CaptureError::NotNumeric(
                "abc".to_string()
            )))
        );
        assert_eq!(controller.dialog().map(CaptureDialog::input), Some("abc"));

        let request = controller.submit_capture("12.5").expect("valid package");
        assert_eq!(request.patch, StatusPatch::select(12.5));
        assert!(matches!(controller.state(), DragState::Committing(_)));
    }

    #[test]
    fn cancelling_capture_returns_to_idle() {
        let mut controller = DragController::new();
        controller.pick_up(&candidate()).expect("pick up");
        controller
            .drop_on(DropTarget::Column(Stage::Selected))
            .expect("drop");
        assert_eq!(controller.cancel_capture(), Ok(ApplicationId(42)));
        assert!(controller.is_idle());
        assert_eq!(
            controller.cancel_capture(),
            Err(ControllerError::NotAwaitingCapture)
        );
    }

    #[test]
    fn drop_without_pick_up_is_rejected() {
        let mut controller = DragController::new();
        assert_eq!(
            controller.drop_on(DropTarget::Column(Stage::Rejected)),
            Err(ControllerError::NotDragging)
        );
        assert!(controller.is_idle());
    }

    #[test]
    fn second_pick_up_starts_fresh_session() {
        let mut controller = DragController::new();
        controller.pick_up(&candidate()).expect("pick up");
        let other = Application::new(ApplicationId(7), "Dev Patel", "dev@example.edu")
            .with_status(Stage::Interview);
        controller.pick_up(&other).expect("pick up replaces");
        assert!(matches!(controller.state(), DragState::Dragging(card)
            if card.application_id == ApplicationId(7) && card.origin == Stage::Interview));
    }
}
