use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use super::board::{
    BoardError, JobContext, NoticePublisher, PendingCommit, PipelineBoard, RefreshTicket,
};
use super::controller::{CommitRequest, DragState, DropOutcome, DropTarget};
use super::domain::{Application, ApplicationId, JobId};
use super::stage::Stage;
use super::store::StageColumn;
use super::sync::{CommitResult, PipelineApi, SyncError};

const COMMAND_BUFFER: usize = 32;

/// Requests accepted by the board's event loop.
pub enum BoardCommand {
    SwitchJob {
        job_id: JobId,
        reply: oneshot::Sender<JobContext>,
    },
    PickUp {
        application_id: ApplicationId,
        reply: oneshot::Sender<Result<(), BoardError>>,
    },
    Drop {
        target: DropTarget,
        reply: oneshot::Sender<Result<DropOutcome, BoardError>>,
    },
    SubmitCapture {
        input: String,
        reply: oneshot::Sender<Result<(), BoardError>>,
    },
    CancelCapture {
        reply: oneshot::Sender<Result<ApplicationId, BoardError>>,
    },
    RefreshNow,
    Snapshot {
        reply: oneshot::Sender<BoardSnapshot>,
    },
    Shutdown,
}

enum LoopEvent {
    CommitFinished(PendingCommit, CommitResult),
    RefreshFinished(RefreshTicket, Result<Vec<Application>, SyncError>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DragPhase {
    Idle,
    Dragging,
    AwaitingCapture,
    Committing,
}

impl From<&DragState> for DragPhase {
    fn from(state: &DragState) -> Self {
        match state {
            DragState::Idle => Self::Idle,
            DragState::Dragging(_) => Self::Dragging,
            DragState::AwaitingCapture(_) => Self::AwaitingCapture,
            DragState::Committing(_) => Self::Committing,
        }
    }
}

/// Read-only view of the board handed out by the runtime.
#[derive(Debug, Clone, Serialize)]
pub struct BoardSnapshot {
    pub context: Option<JobContext>,
    pub columns: Vec<StageColumn>,
    pub drag: DragPhase,
    pub in_flight: usize,
}

impl BoardSnapshot {
    pub fn column(&self, stage: Stage) -> Option<&StageColumn> {
        self.columns.iter().find(|column| column.stage == stage)
    }

    pub fn stage_of(&self, id: ApplicationId) -> Option<Stage> {
        self.columns.iter().find_map(|column| {
            column
                .applications
                .iter()
                .any(|app| app.id == id)
                .then_some(column.stage)
        })
    }
}

/// Single-task event loop owning a [`PipelineBoard`].
///
/// User commands, commit results and timer-driven refreshes all funnel through one
/// `select!`, so the store only ever has one writer. Network calls run on spawned tasks
/// and report back through an internal channel.
pub struct PipelineRuntime<C, N> {
    board: PipelineBoard<C, N>,
    poll_interval: Duration,
    commands: mpsc::Receiver<BoardCommand>,
    events_tx: mpsc::UnboundedSender<LoopEvent>,
    events_rx: mpsc::UnboundedReceiver<LoopEvent>,
}

impl<C, N> PipelineRuntime<C, N>
where
    C: PipelineApi + 'static,
    N: NoticePublisher + 'static,
{
    pub fn spawn(
        board: PipelineBoard<C, N>,
        poll_interval: Duration,
    ) -> (PipelineHandle, JoinHandle<PipelineBoard<C, N>>) {
        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let runtime = Self {
            board,
            poll_interval,
            commands,
            events_tx,
            events_rx,
        };
        let task = tokio::spawn(runtime.run());
        (PipelineHandle { commands: commands_tx }, task)
    }

    async fn run(mut self) -> PipelineBoard<C, N> {
        let first_tick = time::Instant::now() + self.poll_interval;
        let mut ticker = time::interval_at(first_tick, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = self.poll_interval.as_secs(), "pipeline runtime started");

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(BoardCommand::Shutdown) | None => break,
                    Some(BoardCommand::SwitchJob { job_id, reply }) => {
                        let context = self.board.switch_context(job_id);
                        self.spawn_refresh();
                        ticker.reset();
                        let _ = reply.send(context);
                    }
                    Some(command) => self.handle(command),
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event),
                _ = ticker.tick() => self.spawn_refresh(),
            }
        }

        info!("pipeline runtime stopped");
        self.board
    }

    fn handle(&mut self, command: BoardCommand) {
        match command {
            BoardCommand::PickUp {
                application_id,
                reply,
            } => {
                let _ = reply.send(self.board.pick_up(application_id));
            }
            BoardCommand::Drop { target, reply } => {
                let result = self.board.drop_on(target).and_then(|outcome| {
                    if let DropOutcome::Commit(request) = outcome {
                        self.dispatch_commit(request)?;
                    }
                    Ok(outcome)
                });
                let _ = reply.send(result);
            }
            BoardCommand::SubmitCapture { input, reply } => {
                let result = self
                    .board
                    .submit_capture(&input)
                    .and_then(|request| self.dispatch_commit(request));
                let _ = reply.send(result);
            }
            BoardCommand::CancelCapture { reply } => {
                let _ = reply.send(self.board.cancel_capture());
            }
            BoardCommand::RefreshNow => self.spawn_refresh(),
            BoardCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            BoardCommand::SwitchJob { .. } | BoardCommand::Shutdown => {}
        }
    }

    fn handle_event(&mut self, event: LoopEvent) {
        match event {
            LoopEvent::CommitFinished(pending, result) => {
                let outcome = self.board.complete_commit(pending, result);
                debug!(?outcome, "commit settled");
            }
            LoopEvent::RefreshFinished(ticket, result) => {
                let outcome = self.board.complete_refresh(ticket, result);
                debug!(?outcome, "refresh settled");
            }
        }
    }

    fn dispatch_commit(&mut self, request: CommitRequest) -> Result<(), BoardError> {
        let pending = self.board.begin_commit(request)?;
        let api = self.board.api();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = api
                .update_status(pending.mutation.application_id, &pending.mutation.patch)
                .await;
            let _ = events.send(LoopEvent::CommitFinished(pending, result));
        });
        Ok(())
    }

    fn spawn_refresh(&mut self) {
        let Ok(ticket) = self.board.begin_refresh() else {
            debug!("refresh skipped: no job selected");
            return;
        };
        let api = self.board.api();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = api.fetch_applications(ticket.context.job_id).await;
            let _ = events.send(LoopEvent::RefreshFinished(ticket, result));
        });
    }

    fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            context: self.board.context(),
            columns: self.board.group_by_stage(),
            drag: DragPhase::from(self.board.controller().state()),
            in_flight: self.board.store().in_flight(),
        }
    }
}

/// Cloneable sender side of a running [`PipelineRuntime`].
#[derive(Clone)]
pub struct PipelineHandle {
    commands: mpsc::Sender<BoardCommand>,
}

impl PipelineHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> BoardCommand,
    ) -> Result<T, BoardError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| BoardError::RuntimeStopped)?;
        response.await.map_err(|_| BoardError::RuntimeStopped)
    }

    pub async fn switch_job(&self, job_id: JobId) -> Result<JobContext, BoardError> {
        self.request(|reply| BoardCommand::SwitchJob { job_id, reply })
            .await
    }

    pub async fn pick_up(&self, application_id: ApplicationId) -> Result<(), BoardError> {
        self.request(|reply| BoardCommand::PickUp {
            application_id,
            reply,
        })
        .await?
    }

    pub async fn drop_on(&self, target: DropTarget) -> Result<DropOutcome, BoardError> {
        self.request(|reply| BoardCommand::Drop { target, reply })
            .await?
    }

    pub async fn submit_capture(&self, input: impl Into<String>) -> Result<(), BoardError> {
        let input = input.into();
        self.request(|reply| BoardCommand::SubmitCapture { input, reply })
            .await?
    }

    pub async fn cancel_capture(&self) -> Result<ApplicationId, BoardError> {
        self.request(|reply| BoardCommand::CancelCapture { reply })
            .await?
    }

    pub async fn refresh_now(&self) -> Result<(), BoardError> {
        self.commands
            .send(BoardCommand::RefreshNow)
            .await
            .map_err(|_| BoardError::RuntimeStopped)
    }

    pub async fn snapshot(&self) -> Result<BoardSnapshot, BoardError> {
        self.request(|reply| BoardCommand::Snapshot { reply }).await
    }

    pub async fn shutdown(&self) -> Result<(), BoardError> {
        self.commands
            .send(BoardCommand::Shutdown)
            .await
            .map_err(|_| BoardError::RuntimeStopped)
    }
}
