use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::workflows::pipeline::{
    Application, ApplicationId, JobId, NoticePublisher, PipelineApi, PipelineBoard,
    PipelineNotice, RefreshPolicy, Stage, StatusPatch, SyncError,
};

pub(super) const JOB: JobId = JobId(5);
pub(super) const OTHER_JOB: JobId = JobId(6);

pub(super) fn asha() -> Application {
    Application::new(ApplicationId(42), "Asha Rao", "asha@example.edu")
}

pub(super) fn applications() -> Vec<Application> {
    let mut untracked = Application::new(ApplicationId(9), "Meera Iyer", "meera@example.edu");
    untracked.status = None;

    vec![
        asha(),
        Application::new(ApplicationId(7), "Dev Patel", "dev@example.edu")
            .with_status(Stage::Interview),
        Application::new(ApplicationId(8), "Kiran Das", "kiran@example.edu")
            .with_status(Stage::Selected)
            .with_package(9.0),
        untracked,
    ]
}

pub(super) fn other_job_applications() -> Vec<Application> {
    vec![Application::new(ApplicationId(100), "Ravi Menon", "ravi@example.edu")]
}

/// In-memory collaborator that applies successful updates to its own snapshot.
#[derive(Default)]
pub(super) struct ScriptedApi {
    snapshots: Mutex<HashMap<JobId, Vec<Application>>>,
    updates: Mutex<Vec<(ApplicationId, StatusPatch)>>,
    fail_updates: AtomicBool,
    fail_fetches: AtomicBool,
    fetches: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedApi {
    pub(super) fn with_jobs() -> Self {
        let api = Self::default();
        api.set_snapshot(JOB, applications());
        api.set_snapshot(OTHER_JOB, other_job_applications());
        api
    }

    /// Updates block until a permit is added to the returned semaphore.
    pub(super) fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let api = Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::with_jobs()
        };
        (api, gate)
    }

    pub(super) fn set_snapshot(&self, job_id: JobId, applications: Vec<Application>) {
        self.snapshots
            .lock()
            .expect("snapshot mutex poisoned")
            .insert(job_id, applications);
    }

    pub(super) fn server_stage(&self, job_id: JobId, id: ApplicationId) -> Option<Stage> {
        self.snapshots
            .lock()
            .expect("snapshot mutex poisoned")
            .get(&job_id)
            .and_then(|apps| apps.iter().find(|app| app.id == id))
            .map(Application::stage)
    }

    pub(super) fn updates(&self) -> Vec<(ApplicationId, StatusPatch)> {
        self.updates.lock().expect("update mutex poisoned").clone()
    }

    pub(super) fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub(super) fn fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    pub(super) fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PipelineApi for ScriptedApi {
    async fn fetch_applications(&self, job_id: JobId) -> Result<Vec<Application>, SyncError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(SyncError::Transport("connection refused".to_string()));
        }
        Ok(self
            .snapshots
            .lock()
            .expect("snapshot mutex poisoned")
            .get(&job_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_status(
        &self,
        application_id: ApplicationId,
        patch: &StatusPatch,
    ) -> Result<(), SyncError> {
        self.updates
            .lock()
            .expect("update mutex poisoned")
            .push((application_id, *patch));

        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(SyncError::Status {
                code: 500,
                body: "database offline".to_string(),
            });
        }

        let mut snapshots = self.snapshots.lock().expect("snapshot mutex poisoned");
        for app in snapshots
            .values_mut()
            .flat_map(|apps| apps.iter_mut())
            .filter(|app| app.id == application_id)
        {
            app.status = Some(patch.status);
            app.package_offered = patch.package_offered;
        }
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct MemoryNotices {
    events: Mutex<Vec<PipelineNotice>>,
}

impl MemoryNotices {
    pub(super) fn events(&self) -> Vec<PipelineNotice> {
        self.events.lock().expect("notice mutex poisoned").clone()
    }
}

impl NoticePublisher for MemoryNotices {
    fn publish(&self, notice: PipelineNotice) {
        self.events
            .lock()
            .expect("notice mutex poisoned")
            .push(notice);
    }
}

pub(super) type TestBoard = PipelineBoard<ScriptedApi, MemoryNotices>;

pub(super) fn build_board(
    api: ScriptedApi,
    policy: RefreshPolicy,
) -> (TestBoard, Arc<ScriptedApi>, Arc<MemoryNotices>) {
    let api = Arc::new(api);
    let notices = Arc::new(MemoryNotices::default());
    let board = PipelineBoard::new(Arc::clone(&api), Arc::clone(&notices), policy);
    (board, api, notices)
}

pub(super) const POLL: Duration = Duration::from_secs(15);

/// Lets spawned tasks run without moving the paused clock anywhere near a poll tick.
pub(super) async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
