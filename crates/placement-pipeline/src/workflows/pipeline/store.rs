use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::domain::{Application, ApplicationId, PatchError, StatusPatch};
use super::stage::Stage;

/// How a polled snapshot treats records that still have a local edit in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// Snapshot wins unconditionally; an unconfirmed local move can be lost.
    Overwrite,
    /// Records with an unconfirmed local move keep their local stage fields.
    #[default]
    PreserveInFlight,
}

impl RefreshPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Some(Self::Overwrite),
            "preserve_in_flight" | "preserve-in-flight" | "preserve" => {
                Some(Self::PreserveInFlight)
            }
            _ => None,
        }
    }
}

/// One board column as rendered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageColumn {
    pub stage: Stage,
    pub label: &'static str,
    pub applications: Vec<Application>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageCount {
    pub stage: Stage,
    pub count: usize,
}

/// Fields an optimistic move overwrites.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviousFields {
    pub status: Option<Stage>,
    pub package_offered: Option<f64>,
}

impl PreviousFields {
    fn of(application: &Application) -> Self {
        Self {
            status: application.status,
            package_offered: application.package_offered,
        }
    }

    fn restore_onto(self, application: &mut Application) {
        application.status = self.status;
        application.package_offered = self.package_offered;
    }
}

/// Receipt for a local edit applied ahead of the server acknowledgement.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimisticMutation {
    pub application_id: ApplicationId,
    pub patch: StatusPatch,
    pub previous: PreviousFields,
    pub revision: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// Pre-mutation values are back on the record.
    Restored,
    /// A later local move on the same record owns the fields now.
    Superseded,
    /// A refresh replaced the record after the edit; the server view stands.
    Discarded,
    /// The record is no longer on the board.
    Missing,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub total: usize,
    pub preserved: Vec<ApplicationId>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("application {0} is not on the board")]
    UnknownApplication(ApplicationId),
    #[error(transparent)]
    InvalidPatch(#[from] PatchError),
}

#[derive(Debug, Clone)]
struct PendingEdit {
    application_id: ApplicationId,
    previous: PreviousFields,
}

/// Owned application state for the active job context.
///
/// Writes go through `apply_optimistic`, `acknowledge`, `rollback`, `replace_all` and
/// `reconcile`; everything else is a read-only projection.
#[derive(Debug, Default)]
pub struct PipelineStore {
    applications: Vec<Application>,
    /// Latest local revision written onto each record.
    revisions: HashMap<ApplicationId, u64>,
    /// Unacknowledged edits keyed by revision, oldest first.
    pending: BTreeMap<u64, PendingEdit>,
    next_revision: u64,
    /// Bumped on every local write to a record; see [`PipelineStore::watermark`].
    write_clock: u64,
    last_write: HashMap<ApplicationId, u64>,
}

impl PipelineStore {
    pub fn new(applications: Vec<Application>) -> Self {
        Self {
            applications,
            ..Self::default()
        }
    }

    pub fn applications(&self) -> &[Application] {
        &self.applications
    }

    pub fn get(&self, id: ApplicationId) -> Option<&Application> {
        self.applications.iter().find(|app| app.id == id)
    }

    pub fn len(&self) -> usize {
        self.applications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applications.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    pub fn is_in_flight(&self, id: ApplicationId) -> bool {
        self.pending.values().any(|edit| edit.application_id == id)
    }

    /// Position of the latest local write. A snapshot requested at this mark cannot
    /// know about any write made after it.
    pub fn watermark(&self) -> u64 {
        self.write_clock
    }

    fn touch(&mut self, id: ApplicationId) {
        self.write_clock += 1;
        self.last_write.insert(id, self.write_clock);
    }

    fn written_since(&self, id: ApplicationId, mark: u64) -> bool {
        self.last_write.get(&id).is_some_and(|written| *written > mark)
    }

    /// Partition into the registry's columns. Not cached.
    pub fn group_by_stage(&self) -> Vec<StageColumn> {
        Stage::ordered()
            .into_iter()
            .map(|stage| StageColumn {
                stage,
                label: stage.label(),
                applications: self
                    .applications
                    .iter()
                    .filter(|app| app.stage() == stage)
                    .cloned()
                    .collect(),
            })
            .collect()
    }

    pub fn column_counts(&self) -> Vec<StageCount> {
        Stage::ordered()
            .into_iter()
            .map(|stage| StageCount {
                stage,
                count: self
                    .applications
                    .iter()
                    .filter(|app| app.stage() == stage)
                    .count(),
            })
            .collect()
    }

    pub fn apply_optimistic(
        &mut self,
        id: ApplicationId,
        patch: &StatusPatch,
    ) -> Result<OptimisticMutation, StoreError> {
        patch.validate()?;
        let application = self
            .applications
            .iter_mut()
            .find(|app| app.id == id)
            .ok_or(StoreError::UnknownApplication(id))?;

        let previous = PreviousFields::of(application);
        application.status = Some(patch.status);
        application.package_offered = if patch.status == Stage::Selected {
            patch.package_offered
        } else {
            None
        };

        self.next_revision += 1;
        let revision = self.next_revision;
        self.revisions.insert(id, revision);
        self.touch(id);
        self.pending.insert(
            revision,
            PendingEdit {
                application_id: id,
                previous,
            },
        );

        debug!(application_id = %id, status = %patch.status, revision, "optimistic update applied");
        Ok(OptimisticMutation {
            application_id: id,
            patch: *patch,
            previous,
            revision,
        })
    }

    /// The server accepted the edit.
    pub fn acknowledge(&mut self, mutation: &OptimisticMutation) {
        if self.pending.remove(&mutation.revision).is_some() {
            self.touch(mutation.application_id);
        }
    }

    pub fn rollback(&mut self, mutation: &OptimisticMutation) -> RollbackOutcome {
        let id = mutation.application_id;
        let Some(edit) = self.pending.remove(&mutation.revision) else {
            return RollbackOutcome::Discarded;
        };

        // A newer unconfirmed edit was captured on top of this one; it inherits our base.
        if let Some((_, later)) = self
            .pending
            .range_mut(mutation.revision + 1..)
            .find(|(_, later)| later.application_id == id)
        {
            later.previous = edit.previous;
            return RollbackOutcome::Superseded;
        }

        if self.revisions.get(&id) != Some(&mutation.revision) {
            return RollbackOutcome::Superseded;
        }

        let Some(application) = self.applications.iter_mut().find(|app| app.id == id) else {
            return RollbackOutcome::Missing;
        };
        edit.previous.restore_onto(application);
        self.touch(id);

        let still_applied = self
            .pending
            .iter()
            .rev()
            .find(|(_, other)| other.application_id == id)
            .map(|(revision, _)| *revision);
        match still_applied {
            Some(revision) => {
                self.revisions.insert(id, revision);
            }
            None => {
                self.revisions.remove(&id);
            }
        }

        warn!(application_id = %id, revision = mutation.revision, "optimistic update rolled back");
        RollbackOutcome::Restored
    }

    /// Swap in the server's view wholesale, dropping any local bookkeeping.
    pub fn replace_all(&mut self, applications: Vec<Application>) {
        if !self.pending.is_empty() {
            debug!(
                in_flight = self.pending.len(),
                "snapshot replaced records with unconfirmed local edits"
            );
        }
        self.applications = applications;
        self.revisions.clear();
        self.pending.clear();
        self.last_write.clear();
    }

    /// Applies a snapshot requested at `requested_at` (a [`PipelineStore::watermark`]).
    ///
    /// Under `PreserveInFlight` a record keeps its local stage fields while an edit is
    /// unacknowledged or when it was written locally after the snapshot was requested.
    pub fn reconcile(
        &mut self,
        mut snapshot: Vec<Application>,
        policy: RefreshPolicy,
        requested_at: u64,
    ) -> ReconcileReport {
        let total = snapshot.len();
        if policy == RefreshPolicy::Overwrite {
            self.replace_all(snapshot);
            return ReconcileReport {
                total,
                preserved: Vec::new(),
            };
        }

        let mut preserved = Vec::new();
        for incoming in snapshot.iter_mut() {
            let id = incoming.id;
            let newer_locally = self.written_since(id, requested_at);
            match self
                .pending
                .values_mut()
                .find(|edit| edit.application_id == id)
            {
                // Rolling back should land on the server's latest values, not on stale ones.
                Some(base) if !newer_locally => base.previous = PreviousFields::of(incoming),
                Some(_) => {}
                None if newer_locally => {}
                None => continue,
            }
            if let Some(local) = self.applications.iter().find(|app| app.id == id) {
                incoming.status = local.status;
                incoming.package_offered = local.package_offered;
            }
            preserved.push(id);
        }

        let present: HashSet<ApplicationId> = snapshot.iter().map(|app| app.id).collect();
        self.pending
            .retain(|_, edit| present.contains(&edit.application_id));
        self.revisions.retain(|id, _| present.contains(id));
        self.last_write.retain(|id, _| present.contains(id));
        self.applications = snapshot;

        if !preserved.is_empty() {
            debug!(preserved = preserved.len(), "kept local edits the snapshot had not seen");
        }
        ReconcileReport { total, preserved }
    }
}
