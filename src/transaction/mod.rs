//! Apply transactions
//!
//! An apply runs in two halves so the sink call can happen outside any
//! lock: [`ApplyController::prepare`] validates the pending edits and
//! builds the next profile store plus its snapshot, then
//! [`ApplyController::complete`] takes the sink's answer and either
//! commits or rolls back. Nothing observable changes until `complete`
//! succeeds.

mod sink;
mod snapshot;
mod status;

pub use sink::{FileSink, MemorySink, SettingsSink, SinkError};
pub use snapshot::{ProfileRecord, SettingsSnapshot, SNAPSHOT_VERSION};
pub use status::{ApplyState, ApplyStatus};

use serde::Serialize;
use settings_path::PathAddress;
use tracing::{info, warn};

use crate::error::{Result, SettingsError};
use crate::profile::ProfileStore;
use crate::tracker::ChangeTracker;

/// Validated commit waiting on the sink
#[derive(Debug)]
pub struct PreparedCommit {
    profile_id: String,
    applied: Vec<PathAddress>,
    restart: bool,
    store: ProfileStore,
    snapshot: SettingsSnapshot,
}

impl PreparedCommit {
    pub fn snapshot(&self) -> &SettingsSnapshot {
        &self.snapshot
    }

    pub fn applied(&self) -> &[PathAddress] {
        &self.applied
    }
}

/// Result of a successful apply
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplyOutcome {
    /// Profile the edits were written into
    pub profile_id: String,

    /// Leaf paths committed, in path order
    pub applied: Vec<PathAddress>,

    /// Restart flag after this apply
    pub restart_required: bool,

    /// Digest of the persisted snapshot; `None` when nothing was written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl ApplyOutcome {
    /// Outcome of an apply with nothing pending.
    pub fn unchanged(profile_id: &str, restart_required: bool) -> Self {
        Self {
            profile_id: profile_id.to_string(),
            applied: Vec::new(),
            restart_required,
            digest: None,
        }
    }
}

/// Owns the apply status and the restart flag
#[derive(Debug, Clone, Default)]
pub struct ApplyController {
    state: ApplyState,
    restart_required: bool,
}

impl ApplyController {
    pub fn new(restart_required: bool) -> Self {
        Self {
            state: ApplyState::default(),
            restart_required,
        }
    }

    pub fn status(&self) -> ApplyStatus {
        self.state.status
    }

    pub fn state(&self) -> &ApplyState {
        &self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.state.last_error.as_deref()
    }

    pub fn is_busy(&self) -> bool {
        self.state.status.is_busy()
    }

    pub fn is_restart_required(&self) -> bool {
        self.restart_required
    }

    /// Clear SAVED back to IDLE. No-op in any other status.
    pub fn acknowledge_saved(&mut self) {
        if self.state.status == ApplyStatus::Saved {
            // Saved → Idle is always valid
            let _ = self.state.transition(ApplyStatus::Idle);
        }
    }

    /// Clear the restart flag; returns whether it was set.
    pub fn acknowledge_restart(&mut self) -> bool {
        std::mem::replace(&mut self.restart_required, false)
    }

    /// Validate pending edits and build the commit.
    ///
    /// Returns `Ok(None)` when nothing is dirty. On validation failure the
    /// status returns to IDLE and the working copy is left as it was.
    pub fn prepare(
        &mut self,
        tracker: &ChangeTracker,
        store: &ProfileStore,
    ) -> Result<Option<PreparedCommit>> {
        if self.is_busy() {
            return Err(SettingsError::OperationInProgress);
        }
        self.acknowledge_saved();
        if !tracker.has_changes() {
            return Ok(None);
        }

        self.state.transition(ApplyStatus::Validating)?;
        match self.build(tracker, store) {
            Ok(prepared) => {
                self.state.transition(ApplyStatus::Saving)?;
                Ok(Some(prepared))
            }
            Err(err) => {
                warn!(error = %err, "apply rejected");
                self.state.fail(&err);
                Err(err)
            }
        }
    }

    fn build(&self, tracker: &ChangeTracker, store: &ProfileStore) -> Result<PreparedCommit> {
        let schema = store.schema();
        let candidate = tracker.committed()?;
        let applied: Vec<PathAddress> = tracker.dirty_paths().iter().cloned().collect();
        schema.validate(&candidate, applied.iter())?;

        let profile_id = store.active_id().to_string();
        let mut next = store.clone();
        let profile = next.get_mut(&profile_id)?;
        for path in &applied {
            profile.document.adopt(&candidate, path)?;
        }
        if profile.is_default() {
            profile.document = profile.document.without_provenance();
        } else {
            profile
                .document
                .settle_lists(&store.default_profile()?.document);
        }

        let restart = applied.iter().any(|p| schema.requires_restart(p));
        let snapshot = SettingsSnapshot::capture(&next, self.restart_required || restart);
        Ok(PreparedCommit {
            profile_id,
            applied,
            restart,
            store: next,
            snapshot,
        })
    }

    /// Give up on a prepared commit before the sink was called.
    pub fn abort(&mut self, prepared: PreparedCommit) {
        info!(
            profile_id = %prepared.profile_id,
            paths = prepared.applied.len(),
            "apply cancelled"
        );
        self.state.fail(&SettingsError::Cancelled);
    }

    /// Finish an apply with the sink's result.
    ///
    /// On success returns the store to install. On failure the status is
    /// IDLE, `last_error` is set, and the caller keeps its old state.
    pub fn complete(
        &mut self,
        prepared: PreparedCommit,
        saved: std::result::Result<(), SinkError>,
    ) -> Result<(ProfileStore, ApplyOutcome)> {
        if let Err(err) = saved {
            let err = SettingsError::from(err);
            warn!(error = %err, "settings not persisted");
            self.state.fail(&err);
            return Err(err);
        }

        self.state.transition(ApplyStatus::Saved)?;
        self.state.last_error = None;
        if prepared.restart {
            self.restart_required = true;
        }

        let digest = prepared.snapshot.digest().ok();
        info!(
            profile_id = %prepared.profile_id,
            paths = prepared.applied.len(),
            restart_required = self.restart_required,
            "settings applied"
        );
        let outcome = ApplyOutcome {
            profile_id: prepared.profile_id,
            applied: prepared.applied,
            restart_required: self.restart_required,
            digest,
        };
        Ok((prepared.store, outcome))
    }
}
