//! Settings engine facade
//!
//! Ties the profile store, the effective view, the change tracker and the
//! apply controller together behind string-path operations. All reads
//! see the working copy; the stored profiles only change on a successful
//! apply or a profile operation.

use settings_path::PathAddress;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::document::Value;
use crate::error::{Result, SettingsError};
use crate::profile::{Profile, ProfileStore, ProfileSummary};
use crate::resolver::{EffectiveView, OverrideResolver};
use crate::schema::Schema;
use crate::tracker::ChangeTracker;
use crate::transaction::{
    ApplyController, ApplyOutcome, ApplyState, ApplyStatus, MemorySink, PreparedCommit,
    SettingsSink, SettingsSnapshot, SinkError,
};

/// Single-owner settings engine
pub struct SettingsEngine {
    schema: Arc<Schema>,
    sink: Arc<dyn SettingsSink>,
    profiles: ProfileStore,
    effective: EffectiveView,
    tracker: ChangeTracker,
    controller: ApplyController,
}

impl std::fmt::Debug for SettingsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsEngine")
            .field("schema", &self.schema.id())
            .field("active_profile", &self.profiles.active_id())
            .field("dirty", &self.tracker.dirty_paths().len())
            .field("status", &self.controller.status())
            .finish()
    }
}

impl SettingsEngine {
    /// Load state from `sink`, or start from schema defaults when the sink
    /// is empty.
    pub fn open(schema: Arc<Schema>, sink: Arc<dyn SettingsSink>) -> Result<Self> {
        let (profiles, restart_required) = match sink.load()? {
            Some(snapshot) => {
                let store = snapshot.restore(schema.clone())?;
                info!(
                    profiles = store.profiles().len(),
                    active = store.active_id(),
                    "settings loaded"
                );
                (store, snapshot.restart_required)
            }
            None => {
                info!(schema = schema.id(), "no stored settings, starting from defaults");
                (ProfileStore::new(schema.clone()), false)
            }
        };
        Self::from_store(schema, sink, profiles, restart_required)
    }

    /// Engine over an empty in-memory sink.
    pub fn in_memory(schema: Arc<Schema>) -> Result<Self> {
        Self::open(schema, Arc::new(MemorySink::new()))
    }

    fn from_store(
        schema: Arc<Schema>,
        sink: Arc<dyn SettingsSink>,
        profiles: ProfileStore,
        restart_required: bool,
    ) -> Result<Self> {
        let effective = OverrideResolver::resolve(&profiles)?;
        let tracker = ChangeTracker::begin(effective.document().clone());
        Ok(Self {
            schema,
            sink,
            profiles,
            effective,
            tracker,
            controller: ApplyController::new(restart_required),
        })
    }

    // ---- reads ----

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub(crate) fn sink(&self) -> Arc<dyn SettingsSink> {
        self.sink.clone()
    }

    /// Parse `path` and check it names a leaf of the schema.
    fn leaf(&self, path: &str) -> Result<PathAddress> {
        let path = PathAddress::parse(path)?;
        self.schema.leaf_kind(&path)?;
        Ok(path)
    }

    /// Working-copy value at `path`.
    pub fn current_value(&self, path: &str) -> Result<Value> {
        let path = self.leaf(path)?;
        self.tracker.current_value(&path).cloned()
    }

    pub fn is_dirty(&self, path: &str) -> Result<bool> {
        let path = self.leaf(path)?;
        Ok(self.tracker.is_dirty(&path))
    }

    /// Whether the effective value at `path` comes from the active profile
    /// rather than the default profile. Pending edits do not count.
    pub fn is_override(&self, path: &str) -> Result<bool> {
        let path = self.leaf(path)?;
        Ok(self.effective.is_override(&path))
    }

    pub fn dirty_paths(&self) -> Vec<PathAddress> {
        self.tracker.dirty_paths().iter().cloned().collect()
    }

    pub fn has_changes(&self) -> bool {
        self.tracker.has_changes()
    }

    /// Effective view as of the last commit or profile switch.
    pub fn effective(&self) -> &EffectiveView {
        &self.effective
    }

    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    /// Working copy as nested JSON.
    pub fn working_json(&self) -> serde_json::Value {
        self.tracker.working().to_json()
    }

    pub fn list_profiles(&self) -> Vec<ProfileSummary> {
        self.profiles.list()
    }

    pub fn profile(&self, id: &str) -> Result<&Profile> {
        self.profiles.get(id)
    }

    pub fn active_profile_id(&self) -> &str {
        self.profiles.active_id()
    }

    pub fn apply_status(&self) -> ApplyStatus {
        self.controller.status()
    }

    pub fn apply_state(&self) -> &ApplyState {
        self.controller.state()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.controller.last_error()
    }

    pub fn is_restart_required(&self) -> bool {
        self.controller.is_restart_required()
    }

    /// Effective view of any profile, as if it were active.
    pub fn effective_for(&self, profile_id: &str) -> Result<EffectiveView> {
        OverrideResolver::resolve_for(&self.profiles, profile_id)
    }

    /// Leaf paths whose effective values differ between two profiles.
    pub fn diff_profiles(&self, left: &str, right: &str) -> Result<BTreeSet<PathAddress>> {
        let left = self.effective_for(left)?;
        let right = self.effective_for(right)?;
        Ok(left.document().diff(right.document()))
    }

    // ---- mutations ----

    /// Gate shared by every mutating call: reject while an apply is in
    /// flight, and treat any new action as acknowledging SAVED.
    fn begin_mutation(&mut self) -> Result<()> {
        if self.controller.is_busy() {
            return Err(SettingsError::OperationInProgress);
        }
        self.controller.acknowledge_saved();
        Ok(())
    }

    /// Drop the working copy and start over from the effective view.
    fn restart_editing(&mut self) -> Result<()> {
        self.effective = OverrideResolver::resolve(&self.profiles)?;
        self.tracker = ChangeTracker::begin(self.effective.document().clone());
        Ok(())
    }

    /// Discard pending edits and re-snapshot the effective view.
    pub fn begin_editing(&mut self) -> Result<()> {
        self.begin_mutation()?;
        self.restart_editing()
    }

    /// Stage `value` at `path` in the working copy.
    pub fn set_field(&mut self, path: &str, value: impl Into<Value>) -> Result<()> {
        self.begin_mutation()?;
        let path = PathAddress::parse(path)?;
        self.tracker.set_field(&path, value.into())
    }

    /// Stage a value parsed from user text according to the leaf's kind.
    pub fn set_field_text(&mut self, path: &str, text: &str) -> Result<()> {
        let address = self.leaf(path)?;
        let kind = self.schema.leaf_kind(&address)?;
        let value = Value::from_text(kind, text).ok_or_else(|| SettingsError::TypeMismatch {
            path: address.to_string(),
            expected: kind,
            actual: format!("text {:?}", text),
        })?;
        self.set_field(path, value)
    }

    pub fn reset_field(&mut self, path: &str) -> Result<()> {
        self.begin_mutation()?;
        let path = PathAddress::parse(path)?;
        self.tracker.reset_field(&path)
    }

    pub fn reset_all(&mut self) -> Result<()> {
        self.begin_mutation()?;
        self.tracker.reset_all();
        Ok(())
    }

    /// Discard every pending edit. No-op when nothing is dirty.
    pub fn reset(&mut self) -> Result<()> {
        self.reset_all()
    }

    /// Validate, persist and commit pending edits into the active profile.
    ///
    /// With nothing dirty this returns immediately without touching the
    /// sink. On any failure the working copy is kept for correction.
    pub fn apply(&mut self) -> Result<ApplyOutcome> {
        let Some(prepared) = self.prepare_apply()? else {
            return Ok(ApplyOutcome::unchanged(
                self.profiles.active_id(),
                self.controller.is_restart_required(),
            ));
        };
        let saved = self.sink.save(prepared.snapshot());
        self.finish_apply(prepared, saved)
    }

    pub(crate) fn prepare_apply(&mut self) -> Result<Option<PreparedCommit>> {
        self.controller.prepare(&self.tracker, &self.profiles)
    }

    pub(crate) fn finish_apply(
        &mut self,
        prepared: PreparedCommit,
        saved: std::result::Result<(), SinkError>,
    ) -> Result<ApplyOutcome> {
        let (store, outcome) = self.controller.complete(prepared, saved)?;
        self.profiles = store;
        self.restart_editing()?;
        Ok(outcome)
    }

    pub(crate) fn abort_apply(&mut self, prepared: PreparedCommit) {
        self.controller.abort(prepared);
    }

    /// Persist the current profile store without committing any edits.
    ///
    /// Used after profile operations and restart acknowledgement. Returns
    /// the snapshot digest.
    pub fn flush(&mut self) -> Result<String> {
        self.begin_mutation()?;
        let snapshot =
            SettingsSnapshot::capture(&self.profiles, self.controller.is_restart_required());
        self.sink.save(&snapshot)?;
        debug!(profiles = snapshot.profiles.len(), "settings flushed");
        snapshot.digest()
    }

    pub fn create_profile(&mut self, name: &str) -> Result<ProfileSummary> {
        self.begin_mutation()?;
        let id = self.profiles.create(name)?.id.clone();
        self.profiles.summary(&id)
    }

    pub fn clone_profile(&mut self, source_id: &str) -> Result<ProfileSummary> {
        self.begin_mutation()?;
        let id = self.profiles.clone_profile(source_id)?.id.clone();
        self.profiles.summary(&id)
    }

    pub fn rename_profile(&mut self, id: &str, name: &str) -> Result<()> {
        self.begin_mutation()?;
        self.profiles.rename(id, name)
    }

    pub fn delete_profile(&mut self, id: &str) -> Result<()> {
        self.begin_mutation()?;
        self.profiles.delete(id)
    }

    /// Switch the active profile. Pending edits are discarded.
    pub fn activate_profile(&mut self, id: &str) -> Result<()> {
        self.begin_mutation()?;
        self.profiles.get(id)?;
        let discarded = self.tracker.dirty_paths().len();
        if discarded > 0 {
            warn!(
                discarded,
                from = self.profiles.active_id(),
                to = id,
                "switching profile discards pending edits"
            );
        }
        self.profiles.activate(id)?;
        self.restart_editing()?;
        info!(profile_id = id, "profile activated");
        Ok(())
    }

    /// Stop the active profile overriding `path` so it inherits from the
    /// default profile again. Returns whether an override was removed.
    ///
    /// Pending edits are kept and replayed over the new effective view.
    /// The change is stored on the next apply or flush.
    pub fn revert_override(&mut self, path: &str) -> Result<bool> {
        self.begin_mutation()?;
        let path = self.leaf(path)?;
        let active_id = self.profiles.active_id().to_string();
        let profile = self.profiles.get_mut(&active_id)?;
        if profile.is_default() || !profile.document.clear_explicit(&path)? {
            return Ok(false);
        }
        self.effective = OverrideResolver::resolve(&self.profiles)?;
        self.tracker.rebase(self.effective.document().clone());
        info!(profile_id = %active_id, path = %path, "override reverted");
        Ok(true)
    }

    /// Clear the restart flag after the host has restarted.
    pub fn acknowledge_restart(&mut self) -> Result<bool> {
        self.begin_mutation()?;
        Ok(self.controller.acknowledge_restart())
    }

    /// Clear SAVED back to IDLE.
    pub fn acknowledge_saved(&mut self) {
        self.controller.acknowledge_saved();
    }
}
