//! Working copy and dirty-path bookkeeping
//!
//! The tracker holds the baseline (effective view when editing began), the
//! pending edits, and a working buffer equal to the baseline with every
//! pending edit applied. `dirty` is the authoritative "edited" signal.

use settings_path::PathAddress;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::document::{ConfigDocument, Value};
use crate::error::Result;

/// Pending edits against a baseline document
#[derive(Debug, Clone)]
pub struct ChangeTracker {
    baseline: ConfigDocument,
    working: ConfigDocument,
    pending: BTreeMap<PathAddress, Value>,
    dirty: BTreeSet<PathAddress>,
}

impl ChangeTracker {
    /// Start editing from `baseline` with nothing pending.
    pub fn begin(baseline: ConfigDocument) -> Self {
        debug!("editing session started");
        Self {
            working: baseline.clone(),
            baseline,
            pending: BTreeMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    pub fn baseline(&self) -> &ConfigDocument {
        &self.baseline
    }

    /// Baseline with every pending edit applied.
    pub fn working(&self) -> &ConfigDocument {
        &self.working
    }

    pub fn pending_edits(&self) -> &BTreeMap<PathAddress, Value> {
        &self.pending
    }

    pub fn dirty_paths(&self) -> &BTreeSet<PathAddress> {
        &self.dirty
    }

    pub fn has_changes(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Record an edit. Fails without touching state on path, kind or range
    /// errors.
    pub fn set_field(&mut self, path: &PathAddress, value: Value) -> Result<()> {
        self.working.assign(path, value.clone())?;

        // Paths absent from the baseline (appended elements) are always dirty.
        let matches_baseline = self.baseline.get(path).ok() == Some(&value);
        if matches_baseline {
            self.pending.remove(path);
            self.dirty.remove(path);
        } else {
            self.pending.insert(path.clone(), value);
            self.dirty.insert(path.clone());
        }
        debug!(path = %path, dirty = !matches_baseline, "field set");
        Ok(())
    }

    /// Drop the pending edit for `path`; reads fall back to the baseline.
    ///
    /// Edits that depended on it (entries inside an element it appended)
    /// can no longer apply and are dropped too.
    pub fn reset_field(&mut self, path: &PathAddress) -> Result<()> {
        self.baseline.schema().leaf_kind(path)?;
        let had_edit = self.pending.remove(path).is_some();
        let was_dirty = self.dirty.remove(path);
        if !had_edit && !was_dirty {
            return Ok(());
        }
        self.replay();
        debug!(path = %path, "field reset");
        Ok(())
    }

    pub fn reset_all(&mut self) {
        if self.pending.is_empty() && self.dirty.is_empty() {
            return;
        }
        self.pending.clear();
        self.dirty.clear();
        self.working = self.baseline.clone();
        debug!("all pending edits discarded");
    }

    pub fn is_dirty(&self, path: &PathAddress) -> bool {
        self.dirty.contains(path)
    }

    pub fn current_value(&self, path: &PathAddress) -> Result<&Value> {
        self.working.get(path)
    }

    /// Baseline with every pending edit applied, in path order.
    pub fn committed(&self) -> Result<ConfigDocument> {
        let mut doc = self.baseline.clone();
        for (path, value) in &self.pending {
            doc.assign(path, value.clone())?;
        }
        Ok(doc)
    }

    /// Swap in a new baseline and replay pending edits on top of it.
    ///
    /// Edits that now equal the baseline stop being dirty; edits that no
    /// longer apply are dropped.
    pub fn rebase(&mut self, baseline: ConfigDocument) {
        self.baseline = baseline;
        self.replay();
    }

    fn replay(&mut self) {
        let mut working = self.baseline.clone();
        let mut kept = BTreeMap::new();
        for (path, value) in std::mem::take(&mut self.pending) {
            if let Err(err) = working.assign(&path, value.clone()) {
                debug!(path = %path, error = %err, "dropping pending edit that no longer applies");
                continue;
            }
            if self.baseline.get(&path).ok() != Some(&value) {
                kept.insert(path, value);
            }
        }
        self.dirty = kept.keys().cloned().collect();
        self.pending = kept;
        self.working = working;
    }
}
