//! Apply status machine
//!
//! IDLE → VALIDATING → {SAVING → {SAVED | IDLE} | IDLE}, SAVED → IDLE

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::SettingsError;

/// Global sequence counter for ordering status changes
static SEQUENCE_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_seq() -> u64 {
    SEQUENCE_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Where the engine is in the apply cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplyStatus {
    /// Nothing in flight
    Idle,
    /// Running validation rules over the candidate document
    Validating,
    /// Waiting on the persistence sink
    Saving,
    /// Last apply persisted; cleared by acknowledgement or the next edit
    Saved,
}

impl ApplyStatus {
    /// Check if transition from this status to target is valid
    pub fn can_transition_to(&self, target: ApplyStatus) -> bool {
        match (self, target) {
            (ApplyStatus::Idle, ApplyStatus::Validating) => true,

            (ApplyStatus::Validating, ApplyStatus::Saving) => true,
            (ApplyStatus::Validating, ApplyStatus::Idle) => true, // validation failed

            (ApplyStatus::Saving, ApplyStatus::Saved) => true,
            (ApplyStatus::Saving, ApplyStatus::Idle) => true, // sink failed or cancelled

            (ApplyStatus::Saved, ApplyStatus::Idle) => true,

            _ => false,
        }
    }

    /// An apply is between validation and the sink's answer.
    pub fn is_busy(&self) -> bool {
        matches!(self, ApplyStatus::Validating | ApplyStatus::Saving)
    }
}

impl std::fmt::Display for ApplyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ApplyStatus::Idle => "IDLE",
            ApplyStatus::Validating => "VALIDATING",
            ApplyStatus::Saving => "SAVING",
            ApplyStatus::Saved => "SAVED",
        };
        f.write_str(label)
    }
}

/// Current status plus bookkeeping for observers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyState {
    pub status: ApplyStatus,

    /// When the status last changed
    pub updated_at: DateTime<Utc>,

    /// Monotonic sequence counter for ordering
    pub seq: u64,

    /// Message of the most recent failed apply, cleared on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Default for ApplyState {
    fn default() -> Self {
        Self {
            status: ApplyStatus::Idle,
            updated_at: Utc::now(),
            seq: next_seq(),
            last_error: None,
        }
    }
}

impl ApplyState {
    /// Move to `target`. Invalid transitions only happen when a second
    /// apply races the first, so they surface as `OperationInProgress`.
    pub fn transition(&mut self, target: ApplyStatus) -> Result<(), SettingsError> {
        if !self.status.can_transition_to(target) {
            return Err(SettingsError::OperationInProgress);
        }
        self.status = target;
        self.updated_at = Utc::now();
        self.seq = next_seq();
        Ok(())
    }

    /// Return to IDLE recording why the apply stopped.
    pub fn fail(&mut self, error: &SettingsError) {
        if self.transition(ApplyStatus::Idle).is_ok() {
            self.last_error = Some(error.to_string());
        }
    }
}
