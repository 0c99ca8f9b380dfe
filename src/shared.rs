//! Thread-safe engine handle
//!
//! `SharedEngine` puts a [`SettingsEngine`] behind an `RwLock`. Reads take
//! the read lock. An apply holds the write lock only while preparing and
//! while committing; the sink call itself runs unlocked, so other threads
//! can observe `SAVING` and get `OperationInProgress` from mutations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::engine::SettingsEngine;
use crate::error::{Result, SettingsError};
use crate::transaction::ApplyOutcome;

/// Cooperative cancellation for an apply that has not reached the sink
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Cloneable handle to one engine
#[derive(Debug, Clone)]
pub struct SharedEngine {
    inner: Arc<RwLock<SettingsEngine>>,
}

impl SharedEngine {
    pub fn new(engine: SettingsEngine) -> Self {
        Self {
            inner: Arc::new(RwLock::new(engine)),
        }
    }

    // A panic while holding the lock cannot leave the engine half-updated:
    // every mutation validates before it writes.
    fn lock_read(&self) -> RwLockReadGuard<'_, SettingsEngine> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_write(&self) -> RwLockWriteGuard<'_, SettingsEngine> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` with shared access.
    pub fn read<R>(&self, f: impl FnOnce(&SettingsEngine) -> R) -> R {
        f(&self.lock_read())
    }

    /// Run `f` with exclusive access.
    pub fn write<R>(&self, f: impl FnOnce(&mut SettingsEngine) -> R) -> R {
        f(&mut self.lock_write())
    }

    pub fn apply(&self) -> Result<ApplyOutcome> {
        self.apply_with(&CancelToken::new())
    }

    /// Apply pending edits, checking `cancel` before the sink is called.
    ///
    /// A cancelled apply returns `Cancelled` and leaves the working copy
    /// and stored state untouched.
    pub fn apply_with(&self, cancel: &CancelToken) -> Result<ApplyOutcome> {
        let (prepared, sink) = {
            let mut engine = self.lock_write();
            match engine.prepare_apply()? {
                Some(prepared) => (prepared, engine.sink()),
                None => {
                    return Ok(ApplyOutcome::unchanged(
                        engine.active_profile_id(),
                        engine.is_restart_required(),
                    ))
                }
            }
        };

        if cancel.is_cancelled() {
            self.lock_write().abort_apply(prepared);
            return Err(SettingsError::Cancelled);
        }

        let saved = sink.save(prepared.snapshot());
        self.lock_write().finish_apply(prepared, saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::dashboard;
    use crate::transaction::ApplyStatus;

    fn shared() -> SharedEngine {
        SharedEngine::new(SettingsEngine::in_memory(Arc::new(dashboard())).unwrap())
    }

    #[test]
    fn test_cancel_before_sink() {
        let engine = shared();
        engine.write(|e| e.set_field("ui.theme", "light")).unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        assert_eq!(engine.apply_with(&cancel), Err(SettingsError::Cancelled));

        engine.read(|e| {
            assert_eq!(e.apply_status(), ApplyStatus::Idle);
            assert!(e.is_dirty("ui.theme").unwrap());
        });
    }

    #[test]
    fn test_clones_share_state() {
        let a = shared();
        let b = a.clone();
        a.write(|e| e.set_field("ui.theme", "light")).unwrap();
        b.apply().unwrap();
        assert_eq!(a.read(|e| e.apply_status()), ApplyStatus::Saved);
    }
}
