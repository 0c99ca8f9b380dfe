//! Shared Engine Tests
//!
//! Concurrency behavior of `SharedEngine`: mutations during an in-flight
//! apply are rejected, reads keep working, and cancellation before the
//! sink leaves state untouched.

use settings_engine::schema::dashboard;
use settings_engine::{
    ApplyStatus, CancelToken, MemorySink, SettingsEngine, SettingsError, SettingsSink,
    SettingsSnapshot, SharedEngine, SinkError, Value,
};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

/// Sink that parks inside `save` until the test releases it
struct GateSink {
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
    inner: MemorySink,
}

impl SettingsSink for GateSink {
    fn save(&self, snapshot: &SettingsSnapshot) -> Result<(), SinkError> {
        self.entered.lock().unwrap().send(()).unwrap();
        self.release.lock().unwrap().recv().unwrap();
        self.inner.save(snapshot)
    }

    fn load(&self) -> Result<Option<SettingsSnapshot>, SinkError> {
        self.inner.load()
    }
}

fn gated_engine() -> (SharedEngine, Receiver<()>, Sender<()>) {
    let (entered_tx, entered_rx) = channel();
    let (release_tx, release_rx) = channel();
    let sink = GateSink {
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
        inner: MemorySink::new(),
    };
    let engine = SettingsEngine::open(Arc::new(dashboard()), Arc::new(sink)).unwrap();
    (SharedEngine::new(engine), entered_rx, release_tx)
}

#[test]
fn test_mutations_rejected_while_saving() {
    let (shared, entered, release) = gated_engine();
    let staging = shared.write(|e| e.create_profile("staging")).unwrap().id;
    shared
        .write(|e| e.set_field("system.runtime.apiPort", 9090))
        .unwrap();

    let applier = {
        let shared = shared.clone();
        thread::spawn(move || shared.apply())
    };
    entered.recv().unwrap();

    // Reads still work and see the in-flight status
    assert_eq!(shared.read(|e| e.apply_status()), ApplyStatus::Saving);
    assert_eq!(
        shared.read(|e| e.current_value("system.runtime.apiPort")).unwrap(),
        Value::from(9090)
    );

    assert_eq!(
        shared.write(|e| e.activate_profile(&staging)),
        Err(SettingsError::OperationInProgress)
    );
    assert_eq!(
        shared.write(|e| e.set_field("ui.theme", "light")),
        Err(SettingsError::OperationInProgress)
    );
    assert_eq!(
        shared.write(|e| e.reset_all()),
        Err(SettingsError::OperationInProgress)
    );
    assert!(matches!(
        shared.apply(),
        Err(SettingsError::OperationInProgress)
    ));

    release.send(()).unwrap();
    let outcome = applier.join().unwrap().unwrap();
    assert!(outcome.restart_required);

    shared.read(|e| {
        assert_eq!(e.apply_status(), ApplyStatus::Saved);
        assert_eq!(e.active_profile_id(), "default");
        assert!(e.dirty_paths().is_empty());
    });

    // Now the switch goes through
    shared.write(|e| e.activate_profile(&staging)).unwrap();
}

#[test]
fn test_cancel_before_persistence() {
    let sink = Arc::new(MemorySink::new());
    let engine = SettingsEngine::open(Arc::new(dashboard()), sink.clone()).unwrap();
    let shared = SharedEngine::new(engine);
    shared.write(|e| e.set_field("ui.theme", "light")).unwrap();

    let cancel = CancelToken::new();
    cancel.cancel();
    assert!(matches!(
        shared.apply_with(&cancel),
        Err(SettingsError::Cancelled)
    ));
    assert_eq!(sink.save_count(), 0);

    shared.read(|e| {
        assert_eq!(e.apply_status(), ApplyStatus::Idle);
        assert!(e.is_dirty("ui.theme").unwrap());
        assert_eq!(e.last_error(), Some("apply cancelled before persistence"));
    });

    // A fresh token lets the same edits through
    shared.apply_with(&CancelToken::new()).unwrap();
    assert_eq!(sink.save_count(), 1);
}

#[test]
fn test_engines_are_independent() {
    let a = SharedEngine::new(SettingsEngine::in_memory(Arc::new(dashboard())).unwrap());
    let b = SharedEngine::new(SettingsEngine::in_memory(Arc::new(dashboard())).unwrap());

    a.write(|e| e.set_field("ui.theme", "light")).unwrap();
    a.apply().unwrap();

    assert_eq!(
        b.read(|e| e.current_value("ui.theme")).unwrap(),
        Value::from("dark")
    );
}

#[test]
fn test_concurrent_readers() {
    let shared = SharedEngine::new(SettingsEngine::in_memory(Arc::new(dashboard())).unwrap());
    shared.write(|e| e.set_field("llm.maxTokens", 1000)).unwrap();
    shared.apply().unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let shared = shared.clone();
            thread::spawn(move || shared.read(|e| e.current_value("llm.maxTokens")))
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), Value::from(1000));
    }
}
