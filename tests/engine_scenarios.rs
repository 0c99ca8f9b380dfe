//! Engine Scenario Tests
//!
//! End-to-end behavior of the settings engine over an in-memory sink:
//! path round-trips, dirty tracking, apply atomicity, override provenance,
//! restart detection and profile switching.

use settings_engine::schema::dashboard;
use settings_engine::{
    ApplyStatus, ConfigDocument, MemorySink, PathAddress, SettingsEngine, SettingsError, Value,
};
use std::sync::Arc;

fn engine() -> SettingsEngine {
    SettingsEngine::in_memory(Arc::new(dashboard())).unwrap()
}

fn engine_with_sink() -> (SettingsEngine, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let engine = SettingsEngine::open(Arc::new(dashboard()), sink.clone()).unwrap();
    (engine, sink)
}

// =============================================================================
// Path round-trip
// =============================================================================

#[test]
fn test_path_round_trip_for_every_leaf() {
    let doc = ConfigDocument::new(Arc::new(dashboard()));
    let mut extra = vec![
        "a".to_string(),
        "a.b.c".to_string(),
        "list[0][12].x_y".to_string(),
        "email.accounts[1234].folders".to_string(),
    ];
    extra.extend(doc.leaf_paths().iter().map(|p| p.to_string()));

    for text in extra {
        let parsed = PathAddress::parse(&text).unwrap();
        assert_eq!(parsed.to_string(), text);
    }
}

#[test]
fn test_malformed_paths_rejected() {
    let engine = engine();
    for text in ["", ".a", "a.", "a..b", "a[", "a[x]", "a[-1]", "[0].a", "a]b"] {
        assert!(
            matches!(
                engine.current_value(text),
                Err(SettingsError::MalformedPath(_))
            ),
            "expected malformed path for {:?}",
            text
        );
    }
}

// =============================================================================
// Dirty tracking
// =============================================================================

#[test]
fn test_dirty_collapse() {
    let mut engine = engine();
    engine.set_field("ui.theme", "light").unwrap();
    assert!(engine.is_dirty("ui.theme").unwrap());

    engine.set_field("ui.theme", "dark").unwrap();
    assert!(!engine.is_dirty("ui.theme").unwrap());
    assert!(engine.dirty_paths().is_empty());
}

#[test]
fn test_reset_all_twice_matches_once() {
    let mut engine = engine();
    engine.set_field("llm.maxTokens", 1024).unwrap();
    engine.set_field("email.accounts[1].imapHost", "imap.corp").unwrap();

    engine.reset_all().unwrap();
    let once = (engine.dirty_paths(), engine.working_json());
    engine.reset_all().unwrap();
    assert_eq!((engine.dirty_paths(), engine.working_json()), once);
    assert!(once.0.is_empty());
}

#[test]
fn test_reset_when_clean_is_noop() {
    let (mut engine, sink) = engine_with_sink();
    engine.reset().unwrap();
    assert!(engine.dirty_paths().is_empty());
    assert_eq!(sink.save_count(), 0);
}

#[test]
fn test_reset_field_restores_baseline() {
    let mut engine = engine();
    engine.set_field("llm.temperature", 0.1).unwrap();
    engine.reset_field("llm.temperature").unwrap();
    assert_eq!(engine.current_value("llm.temperature").unwrap(), Value::from(0.7));
    assert!(!engine.is_dirty("llm.temperature").unwrap());
}

#[test]
fn test_set_field_errors_leave_state() {
    let mut engine = engine();
    let before = engine.working_json();

    assert!(matches!(
        engine.set_field("system.runtime.apiPort", "9090"),
        Err(SettingsError::TypeMismatch { .. })
    ));
    assert!(matches!(
        engine.set_field("system.runtime.nothing", 1),
        Err(SettingsError::UnknownPath(_))
    ));
    assert!(matches!(
        engine.set_field("email.accounts[3].imapHost", "x"),
        Err(SettingsError::Range { index: 3, len: 1, .. })
    ));
    assert!(matches!(
        engine.set_field("email.accounts", "x"),
        Err(SettingsError::UnknownPath(_))
    ));

    assert_eq!(engine.working_json(), before);
    assert!(engine.dirty_paths().is_empty());
}

// =============================================================================
// Apply
// =============================================================================

#[test]
fn test_apply_clears_dirtiness() {
    let (mut engine, sink) = engine_with_sink();
    engine.set_field("ui.theme", "light").unwrap();
    engine.set_field("llm.maxTokens", 2048).unwrap();
    engine
        .set_field(
            "system.governance.blockedCommands",
            vec!["rm -rf", "shutdown", "mkfs"],
        )
        .unwrap();

    let outcome = engine.apply().unwrap();
    assert_eq!(outcome.applied.len(), 3);
    assert!(!outcome.restart_required);
    assert_eq!(engine.apply_status(), ApplyStatus::Saved);
    assert!(engine.dirty_paths().is_empty());
    assert_eq!(engine.current_value("ui.theme").unwrap(), Value::from("light"));
    assert_eq!(engine.current_value("llm.maxTokens").unwrap(), Value::from(2048));
    assert_eq!(sink.save_count(), 1);

    let stored = sink.stored().unwrap();
    assert_eq!(outcome.digest, Some(stored.digest().unwrap()));
}

#[test]
fn test_apply_with_nothing_dirty() {
    let (mut engine, sink) = engine_with_sink();
    let outcome = engine.apply().unwrap();
    assert!(outcome.applied.is_empty());
    assert!(outcome.digest.is_none());
    assert_eq!(engine.apply_status(), ApplyStatus::Idle);
    assert_eq!(sink.save_count(), 0);
}

#[test]
fn test_apply_atomic_on_validation_failure() {
    let (mut engine, sink) = engine_with_sink();
    let committed_before = engine.effective().document().clone();

    engine.set_field("ui.theme", "light").unwrap();
    engine.set_field("system.runtime.wsPort", 0).unwrap();

    let err = engine.apply().unwrap_err();
    assert_eq!(
        err,
        SettingsError::Validation {
            path: "system.runtime.wsPort".to_string(),
            reason: "0 is outside [1, 65535]".to_string(),
        }
    );
    assert_eq!(engine.apply_status(), ApplyStatus::Idle);
    assert!(engine.last_error().is_some());
    assert_eq!(engine.effective().document(), &committed_before);
    assert_eq!(sink.save_count(), 0);

    // Working copy survives for correction
    assert!(engine.is_dirty("ui.theme").unwrap());
    engine.set_field("system.runtime.wsPort", 8082).unwrap();
    engine.apply().unwrap();
    assert_eq!(engine.current_value("ui.theme").unwrap(), Value::from("light"));
}

#[test]
fn test_required_when_rule() {
    let mut engine = engine();
    engine.set_field("system.runtime.tlsEnabled", true).unwrap();
    assert!(matches!(
        engine.apply(),
        Err(SettingsError::Validation { ref path, .. }) if path == "system.runtime.tlsCertPath"
    ));

    engine
        .set_field("system.runtime.tlsCertPath", "/etc/dash/cert.pem")
        .unwrap();
    assert!(engine.apply().unwrap().restart_required);
}

#[test]
fn test_non_finite_number_never_reaches_the_store() {
    use settings_engine::schema::{GroupSchema, Schema};

    let schema = Arc::new(Schema::new("ratio-test", 1, GroupSchema::new().leaf("ratio", 0.5)));
    let sink = Arc::new(MemorySink::new());
    let mut engine = SettingsEngine::open(schema.clone(), sink.clone()).unwrap();

    assert!(matches!(
        engine.set_field("ratio", f64::NAN),
        Err(SettingsError::TypeMismatch { .. })
    ));
    assert!(!engine.is_dirty("ratio").unwrap());

    engine.set_field("ratio", 0.25).unwrap();
    engine.apply().unwrap();

    let reopened = SettingsEngine::open(schema, sink).unwrap();
    assert_eq!(reopened.current_value("ratio").unwrap(), Value::from(0.25));
}

#[test]
fn test_persistence_failure_keeps_edits() {
    let (mut engine, sink) = engine_with_sink();
    engine.set_field("system.runtime.apiPort", 9090).unwrap();

    sink.fail_next_save();
    let err = engine.apply().unwrap_err();
    assert!(matches!(err, SettingsError::Persistence(_)));
    assert_eq!(engine.apply_status(), ApplyStatus::Idle);
    assert!(!engine.is_restart_required());
    assert!(engine.is_dirty("system.runtime.apiPort").unwrap());
    let port = PathAddress::parse("system.runtime.apiPort").unwrap();
    assert_eq!(
        engine.effective().document().get(&port).unwrap(),
        &Value::from(8080)
    );

    engine.apply().unwrap();
    assert!(engine.is_restart_required());
}

#[test]
fn test_appended_list_element_commits() {
    let mut engine = engine();
    engine
        .set_field("email.accounts[1].imapHost", "imap.second.example")
        .unwrap();
    engine.set_field("email.accounts[1].imapPort", 143).unwrap();
    engine.apply().unwrap();

    assert_eq!(
        engine.current_value("email.accounts[1].imapHost").unwrap(),
        Value::from("imap.second.example")
    );
    assert_eq!(
        engine.current_value("email.accounts[1].useTls").unwrap(),
        Value::from(true)
    );
}

#[test]
fn test_appended_element_host_must_not_be_blank() {
    let mut engine = engine();
    engine.set_field("email.accounts[1].imapPort", 995).unwrap();
    engine.apply().unwrap();

    engine.set_field("email.accounts[1].imapHost", "").unwrap();
    assert!(matches!(
        engine.apply(),
        Err(SettingsError::Validation { .. })
    ));
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_scenario_api_port_requires_restart() {
    let mut engine = engine();
    assert_eq!(
        engine.current_value("system.runtime.apiPort").unwrap(),
        Value::from(8080)
    );

    engine.set_field("system.runtime.apiPort", 9090).unwrap();
    assert!(engine.is_dirty("system.runtime.apiPort").unwrap());

    engine.apply().unwrap();
    assert!(engine.is_restart_required());
    assert_eq!(
        engine.current_value("system.runtime.apiPort").unwrap(),
        Value::from(9090)
    );
    assert!(!engine.is_dirty("system.runtime.apiPort").unwrap());
}

#[test]
fn test_restart_flag_is_sticky_until_acknowledged() {
    let mut engine = engine();
    engine.set_field("system.runtime.apiPort", 9090).unwrap();
    engine.apply().unwrap();

    engine.set_field("ui.theme", "light").unwrap();
    let outcome = engine.apply().unwrap();
    assert!(outcome.restart_required);
    assert!(engine.is_restart_required());

    assert!(engine.acknowledge_restart().unwrap());
    assert!(!engine.is_restart_required());
}

#[test]
fn test_scenario_staging_profile_switch() {
    let mut engine = engine();
    let staging = engine.create_profile("staging").unwrap().id;

    engine.activate_profile(&staging).unwrap();
    engine.set_field("llm.provider_mode", "openai").unwrap();
    engine.apply().unwrap();

    engine.activate_profile("default").unwrap();
    assert_eq!(
        engine.current_value("llm.provider_mode").unwrap(),
        Value::from("local")
    );
    assert!(!engine.is_override("llm.provider_mode").unwrap());

    engine.activate_profile(&staging).unwrap();
    assert_eq!(
        engine.current_value("llm.provider_mode").unwrap(),
        Value::from("openai")
    );
    assert!(engine.is_override("llm.provider_mode").unwrap());
}

#[test]
fn test_override_provenance() {
    let mut engine = engine();
    engine.set_field("ui.refreshIntervalSecs", 15).unwrap();
    engine.apply().unwrap();

    let ops = engine.create_profile("ops").unwrap().id;
    engine.activate_profile(&ops).unwrap();

    // Never set on this profile: inherits the default's stored value
    assert!(!engine.is_override("ui.refreshIntervalSecs").unwrap());
    assert_eq!(
        engine.current_value("ui.refreshIntervalSecs").unwrap(),
        Value::from(15)
    );

    engine.set_field("ui.refreshIntervalSecs", 60).unwrap();
    assert!(!engine.is_override("ui.refreshIntervalSecs").unwrap());
    engine.apply().unwrap();
    assert!(engine.is_override("ui.refreshIntervalSecs").unwrap());
    assert_eq!(
        engine.current_value("ui.refreshIntervalSecs").unwrap(),
        Value::from(60)
    );

    // Later default edits still show through on paths the profile never set
    engine.activate_profile("default").unwrap();
    engine.set_field("ui.theme", "system").unwrap();
    engine.apply().unwrap();
    engine.activate_profile(&ops).unwrap();
    assert_eq!(engine.current_value("ui.theme").unwrap(), Value::from("system"));
    assert!(!engine.is_override("ui.theme").unwrap());
}

#[test]
fn test_setting_default_value_on_profile_is_not_dirty() {
    let mut engine = engine();
    let id = engine.create_profile("quiet").unwrap().id;
    engine.activate_profile(&id).unwrap();

    engine.set_field("ui.theme", "dark").unwrap();
    assert!(!engine.is_dirty("ui.theme").unwrap());
    engine.apply().unwrap();
    assert!(!engine.is_override("ui.theme").unwrap());
}

#[test]
fn test_switch_discards_pending_edits() {
    let mut engine = engine();
    let id = engine.create_profile("scratch").unwrap().id;
    engine.set_field("ui.theme", "light").unwrap();

    engine.activate_profile(&id).unwrap();
    assert!(engine.dirty_paths().is_empty());
    engine.activate_profile("default").unwrap();
    assert_eq!(engine.current_value("ui.theme").unwrap(), Value::from("dark"));
}
