//! Settings Engine - layered configuration with change tracking
//!
//! A schema-driven settings document, named profiles that override a
//! protected default profile, a working copy that tracks unsaved edits,
//! and a validate-then-persist apply cycle with restart detection.

pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod profile;
pub mod resolver;
pub mod schema;
pub mod shared;
pub mod tracker;
pub mod transaction;

pub use settings_path::{PathAddress, PathError, Step};

pub use config::EngineConfig;
pub use document::{ConfigDocument, Value};
pub use engine::SettingsEngine;
pub use error::{Result, SettingsError};
pub use profile::{Profile, ProfileStore, ProfileSummary, DEFAULT_PROFILE_ID};
pub use resolver::{EffectiveView, OverrideResolver};
pub use schema::{LeafKind, Schema};
pub use shared::{CancelToken, SharedEngine};
pub use tracker::ChangeTracker;
pub use transaction::{
    ApplyOutcome, ApplyStatus, FileSink, MemorySink, SettingsSink, SettingsSnapshot, SinkError,
};
