//! Persisted form of the profile store
//!
//! A snapshot carries every profile's values as nested JSON plus the list
//! of paths each profile sets explicitly. Provenance cannot be recovered
//! from values alone, so it travels alongside them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use settings_path::PathAddress;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::warn;

use crate::document::ConfigDocument;
use crate::error::{Result, SettingsError};
use crate::profile::{Profile, ProfileStore};
use crate::schema::Schema;

/// Format version of the snapshot file itself
pub const SNAPSHOT_VERSION: u32 = 1;

/// One stored profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,

    /// Leaf values as nested JSON
    pub values: serde_json::Value,

    /// Explicitly set leaves and structurally grown lists
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub explicit: Vec<PathAddress>,
}

/// Everything the engine persists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsSnapshot {
    pub snapshot_version: u32,

    /// Schema the values were written against
    pub schema_id: String,
    pub schema_version: u32,

    pub saved_at: DateTime<Utc>,

    pub active_profile: String,

    /// Pending restart acknowledgement
    #[serde(default)]
    pub restart_required: bool,

    pub profiles: Vec<ProfileRecord>,
}

impl SettingsSnapshot {
    /// Capture the full store.
    pub fn capture(store: &ProfileStore, restart_required: bool) -> Self {
        let schema = store.schema();
        Self {
            snapshot_version: SNAPSHOT_VERSION,
            schema_id: schema.id().to_string(),
            schema_version: schema.version(),
            saved_at: Utc::now(),
            active_profile: store.active_id().to_string(),
            restart_required,
            profiles: store
                .profiles()
                .iter()
                .map(|p| ProfileRecord {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    created_at: p.created_at,
                    values: p.document.to_json(),
                    explicit: p.override_paths(),
                })
                .collect(),
        }
    }

    /// Rebuild a profile store against `schema`.
    ///
    /// Fails with `Persistence` when the snapshot was written for another
    /// schema or its profiles are inconsistent.
    pub fn restore(&self, schema: Arc<Schema>) -> Result<ProfileStore> {
        if self.snapshot_version > SNAPSHOT_VERSION {
            return Err(SettingsError::Persistence(format!(
                "snapshot version {} is newer than supported version {}",
                self.snapshot_version, SNAPSHOT_VERSION
            )));
        }
        if self.schema_id != schema.id() {
            return Err(SettingsError::Persistence(format!(
                "stored settings use schema '{}', expected '{}'",
                self.schema_id,
                schema.id()
            )));
        }
        if self.schema_version != schema.version() {
            warn!(
                stored = self.schema_version,
                current = schema.version(),
                "loading settings written by a different schema version"
            );
        }

        let mut profiles = Vec::with_capacity(self.profiles.len());
        for record in &self.profiles {
            let mut document = ConfigDocument::from_json(schema.clone(), &record.values)
                .map_err(|e| {
                    SettingsError::Persistence(format!("profile '{}': {}", record.id, e))
                })?;
            for path in &record.explicit {
                document.mark_explicit(path).map_err(|e| {
                    SettingsError::Persistence(format!("profile '{}': {}", record.id, e))
                })?;
            }
            profiles.push(Profile {
                id: record.id.clone(),
                name: record.name.clone(),
                created_at: record.created_at,
                document,
            });
        }

        ProfileStore::from_parts(schema, profiles, self.active_profile.clone())
    }

    /// SHA-256 hex digest of the canonical JSON content.
    ///
    /// `saved_at` is excluded so two snapshots of the same state agree.
    pub fn digest(&self) -> Result<String> {
        let mut content = serde_json::to_value(self)
            .map_err(|e| SettingsError::Persistence(e.to_string()))?;
        if let Some(fields) = content.as_object_mut() {
            fields.remove("saved_at");
        }
        let canonical = serde_json_canonicalizer::to_vec(&content)
            .map_err(|e| SettingsError::Persistence(format!("canonicalization: {}", e)))?;

        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        Ok(hex::encode(hasher.finalize()))
    }

    /// Serialize to JSON
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let out = if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        };
        out.map_err(|e| SettingsError::Persistence(e.to_string()))
    }

    /// Load from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SettingsError::Persistence(e.to_string()))
    }
}
