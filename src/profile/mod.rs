//! Named configuration profiles
//!
//! The store always holds the protected `default` profile plus any number
//! of user profiles, and tracks exactly one active profile id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use settings_path::PathAddress;
use std::sync::Arc;
use tracing::info;

use crate::document::ConfigDocument;
use crate::error::{Result, SettingsError};
use crate::schema::Schema;

/// Id of the protected base profile
pub const DEFAULT_PROFILE_ID: &str = "default";

/// A named, independently overridable document
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub document: ConfigDocument,
}

impl Profile {
    pub fn is_default(&self) -> bool {
        self.id == DEFAULT_PROFILE_ID
    }

    /// Paths this profile overrides. Always empty for the default profile.
    pub fn override_paths(&self) -> Vec<PathAddress> {
        if self.is_default() {
            Vec::new()
        } else {
            self.document.explicit_paths()
        }
    }
}

/// Listing entry for a profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub is_default: bool,
    pub is_active: bool,
    pub override_count: usize,
}

/// Generate a new profile id (ULID, lower-cased)
pub fn generate_profile_id() -> String {
    ulid::Ulid::new().to_string().to_lowercase()
}

/// Profiles in creation order plus the active id
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileStore {
    schema: Arc<Schema>,
    profiles: Vec<Profile>,
    active: String,
}

impl ProfileStore {
    /// Store holding only a default profile with schema defaults.
    pub fn new(schema: Arc<Schema>) -> Self {
        let default = Profile {
            id: DEFAULT_PROFILE_ID.to_string(),
            name: "Default".to_string(),
            created_at: Utc::now(),
            document: ConfigDocument::new(schema.clone()),
        };
        Self {
            schema,
            profiles: vec![default],
            active: DEFAULT_PROFILE_ID.to_string(),
        }
    }

    /// Rebuild a store from loaded profiles.
    ///
    /// Requires unique ids, a default profile, and an existing active id.
    pub fn from_parts(schema: Arc<Schema>, profiles: Vec<Profile>, active: String) -> Result<Self> {
        for (i, profile) in profiles.iter().enumerate() {
            if profiles[..i].iter().any(|p| p.id == profile.id) {
                return Err(SettingsError::Persistence(format!(
                    "duplicate profile id '{}'",
                    profile.id
                )));
            }
        }
        if !profiles.iter().any(Profile::is_default) {
            return Err(SettingsError::Persistence(
                "no default profile in stored settings".to_string(),
            ));
        }
        if !profiles.iter().any(|p| p.id == active) {
            return Err(SettingsError::UnknownProfile(active));
        }
        Ok(Self {
            schema,
            profiles,
            active,
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn get(&self, id: &str) -> Result<&Profile> {
        self.profiles
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| SettingsError::UnknownProfile(id.to_string()))
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Result<&mut Profile> {
        self.profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| SettingsError::UnknownProfile(id.to_string()))
    }

    pub fn default_profile(&self) -> Result<&Profile> {
        self.get(DEFAULT_PROFILE_ID)
    }

    pub fn active_id(&self) -> &str {
        &self.active
    }

    pub fn active(&self) -> Result<&Profile> {
        self.get(&self.active)
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn list(&self) -> Vec<ProfileSummary> {
        self.profiles.iter().map(|p| self.summarize(p)).collect()
    }

    pub fn summary(&self, id: &str) -> Result<ProfileSummary> {
        self.get(id).map(|p| self.summarize(p))
    }

    fn summarize(&self, profile: &Profile) -> ProfileSummary {
        ProfileSummary {
            id: profile.id.clone(),
            name: profile.name.clone(),
            created_at: profile.created_at,
            is_default: profile.is_default(),
            is_active: profile.id == self.active,
            override_count: profile.override_paths().len(),
        }
    }

    fn fresh_id(&self) -> String {
        loop {
            let id = generate_profile_id();
            if self.profiles.iter().all(|p| p.id != id) {
                return id;
            }
        }
    }

    /// Create a profile that overrides nothing.
    pub fn create(&mut self, name: &str) -> Result<&Profile> {
        let name = validate_name(name)?;
        let document = self.default_profile()?.document.without_provenance();
        let profile = Profile {
            id: self.fresh_id(),
            name,
            created_at: Utc::now(),
            document,
        };
        info!(profile_id = %profile.id, name = %profile.name, "profile created");
        Ok(self.push(profile))
    }

    /// Copy a profile including its override set.
    pub fn clone_profile(&mut self, source_id: &str) -> Result<&Profile> {
        let source = self.get(source_id)?;
        // The default profile never overrides itself, so its copy starts clean.
        let document = if source.is_default() {
            source.document.without_provenance()
        } else {
            source.document.clone()
        };
        let profile = Profile {
            id: self.fresh_id(),
            name: format!("{} (copy)", source.name),
            created_at: Utc::now(),
            document,
        };
        info!(profile_id = %profile.id, source = source_id, "profile cloned");
        Ok(self.push(profile))
    }

    fn push(&mut self, profile: Profile) -> &Profile {
        self.profiles.push(profile);
        &self.profiles[self.profiles.len() - 1]
    }

    pub fn rename(&mut self, id: &str, name: &str) -> Result<()> {
        let name = validate_name(name)?;
        self.get_mut(id)?.name = name;
        Ok(())
    }

    /// Remove a profile permanently.
    pub fn delete(&mut self, id: &str) -> Result<()> {
        if id == DEFAULT_PROFILE_ID {
            return Err(SettingsError::ProtectedProfile(id.to_string()));
        }
        if id == self.active {
            return Err(SettingsError::ActiveProfile(id.to_string()));
        }
        let index = self
            .profiles
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| SettingsError::UnknownProfile(id.to_string()))?;
        self.profiles.remove(index);
        info!(profile_id = id, "profile deleted");
        Ok(())
    }

    pub fn activate(&mut self, id: &str) -> Result<()> {
        self.get(id)?;
        self.active = id.to_string();
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(SettingsError::validation("name", "profile name must not be empty"));
    }
    Ok(trimmed.to_string())
}
