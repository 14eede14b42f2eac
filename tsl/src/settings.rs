use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::block::attribute::AttributeValue;
use crate::error::Error;

/// What happens when a data type, space or string name is declared twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RedefinitionPolicy {
    /// Fail with a configuration error.
    #[default]
    Reject,
    /// The later declaration replaces the earlier one.
    Shadow,
}

/// Generation settings. Every field has a default, so any subset may be given.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Seed for every random choice made while generating.
    pub seed: u64,
    pub redefinition: RedefinitionPolicy,
    /// Template option values (`set_option_value` / `option_value`).
    pub options: BTreeMap<String, AttributeValue>,
    /// Revision id of the processor model.
    pub revision: Option<String>,
    /// All revisions the model includes.
    pub revisions: Vec<String>,
}

/// Same fields as [`Settings`], all optional, for layering one file over another.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SettingsOverlay {
    seed: Option<u64>,
    redefinition: Option<RedefinitionPolicy>,
    options: BTreeMap<String, AttributeValue>,
    revision: Option<String>,
    revisions: Option<Vec<String>>,
}

impl Settings {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn from_toml(source: &str) -> Result<Self, Error> {
        toml::from_str(source).map_err(|e| Error::syntax(format!("invalid settings: {}", e.message())))
    }

    /// Apply the fields present in a settings file on top of these settings.
    pub fn overlay_file(self, path: &Path) -> Result<Self, Error> {
        let source = read(path)?;
        self.overlay(&source)
    }

    pub fn overlay(mut self, source: &str) -> Result<Self, Error> {
        let overlay: SettingsOverlay = toml::from_str(source)
            .map_err(|e| Error::syntax(format!("invalid settings: {}", e.message())))?;
        if let Some(seed) = overlay.seed {
            self.seed = seed;
        }
        if let Some(policy) = overlay.redefinition {
            self.redefinition = policy;
        }
        self.options.extend(overlay.options);
        if overlay.revision.is_some() {
            self.revision = overlay.revision;
        }
        if let Some(revisions) = overlay.revisions {
            self.revisions = revisions;
        }
        Ok(self)
    }

    pub fn is_rev(&self, id: &str) -> bool {
        self.revision.as_deref() == Some(id) || self.revisions.iter().any(|r| r == id)
    }
}

fn read(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path)
        .map_err(|e| Error::configuration(format!("cannot read '{}': {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_settings_use_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.redefinition, RedefinitionPolicy::Reject);
    }

    #[test]
    fn overlay_replaces_only_present_fields() {
        let base = Settings::from_toml("seed = 7\nrevision = \"r1\"\n[options]\nverbose = true").unwrap();
        let merged = base.overlay("redefinition = \"shadow\"\n[options]\ncount = 3").unwrap();
        assert_eq!(merged.seed, 7);
        assert_eq!(merged.redefinition, RedefinitionPolicy::Shadow);
        assert_eq!(merged.options.len(), 2);
        assert!(merged.is_rev("r1"));
        assert!(!merged.is_rev("r2"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Settings::from_toml("sead = 1").unwrap_err();
        assert_eq!(err.kind, crate::ErrorKind::Syntax);
    }
}
