//! Import profiles and loading
//!
//! A profile describes one import feature: the header aliases of its
//! columns, per-field rules, the identity key and how rows are written.
//! Profiles are loaded from:
//! 1. Builtin (embedded in binary)
//! 2. User global (~/.config/batchsync/profiles/*.yml)
//! 3. Project-specific (.batchsync/profiles/*.yml)
//!
//! Later definitions override earlier ones with the same name. A profile can
//! also be given directly as a path to a YAML file.

mod builtin;
mod definition;
mod plan;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use eyre::{Context, Result};
use tracing::{debug, info, warn};

pub use builtin::{BUILTIN_NAMES, get_builtin};
pub use definition::{FieldSpec, ImportProfile};
pub use plan::ImportPlan;

use crate::config::ProfilesConfig;

/// Loader for import profile definitions
#[derive(Debug, Default)]
pub struct ProfileLoader {
    profiles: BTreeMap<String, ImportProfile>,
}

impl ProfileLoader {
    /// Create a loader populated from the configured sources
    pub fn new(config: &ProfilesConfig) -> Result<Self> {
        debug!(?config, "ProfileLoader::new: called");
        let mut loader = Self::default();

        if config.use_builtin() {
            loader.load_builtins()?;
        } else {
            debug!("ProfileLoader::new: builtin profiles disabled");
        }

        for path in config.expanded_paths() {
            if path.is_dir() {
                loader.load_from_directory(&path)?;
            } else {
                debug!(?path, "ProfileLoader::new: directory does not exist, skipping");
            }
        }

        info!(count = loader.profiles.len(), "Loaded import profiles");
        Ok(loader)
    }

    fn load_builtins(&mut self) -> Result<()> {
        debug!("load_builtins: called");
        for name in BUILTIN_NAMES {
            let yaml = get_builtin(name).ok_or_else(|| eyre::eyre!("Builtin profile not embedded: {}", name))?;
            let profile: ImportProfile =
                serde_yaml::from_str(yaml).with_context(|| format!("Failed to parse builtin profile: {}", name))?;
            self.profiles.insert(name.to_string(), profile);
        }
        Ok(())
    }

    fn load_from_directory(&mut self, dir: &Path) -> Result<()> {
        debug!(?dir, "load_from_directory: called");
        let entries = fs::read_dir(dir).with_context(|| format!("Failed to read directory: {}", dir.display()))?;

        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if is_yaml(&path) {
                match Self::read_file(&path) {
                    Ok(profile) => {
                        debug!(?path, name = %profile.name, "load_from_directory: loaded profile");
                        self.profiles.insert(profile.name.clone(), profile);
                    }
                    Err(e) => warn!(?path, error = %e, "Failed to load profile file"),
                }
            } else {
                debug!(?path, "load_from_directory: skipping non-yaml file");
            }
        }
        Ok(())
    }

    /// Read one profile file; a missing `name` falls back to the file stem
    fn read_file(path: &Path) -> Result<ImportProfile> {
        debug!(?path, "read_file: called");
        let content = fs::read_to_string(path).with_context(|| format!("Failed to read: {}", path.display()))?;
        let mut profile: ImportProfile =
            serde_yaml::from_str(&content).with_context(|| format!("Failed to parse: {}", path.display()))?;
        if profile.name.trim().is_empty() {
            profile.name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| eyre::eyre!("Invalid filename: {}", path.display()))?
                .to_string();
        }
        Ok(profile)
    }

    /// Resolve a profile by name, or by path when `name_or_path` names a file
    pub fn load(&self, name_or_path: &str) -> Result<ImportProfile> {
        debug!(%name_or_path, "ProfileLoader::load: called");
        if let Some(profile) = self.profiles.get(name_or_path) {
            return Ok(profile.clone());
        }
        let path = Path::new(name_or_path);
        if path.is_file() {
            return Self::read_file(path);
        }
        Err(eyre::eyre!(
            "Unknown profile '{}'. Available: {}",
            name_or_path,
            self.names().join(", ")
        ))
    }

    /// Resolve and compile a profile
    pub fn plan(&self, name_or_path: &str) -> Result<ImportPlan> {
        let profile = self.load(name_or_path)?;
        profile
            .compile()
            .with_context(|| format!("Invalid profile '{}'", profile.name))
    }

    pub fn get(&self, name: &str) -> Option<&ImportProfile> {
        self.profiles.get(name)
    }

    /// Profile names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImportProfile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension().map(|e| e == "yml" || e == "yaml").unwrap_or(false)
}
