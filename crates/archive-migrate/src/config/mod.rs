//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{MigrateError, Result};

/// Project file name inside the project directory.
pub const PROJECT_FILE: &str = "dbt_project.yml";

/// Profiles file name inside the profiles directory.
pub const PROFILES_FILE: &str = "profiles.yml";

/// `~/.dbt`, or `.dbt` relative to the working directory when no home
/// directory is known.
pub fn default_profiles_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".dbt"))
        .unwrap_or_else(|| PathBuf::from(".dbt"))
}

impl ProjectConfig {
    /// Load `dbt_project.yml` from a project directory.
    pub fn load<P: AsRef<Path>>(project_dir: P) -> Result<Self> {
        let path = project_dir.as_ref().join(PROJECT_FILE);
        debug!("Loading project from {}", path.display());
        let content = std::fs::read_to_string(&path).map_err(|e| {
            MigrateError::Config(format!("could not read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse project configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ProjectConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validation::validate_project(self)
    }

    /// Directory definitions are written to, relative to `project_dir`.
    pub fn snapshot_dir(&self, project_dir: &Path) -> Result<PathBuf> {
        let first = self
            .snapshot_paths
            .first()
            .ok_or_else(|| MigrateError::Config("snapshot-paths is empty".into()))?;
        Ok(normalize(&project_dir.join(first)))
    }
}

/// Lexically drop `.` segments so logged paths read cleanly.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, std::path::Component::CurDir))
        .collect()
}

/// A profile output chosen for this run.
#[derive(Debug, Clone)]
pub struct ResolvedOutput {
    pub profile: String,
    pub target: String,
    pub output: OutputConfig,
}

impl ProfilesConfig {
    /// Load `profiles.yml` from a profiles directory.
    pub fn load<P: AsRef<Path>>(profiles_dir: P) -> Result<Self> {
        let path = profiles_dir.as_ref().join(PROFILES_FILE);
        debug!("Loading profiles from {}", path.display());
        let content = std::fs::read_to_string(&path).map_err(|e| {
            MigrateError::Config(format!("could not read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Names of the profiles in the file.
    pub fn profile_names(&self) -> Vec<&str> {
        self.entries
            .keys()
            .filter(|k| k.as_str() != "config")
            .map(String::as_str)
            .collect()
    }

    pub fn profile(&self, name: &str) -> Result<Profile> {
        let value = self
            .entries
            .get(name)
            .filter(|_| name != "config")
            .ok_or_else(|| {
                MigrateError::Config(format!(
                    "profile '{}' not found; available profiles: {}",
                    name,
                    self.profile_names().join(", ")
                ))
            })?;
        serde_yaml::from_value(value.clone()).map_err(|e| {
            MigrateError::Config(format!("profile '{}' is invalid: {}", name, e))
        })
    }

    /// Pick the output for `profile`, using `target` or the profile's
    /// default target.
    pub fn resolve(&self, profile: &str, target: Option<&str>) -> Result<ResolvedOutput> {
        let entry = self.profile(profile)?;
        let target = match target {
            Some(t) => t.to_string(),
            None => entry.target.clone().ok_or_else(|| {
                MigrateError::Config(format!(
                    "profile '{}' has no default target; pass --target",
                    profile
                ))
            })?,
        };
        let output = entry.outputs.get(&target).cloned().ok_or_else(|| {
            MigrateError::Config(format!(
                "target '{}' not found in profile '{}'",
                target, profile
            ))
        })?;
        validation::validate_output(&output)?;
        Ok(ResolvedOutput {
            profile: profile.to_string(),
            target,
            output,
        })
    }
}
