//! Layered settings for the build side
//!
//! Settings are loaded with three layers of precedence (highest wins):
//! 1. Environment variables: `SHELF_FAILURE_POLICY`, `SHELF_CONFIG_PATH`
//! 2. Project-local: `<root>/.shelf/settings.toml`
//! 3. Global: `~/.shelf/settings.toml`

use serde::{Deserialize, Serialize};
use shelf_core::{Result, ShelfError};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Directory under the project root holding Shelf's own files
pub const SHELF_DIR: &str = ".shelf";

/// What the pre-packaging hook does with a failed build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log the failure and let the host pipeline carry on
    #[default]
    Swallow,
    /// Return the failure to the caller so the host pipeline can stop
    Propagate,
}

impl FromStr for FailurePolicy {
    type Err = ShelfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "swallow" => Ok(FailurePolicy::Swallow),
            "propagate" | "strict" => Ok(FailurePolicy::Propagate),
            other => Err(ShelfError::InvalidConfig(format!(
                "unknown failure policy '{}'; valid values: swallow, propagate",
                other
            ))),
        }
    }
}

/// One settings file; every field optional so layers can be merged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub config_path: Option<PathBuf>,
    #[serde(default)]
    pub prefs_path: Option<PathBuf>,
    #[serde(default)]
    pub build_dir: Option<PathBuf>,
    #[serde(default)]
    pub failure_policy: Option<FailurePolicy>,
}

/// Resolved settings, paths made absolute against the project root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShelfSettings {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub prefs_path: PathBuf,
    pub build_dir: PathBuf,
    pub failure_policy: FailurePolicy,
}

impl ShelfSettings {
    /// Defaults for a project root, ignoring every settings file
    pub fn defaults<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        let shelf_dir = root.join(SHELF_DIR);
        Self {
            config_path: shelf_dir.join("config.toml"),
            prefs_path: shelf_dir.join("prefs.toml"),
            build_dir: shelf_dir.join("build"),
            failure_policy: FailurePolicy::default(),
            root,
        }
    }

    /// Load settings with layered precedence: global < project < env vars
    pub fn load<P: AsRef<Path>>(root: P) -> Result<Self> {
        let mut settings = Self::defaults(root);

        if let Some(global_path) = Self::global_settings_path() {
            if global_path.exists() {
                let global = Self::load_file(&global_path)?;
                settings.merge(global);
            }
        }

        let local_path = settings.root.join(SHELF_DIR).join("settings.toml");
        if local_path.exists() {
            let local = Self::load_file(&local_path)?;
            settings.merge(local);
        }

        settings.apply_env_overrides()?;
        Ok(settings)
    }

    /// Load from one specific file only, on top of defaults
    pub fn load_from_file<P: AsRef<Path>>(root: P, path: &Path) -> Result<Self> {
        let mut settings = Self::defaults(root);
        settings.merge(Self::load_file(path)?);
        Ok(settings)
    }

    fn global_settings_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(SHELF_DIR).join("settings.toml"))
    }

    fn load_file(path: &Path) -> Result<SettingsFile> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            ShelfError::InvalidConfig(format!("Failed to parse settings {}: {}", path.display(), e))
        })
    }

    fn merge(&mut self, overlay: SettingsFile) {
        if let Some(path) = overlay.config_path {
            self.config_path = self.root.join(path);
        }
        if let Some(path) = overlay.prefs_path {
            self.prefs_path = self.root.join(path);
        }
        if let Some(path) = overlay.build_dir {
            self.build_dir = self.root.join(path);
        }
        if let Some(policy) = overlay.failure_policy {
            self.failure_policy = policy;
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(policy) = std::env::var("SHELF_FAILURE_POLICY") {
            self.failure_policy = policy.parse()?;
        }
        if let Ok(path) = std::env::var("SHELF_CONFIG_PATH") {
            self.config_path = self.root.join(path);
        }
        Ok(())
    }
}
