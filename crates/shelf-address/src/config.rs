//! Address configuration: resource folders and ordered grouping rules

use serde::{Deserialize, Serialize};
use shelf_core::{Result, ShelfError};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// How a matching rule affects a resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingKind {
    #[default]
    None,
    /// Group by lowercase file extension
    ByType,
    /// Group by the first subfolder below the rule's folder
    BySubfolder,
    /// Attach the rule's custom label
    CustomLabel,
}

impl fmt::Display for GroupingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupingKind::None => write!(f, "None"),
            GroupingKind::ByType => write!(f, "ByType"),
            GroupingKind::BySubfolder => write!(f, "BySubfolder"),
            GroupingKind::CustomLabel => write!(f, "CustomLabel"),
        }
    }
}

/// A single grouping rule. Rules apply to every resource whose path starts with `folder`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupingRule {
    pub folder: String,
    #[serde(default)]
    pub group_name: String,
    #[serde(default)]
    pub kind: GroupingKind,
    #[serde(default)]
    pub custom_label: String,
}

impl GroupingRule {
    pub fn by_type(folder: impl Into<String>, group_name: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            group_name: group_name.into(),
            kind: GroupingKind::ByType,
            custom_label: String::new(),
        }
    }

    pub fn by_subfolder(folder: impl Into<String>, group_name: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            group_name: group_name.into(),
            kind: GroupingKind::BySubfolder,
            custom_label: String::new(),
        }
    }

    pub fn custom_label(folder: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            group_name: String::new(),
            kind: GroupingKind::CustomLabel,
            custom_label: label.into(),
        }
    }

    /// Check whether this rule applies to a resource path
    pub fn matches(&self, resource_path: &str) -> bool {
        resource_path.starts_with(&self.folder)
    }
}

/// Canonical form of a project-relative folder.
///
/// Separators become `/`, empty and `.` segments are dropped, and there is no
/// leading or trailing separator. `None` when a `..` segment would leave the
/// project root.
pub fn normalize_folder(folder: &str) -> Option<String> {
    let mut parts = Vec::new();
    for part in folder.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => return None,
            part => parts.push(part),
        }
    }
    Some(parts.join("/"))
}

/// The configuration document: which folders hold resources and how to group them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressConfig {
    #[serde(default)]
    pub folders: Vec<String>,
    #[serde(default)]
    pub rules: Vec<GroupingRule>,
}

impl AddressConfig {
    pub fn new(folders: Vec<String>, rules: Vec<GroupingRule>) -> Self {
        Self { folders, rules }
    }

    /// The configuration written by `shelf init`
    pub fn scaffold() -> Self {
        Self {
            folders: vec!["Assets/Resources".to_string()],
            rules: Vec::new(),
        }
    }

    /// Rewrite every folder into its canonical form.
    ///
    /// Folders that leave the project root are kept as written so that
    /// [`AddressConfig::validate`] reports them.
    pub fn normalize(&mut self) {
        let rule_folders = self.rules.iter_mut().map(|rule| &mut rule.folder);
        for folder in self.folders.iter_mut().chain(rule_folders) {
            if let Some(normalized) = normalize_folder(folder) {
                *folder = normalized;
            }
        }
    }

    /// Check the document for mistakes that would make an assignment pass meaningless
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        let mut seen = HashSet::new();

        let mut check_form = |folder: &str| match normalize_folder(folder) {
            None => problems.push(format!("folder '{}' leaves the project root", folder)),
            Some(normalized) if normalized != folder => problems.push(format!(
                "folder '{}' is not in canonical form, write '{}'",
                folder, normalized
            )),
            Some(_) => {}
        };
        for folder in &self.folders {
            check_form(folder);
        }
        for rule in &self.rules {
            check_form(&rule.folder);
        }

        for folder in &self.folders {
            if folder.trim().is_empty() {
                problems.push("empty resource folder".to_string());
            } else if !seen.insert(folder.as_str()) {
                problems.push(format!("duplicate resource folder '{}'", folder));
            }
        }

        for (i, rule) in self.rules.iter().enumerate() {
            if rule.kind == GroupingKind::CustomLabel && rule.custom_label.trim().is_empty() {
                problems.push(format!("rule {} ({}) has no custom label", i, rule.folder));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ShelfError::InvalidConfig(problems.join("; ")))
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Loads and saves the configuration document
pub trait ConfigStore {
    /// Load the current document, or `None` when none exists yet
    fn load(&self) -> Result<Option<AddressConfig>>;

    fn save(&mut self, config: &AddressConfig) -> Result<()>;

    /// Human-readable location, used in log lines
    fn location(&self) -> String;
}

/// Config document stored as a TOML file
pub struct TomlConfigStore {
    path: PathBuf,
}

impl TomlConfigStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for TomlConfigStore {
    fn load(&self) -> Result<Option<AddressConfig>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        let mut config = AddressConfig::from_toml_str(&content).map_err(|e| {
            ShelfError::InvalidConfig(format!("Failed to parse {}: {}", self.path.display(), e))
        })?;
        config.normalize();
        Ok(Some(config))
    }

    fn save(&mut self, config: &AddressConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, config.to_toml_string()?)?;
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory config store
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    config: Option<AddressConfig>,
}

impl MemoryConfigStore {
    pub fn new(config: Option<AddressConfig>) -> Self {
        Self { config }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<Option<AddressConfig>> {
        Ok(self.config.clone())
    }

    fn save(&mut self, config: &AddressConfig) -> Result<()> {
        self.config = Some(config.clone());
        Ok(())
    }

    fn location(&self) -> String {
        "<memory>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_toml() {
        let toml_str = r#"
folders = ["Assets/Art", "Assets/Audio"]

[[rules]]
folder = "Assets/Art"
kind = "by_type"

[[rules]]
folder = "Assets/Art/ui"
kind = "custom_label"
custom_label = "ui"
"#;

        let config = AddressConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.folders, vec!["Assets/Art", "Assets/Audio"]);
        assert_eq!(config.rules.len(), 2);
        assert_eq!(config.rules[0].kind, GroupingKind::ByType);
        assert!(config.rules[0].group_name.is_empty());
        assert_eq!(config.rules[1].custom_label, "ui");
    }

    #[test]
    fn test_validate_duplicate_folder() {
        let config = AddressConfig::new(
            vec!["Assets/Art".to_string(), "Assets/Art".to_string()],
            vec![],
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate resource folder"));
    }

    #[test]
    fn test_validate_label_rule_without_label() {
        let mut rule = GroupingRule::custom_label("Assets/Art", "");
        rule.custom_label = "  ".to_string();
        let config = AddressConfig::new(vec!["Assets/Art".to_string()], vec![rule]);
        assert!(config.validate().is_err());

        let ok = AddressConfig::new(
            vec!["Assets/Art".to_string()],
            vec![GroupingRule::custom_label("Assets/Art", "ui")],
        );
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_rule_matches_prefix() {
        let rule = GroupingRule::by_type("Assets/Art", "");
        assert!(rule.matches("Assets/Art/icons/sword.png"));
        assert!(!rule.matches("Assets/Audio/hit.wav"));
    }

    #[test]
    fn test_normalize_folder() {
        assert_eq!(normalize_folder("./Assets/Art").as_deref(), Some("Assets/Art"));
        assert_eq!(normalize_folder("Assets\\Art\\").as_deref(), Some("Assets/Art"));
        assert_eq!(normalize_folder("/Assets//Art/./ui").as_deref(), Some("Assets/Art/ui"));
        assert_eq!(normalize_folder("Assets/../Secrets"), None);
    }

    #[test]
    fn test_validate_rejects_non_canonical_folders() {
        let config = AddressConfig::new(
            vec!["./Assets/Art".to_string()],
            vec![GroupingRule::by_type("Assets/Art/", "")],
        );
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("'./Assets/Art' is not in canonical form"));
        assert!(err.contains("'Assets/Art/' is not in canonical form"));

        let mut fixed = config.clone();
        fixed.normalize();
        assert_eq!(fixed.folders, vec!["Assets/Art"]);
        assert_eq!(fixed.rules[0].folder, "Assets/Art");
        assert!(fixed.validate().is_ok());

        let escaping = AddressConfig::new(vec!["../Elsewhere".to_string()], vec![]);
        let mut normalized = escaping.clone();
        normalized.normalize();
        assert_eq!(normalized, escaping);
        assert!(escaping
            .validate()
            .unwrap_err()
            .to_string()
            .contains("leaves the project root"));
    }

    #[test]
    fn test_toml_store_normalizes_folders() {
        let dir = std::env::temp_dir().join(format!("shelf_test_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        fs::write(
            &path,
            r#"
folders = ["./Assets/Art"]

[[rules]]
folder = "./Assets/Art/ui"
kind = "custom_label"
custom_label = "ui"
"#,
        )
        .unwrap();

        let config = TomlConfigStore::new(&path).load().unwrap().unwrap();
        assert_eq!(config.folders, vec!["Assets/Art"]);
        assert!(config.rules[0].matches("Assets/Art/ui/button.png"));
        assert!(config.validate().is_ok());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_toml_store_missing_file() {
        let path = std::env::temp_dir()
            .join(format!("shelf_test_{}", uuid::Uuid::new_v4()))
            .join("config.toml");
        let store = TomlConfigStore::new(&path);
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_toml_store_save_and_load() {
        let dir = std::env::temp_dir().join(format!("shelf_test_{}", uuid::Uuid::new_v4()));
        let mut store = TomlConfigStore::new(dir.join(".shelf").join("config.toml"));

        let config = AddressConfig::new(
            vec!["Assets/Art".to_string()],
            vec![GroupingRule::by_subfolder("Assets/Art", "art")],
        );
        store.save(&config).unwrap();
        assert_eq!(store.load().unwrap(), Some(config));

        fs::remove_dir_all(&dir).ok();
    }
}
