//! Rule resolution: which group and label a resource ends up with

use crate::config::{GroupingKind, GroupingRule};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Subfolder name used when a resource sits directly in the rule's folder
pub const ROOT_SUBFOLDER: &str = "Root";

/// The group a resource should be placed in
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupTarget {
    /// The backend's default group
    Default,
    /// A named group, created on demand
    Named(String),
}

impl GroupTarget {
    pub fn is_default(&self) -> bool {
        matches!(self, GroupTarget::Default)
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            GroupTarget::Default => None,
            GroupTarget::Named(name) => Some(name),
        }
    }
}

impl fmt::Display for GroupTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupTarget::Default => write!(f, "<default>"),
            GroupTarget::Named(name) => write!(f, "{}", name),
        }
    }
}

/// Result of applying the rule list to one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub group: GroupTarget,
    pub label: Option<String>,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            group: GroupTarget::Default,
            label: None,
        }
    }
}

/// Applies an ordered rule list to resource paths.
///
/// Every matching rule is applied in declared order. The group and the label are
/// tracked independently: a later group rule replaces an earlier group but leaves
/// the label alone, and a later label rule replaces an earlier label but leaves
/// the group alone.
pub struct GroupResolver<'a> {
    rules: &'a [GroupingRule],
}

impl<'a> GroupResolver<'a> {
    pub fn new(rules: &'a [GroupingRule]) -> Self {
        Self { rules }
    }

    /// Resolve the target group and label for a resource path
    pub fn resolve(&self, resource_path: &str) -> Resolution {
        let mut resolution = Resolution::default();

        for rule in self.rules.iter().filter(|r| r.matches(resource_path)) {
            match rule.kind {
                GroupingKind::ByType => {
                    // A file without an extension has nothing to group by.
                    if let Some(ext) = extension(resource_path) {
                        resolution.group =
                            GroupTarget::Named(prefixed(&rule.group_name, &ext.to_lowercase()));
                    }
                }
                GroupingKind::BySubfolder => {
                    let subfolder = first_subfolder(&resource_path[rule.folder.len()..]);
                    resolution.group = GroupTarget::Named(prefixed(&rule.group_name, subfolder));
                }
                GroupingKind::CustomLabel => {
                    resolution.label = Some(rule.custom_label.clone());
                }
                GroupingKind::None => {}
            }
        }

        resolution
    }
}

fn prefixed(group_name: &str, suffix: &str) -> String {
    if group_name.is_empty() {
        suffix.to_string()
    } else {
        format!("{}-{}", group_name, suffix)
    }
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// First path segment of `remainder`, or [`ROOT_SUBFOLDER`] when it has no separator
fn first_subfolder(remainder: &str) -> &str {
    let trimmed = remainder.trim_start_matches(is_separator);
    match trimmed.split_once(is_separator) {
        Some((first, _)) => first,
        None => ROOT_SUBFOLDER,
    }
}

/// File name portion of a path
pub(crate) fn file_name(path: &str) -> &str {
    path.rsplit(is_separator).next().unwrap_or(path)
}

/// Extension of the file name, without the dot. Dotfiles have none.
pub(crate) fn extension(path: &str) -> Option<&str> {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(i) if i + 1 == name.len() => None,
        Some(i) => Some(&name[i + 1..]),
    }
}
