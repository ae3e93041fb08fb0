use shelf_core::ShelfError;
use thiserror::Error;

/// Why a load produced nothing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("failed to load '{key}': {reason}")]
    Failed { key: String, reason: String },

    #[error("nothing found for '{key}'")]
    Empty { key: String },
}

impl LoadError {
    pub fn key(&self) -> &str {
        match self {
            LoadError::Failed { key, .. } | LoadError::Empty { key } => key,
        }
    }
}

impl From<LoadError> for ShelfError {
    fn from(err: LoadError) -> Self {
        ShelfError::Load(err.to_string())
    }
}

/// How a load that did not fail ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome<T> {
    Loaded(T),
    /// The caller cancelled; the in-flight handle was released
    Cancelled,
}

impl<T> LoadOutcome<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LoadOutcome::Cancelled)
    }

    pub fn loaded(self) -> Option<T> {
        match self {
            LoadOutcome::Loaded(value) => Some(value),
            LoadOutcome::Cancelled => None,
        }
    }
}
