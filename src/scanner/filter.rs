//! Extension allow-list filtering.

use std::collections::HashSet;
use std::path::Path;

use crate::storage::extension_of;

/// Case-insensitive extension allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
    allowed: HashSet<String>,
}

impl ExtensionFilter {
    /// Build a filter from bare extensions such as `"flac"`.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { allowed }
    }

    /// Check whether a path carries an allowed extension.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| self.allowed.contains(&ext))
    }

    /// Number of allowed extensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.allowed.len()
    }

    /// Whether nothing is allowed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }
}
