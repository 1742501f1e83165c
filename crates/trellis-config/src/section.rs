//! Addressable subtrees of a configuration document.

use serde_json::Value;

/// Separator between segments of a section path.
pub const PATH_SEPARATOR: char = ':';

/// A subtree of a configuration document reached by a colon-delimited path.
///
/// A section whose path did not resolve wraps an absent value instead of
/// failing; binding an absent section produces a schema instance with every
/// field set to `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigurationSection {
    settings: Option<Value>,
}

impl ConfigurationSection {
    /// Wraps a resolved subtree, or `None` for an absent path.
    pub fn new(settings: Option<Value>) -> Self {
        Self { settings }
    }

    /// Returns a section that represents a missing path.
    pub fn absent() -> Self {
        Self { settings: None }
    }

    /// The wrapped subtree, if the path resolved.
    pub fn settings(&self) -> Option<&Value> {
        self.settings.as_ref()
    }

    /// Consumes the section and returns the wrapped subtree.
    pub fn into_settings(self) -> Option<Value> {
        self.settings
    }

    /// Whether the path that produced this section resolved.
    pub fn is_present(&self) -> bool {
        self.settings.is_some()
    }

    /// Addresses a deeper subtree relative to this section.
    pub fn get_section(&self, path: &str) -> ConfigurationSection {
        match &self.settings {
            Some(root) => Self::new(walk(root, path).cloned()),
            None => Self::absent(),
        }
    }
}

/// Walks `path` through nested objects. Any missing key or non-object on the
/// way yields `None`.
pub(crate) fn walk<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split(PATH_SEPARATOR)
        .try_fold(root, |current, segment| current.as_object()?.get(segment))
}
