//! Device mappings and enumeration results.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Local device path to the device identifier of the disk backing it.
pub type DeviceMappings = BTreeMap<String, String>;

/// How `enumerate` groups its results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetIdentifier {
    /// All matches land in a single group.
    #[default]
    None,
    /// Group matches by the value of this label key.
    Label(String),
}

impl SetIdentifier {
    /// Group key used for objects when no label grouping applies.
    pub const NONE_KEY: &'static str = "none";

    /// Group key for an object carrying `tags`.
    ///
    /// Objects lacking the label fall into the [`Self::NONE_KEY`] group.
    pub fn group_key(&self, tags: &crate::TagSet) -> String {
        match self {
            SetIdentifier::None => Self::NONE_KEY.to_string(),
            SetIdentifier::Label(key) => tags
                .get(key)
                .cloned()
                .unwrap_or_else(|| Self::NONE_KEY.to_string()),
        }
    }
}

impl fmt::Display for SetIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetIdentifier::None => f.write_str(Self::NONE_KEY),
            SetIdentifier::Label(key) => write!(f, "label:{}", key),
        }
    }
}

/// Objects returned by `enumerate`, grouped by set identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enumeration<T> {
    groups: BTreeMap<String, Vec<T>>,
}

impl<T> Default for Enumeration<T> {
    fn default() -> Self {
        Self {
            groups: BTreeMap::new(),
        }
    }
}

impl<T> Enumeration<T> {
    /// Create an empty enumeration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object to a group.
    pub fn push(&mut self, group: impl Into<String>, object: T) {
        self.groups.entry(group.into()).or_default().push(object);
    }

    /// Objects in a single group.
    pub fn group(&self, key: &str) -> &[T] {
        self.groups.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Group keys in order.
    pub fn group_keys(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Number of groups.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Total number of objects across all groups.
    pub fn object_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Whether no object matched.
    pub fn is_empty(&self) -> bool {
        self.object_count() == 0
    }

    /// Iterate over every object, group by group.
    pub fn objects(&self) -> impl Iterator<Item = &T> {
        self.groups.values().flatten()
    }
}
