//! Searchable entry records and the keys that own them
use crate::error::SearchablesError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifies the application component that owns a searchable entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryKey {
    pub package: String,
    pub component: String,
}

impl EntryKey {
    pub fn new(package: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            component: component.into(),
        }
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.package, self.component)
    }
}

impl FromStr for EntryKey {
    type Err = SearchablesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((package, component)) if !package.is_empty() && !component.is_empty() => {
                Ok(Self::new(package, component))
            }
            _ => Err(SearchablesError::InvalidKey(s.to_string())),
        }
    }
}

/// One searchable target as published by an installed application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchableEntry {
    pub key: EntryKey,
    pub label: String,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub suggest_authority: Option<String>,
    #[serde(default)]
    pub include_in_global_search: bool,
    #[serde(default)]
    pub handles_web_search: bool,
    #[serde(default)]
    pub voice_search: bool,
}

impl SearchableEntry {
    pub fn new(key: EntryKey, label: impl Into<String>) -> Self {
        Self {
            key,
            label: label.into(),
            hint: None,
            suggest_authority: None,
            include_in_global_search: false,
            handles_web_search: false,
            voice_search: false,
        }
    }

    pub fn in_global_search(mut self, include: bool) -> Self {
        self.include_in_global_search = include;
        self
    }

    pub fn web_search(mut self, handles: bool) -> Self {
        self.handles_web_search = handles;
        self
    }

    /// Only web-search capable entries may become the default.
    pub fn is_default_eligible(&self) -> bool {
        self.handles_web_search
    }
}

impl fmt::Display for SearchableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.key, self.label)
    }
}
