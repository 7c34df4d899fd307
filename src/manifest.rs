//! Application manifests on disk as the set of installed applications
//!
//! Every `*.toml` file below the manifest directory describes one installed
//! application and the searchable components it publishes:
//!
//! ```toml
//! package = "com.example.mail"
//!
//! [[searchable]]
//! component = "MailSearch"
//! label = "Mail"
//! include_in_global_search = true
//! ```
use crate::entry::{EntryKey, SearchableEntry};
use crate::error::{Result, SearchablesError};
use crate::registry::EntryProvider;
use log::{debug, warn};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const MANIFEST_EXTENSION: &str = "toml";

#[derive(Debug, Deserialize)]
struct Manifest {
    package: String,
    #[serde(default, rename = "searchable")]
    searchables: Vec<ManifestSearchable>,
}

#[derive(Debug, Deserialize)]
struct ManifestSearchable {
    component: String,
    label: String,
    #[serde(default)]
    hint: Option<String>,
    #[serde(default)]
    suggest_authority: Option<String>,
    #[serde(default)]
    include_in_global_search: bool,
    #[serde(default)]
    handles_web_search: bool,
    #[serde(default)]
    voice_search: bool,
}

impl Manifest {
    fn into_entries(self) -> impl Iterator<Item = SearchableEntry> {
        let package = self.package;
        self.searchables.into_iter().map(move |s| SearchableEntry {
            key: EntryKey::new(package.clone(), s.component),
            label: s.label,
            hint: s.hint,
            suggest_authority: s.suggest_authority,
            include_in_global_search: s.include_in_global_search,
            handles_web_search: s.handles_web_search,
            voice_search: s.voice_search,
        })
    }
}

/// Parses a single manifest file into its entries.
pub fn read_manifest(path: &Path) -> Result<Vec<SearchableEntry>> {
    let content = fs::read_to_string(path)?;
    let manifest: Manifest =
        toml::from_str(&content).map_err(|source| SearchablesError::Manifest {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(manifest.into_entries().collect())
}

pub fn is_manifest(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(MANIFEST_EXTENSION)
}

/// [`EntryProvider`] scanning a directory tree of manifests.
///
/// A manifest that fails to parse is skipped with a warning so one broken
/// application cannot hide every other entry. A missing directory is an error.
#[derive(Debug, Clone)]
pub struct ManifestDirProvider {
    root: PathBuf,
}

impl ManifestDirProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl EntryProvider for ManifestDirProvider {
    fn scan(&self) -> Result<Vec<SearchableEntry>> {
        if !self.root.is_dir() {
            return Err(SearchablesError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("manifest directory not found: {}", self.root.display()),
            )));
        }

        let mut entries = Vec::new();
        for dir_entry in WalkDir::new(&self.root).follow_links(true) {
            let dir_entry = dir_entry?;
            let path = dir_entry.path();
            if !dir_entry.file_type().is_file() || !is_manifest(path) {
                continue;
            }
            match read_manifest(path) {
                Ok(found) => {
                    debug!("{} searchables in {}", found.len(), path.display());
                    entries.extend(found);
                }
                Err(e) => warn!("Skipping manifest {}: {}", path.display(), e),
            }
        }
        Ok(entries)
    }
}
