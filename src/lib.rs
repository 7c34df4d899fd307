//! Lazily initialised registry of searchable application entries, kept in
//! sync with the installed applications through a debounced update worker.
pub mod announcer;
pub mod change_source;
pub mod cli;
pub mod config;
pub mod entry;
pub mod error;
pub mod manifest;
pub mod metrics;
pub mod registry;
pub mod scheduler;
pub mod service;
pub mod watcher;

pub use announcer::{Announcement, Announcer, ChannelAnnouncer};
pub use change_source::{ChangeEvent, ChangeKind, ChangeSource, LocalChangeSource, SubscriptionId};
pub use config::Config;
pub use entry::{EntryKey, SearchableEntry};
pub use error::{Result, SearchablesError};
pub use manifest::ManifestDirProvider;
pub use metrics::Metrics;
pub use registry::{EntryProvider, Registry, SnapshotRegistry, StaticProvider};
pub use scheduler::{DEFAULT_DEBOUNCE, DebounceScheduler};
pub use service::{SearchManagerService, global, install_global};
pub use watcher::ManifestWatcher;

use std::path::Path;
use std::sync::Arc;

/// Wires a service to a manifest directory: entries are scanned from it and
/// manifest edits below it trigger debounced rebuilds.
pub fn manifest_service(
    dir: &Path,
    config: &config::ServiceConfig,
    announcer: Arc<dyn Announcer>,
) -> SearchManagerService {
    let provider_dir = dir.to_path_buf();
    SearchManagerService::new(
        move || {
            Ok(Arc::new(SnapshotRegistry::new(ManifestDirProvider::new(
                provider_dir.clone(),
            ))) as Arc<dyn Registry>)
        },
        Arc::new(ManifestWatcher::new(dir)),
        announcer,
    )
    .with_config(config)
}
