//! File system backed change source for a manifest directory
use crate::change_source::{ChangeEvent, ChangeHandler, ChangeKind, ChangeSource, SubscriptionId};
use crate::error::{Result, SearchablesError};
use crate::manifest::is_manifest;
use log::{debug, error};
use notify::event::ModifyKind;
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

type Handlers = Arc<RwLock<HashMap<SubscriptionId, ChangeHandler>>>;

/// Watches a manifest directory and reports manifest additions, removals
/// and edits as package change events.
///
/// The underlying OS watcher only runs while at least one subscriber exists.
pub struct ManifestWatcher {
    root: PathBuf,
    handlers: Handlers,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl ManifestWatcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            handlers: Arc::new(RwLock::new(HashMap::new())),
            watcher: Mutex::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.lock().is_some()
    }

    fn spawn_watcher(&self) -> Result<RecommendedWatcher> {
        let handlers = self.handlers.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if let Some(change) = translate_event(&event) {
                        dispatch(&handlers, &change);
                    }
                }
                Err(e) => error!("Manifest watcher error: {}", e),
            },
            NotifyConfig::default(),
        )?;
        watcher.watch(&self.root, RecursiveMode::Recursive)?;
        debug!("Watching {} for manifest changes", self.root.display());
        Ok(watcher)
    }
}

fn dispatch(handlers: &Handlers, change: &ChangeEvent) {
    let handlers: Vec<ChangeHandler> = handlers.read().values().cloned().collect();
    for handler in handlers {
        handler(change);
    }
}

/// Maps a raw notification onto a package change. Paths that are not
/// manifests produce nothing.
pub fn translate_event(event: &Event) -> Option<ChangeEvent> {
    let path = event.paths.first()?;
    if !is_manifest(path) {
        return None;
    }
    let package = path.file_stem()?.to_string_lossy().into_owned();

    let kind = match &event.kind {
        EventKind::Create(_) => ChangeKind::Added,
        EventKind::Remove(_) => ChangeKind::Removed,
        EventKind::Modify(ModifyKind::Metadata(_)) => ChangeKind::Other("metadata".to_string()),
        EventKind::Modify(_) => ChangeKind::Changed,
        EventKind::Access(_) => ChangeKind::Other("access".to_string()),
        EventKind::Any | EventKind::Other => ChangeKind::Other("unknown".to_string()),
    };
    Some(ChangeEvent::new(kind, package))
}

impl ChangeSource for ManifestWatcher {
    fn subscribe(&self, handler: ChangeHandler) -> Result<SubscriptionId> {
        let mut watcher = self.watcher.lock();
        if watcher.is_none() {
            *watcher = Some(
                self.spawn_watcher()
                    .map_err(|e| SearchablesError::Subscription(e.to_string()))?,
            );
        }
        let id = SubscriptionId::next();
        self.handlers.write().insert(id, handler);
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut watcher = self.watcher.lock();
        let (removed, idle) = {
            let mut handlers = self.handlers.write();
            (handlers.remove(&id).is_some(), handlers.is_empty())
        };
        // Dropping the OS watcher joins its event thread, which may be
        // waiting on the handler lock, so that lock must be released first.
        if idle && let Some(stopped) = watcher.take() {
            drop(stopped);
            debug!("Stopped watching {}", self.root.display());
        }
        removed
    }
}
