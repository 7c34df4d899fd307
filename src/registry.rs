//! Registry of searchable entries with atomically swapped snapshots
use crate::entry::{EntryKey, SearchableEntry};
use crate::error::Result;
use log::debug;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The registry contract consumed by the service.
///
/// Implementations must tolerate `rebuild` running on the update worker
/// while `set_default` and the read accessors run on caller threads.
pub trait Registry: Send + Sync {
    /// Re-reads the installed applications and installs a fresh snapshot.
    fn rebuild(&self) -> Result<()>;

    fn find_by_key(&self, key: &EntryKey) -> Option<Arc<SearchableEntry>>;

    fn get_default(&self) -> Option<Arc<SearchableEntry>>;

    fn list_matching(
        &self,
        predicate: &dyn Fn(&SearchableEntry) -> bool,
    ) -> Vec<Arc<SearchableEntry>>;

    fn set_default(&self, key: &EntryKey) -> Result<()>;
}

/// Source of truth for the entries a rebuild should produce.
pub trait EntryProvider: Send + Sync {
    fn scan(&self) -> Result<Vec<SearchableEntry>>;
}

impl<F> EntryProvider for F
where
    F: Fn() -> Result<Vec<SearchableEntry>> + Send + Sync,
{
    fn scan(&self) -> Result<Vec<SearchableEntry>> {
        self()
    }
}

/// Entries handed over directly by the embedding host.
#[derive(Default)]
pub struct StaticProvider {
    entries: Mutex<Vec<SearchableEntry>>,
}

impl StaticProvider {
    pub fn new(entries: Vec<SearchableEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }

    /// Replaces what the next scan returns. Installed snapshots are untouched.
    pub fn replace(&self, entries: Vec<SearchableEntry>) {
        *self.entries.lock() = entries;
    }

    pub fn push(&self, entry: SearchableEntry) {
        self.entries.lock().push(entry);
    }
}

impl EntryProvider for StaticProvider {
    fn scan(&self) -> Result<Vec<SearchableEntry>> {
        Ok(self.entries.lock().clone())
    }
}

/// Immutable view of the entries produced by one rebuild.
#[derive(Debug, Default)]
pub struct Snapshot {
    entries: BTreeMap<EntryKey, Arc<SearchableEntry>>,
    generation: u64,
}

impl Snapshot {
    fn build(entries: Vec<SearchableEntry>, generation: u64) -> Self {
        let entries = entries
            .into_iter()
            .map(|entry| (entry.key.clone(), Arc::new(entry)))
            .collect();
        Self {
            entries,
            generation,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, key: &EntryKey) -> Option<&Arc<SearchableEntry>> {
        self.entries.get(key)
    }

    /// Entries in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<SearchableEntry>> {
        self.entries.values()
    }
}

/// Reference [`Registry`] that rebuilds from an [`EntryProvider`].
///
/// Readers clone the current `Arc<Snapshot>` and never wait for a scan; the
/// write lock is only taken to swap the pointer once a scan has finished.
pub struct SnapshotRegistry {
    provider: Box<dyn EntryProvider>,
    snapshot: RwLock<Arc<Snapshot>>,
    preferred_default: RwLock<Option<EntryKey>>,
    rebuild_lock: Mutex<()>,
}

impl SnapshotRegistry {
    /// Creates an empty registry. Nothing is scanned until [`Registry::rebuild`].
    pub fn new(provider: impl EntryProvider + 'static) -> Self {
        Self {
            provider: Box::new(provider),
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            preferred_default: RwLock::new(None),
            rebuild_lock: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.read().clone()
    }

    pub fn preferred_default(&self) -> Option<EntryKey> {
        self.preferred_default.read().clone()
    }
}

impl Registry for SnapshotRegistry {
    fn rebuild(&self) -> Result<()> {
        let _guard = self.rebuild_lock.lock();
        let entries = self.provider.scan()?;
        let generation = self.snapshot.read().generation + 1;
        let next = Arc::new(Snapshot::build(entries, generation));
        debug!(
            "Installing snapshot generation {} with {} entries",
            generation,
            next.len()
        );
        *self.snapshot.write() = next;
        Ok(())
    }

    fn find_by_key(&self, key: &EntryKey) -> Option<Arc<SearchableEntry>> {
        self.snapshot().get(key).cloned()
    }

    fn get_default(&self) -> Option<Arc<SearchableEntry>> {
        let snapshot = self.snapshot();
        let preferred = self.preferred_default.read().clone();
        preferred
            .and_then(|key| snapshot.get(&key).cloned())
            .or_else(|| {
                snapshot
                    .iter()
                    .find(|entry| entry.is_default_eligible())
                    .cloned()
            })
    }

    fn list_matching(
        &self,
        predicate: &dyn Fn(&SearchableEntry) -> bool,
    ) -> Vec<Arc<SearchableEntry>> {
        self.snapshot()
            .iter()
            .filter(|entry| predicate(entry))
            .cloned()
            .collect()
    }

    fn set_default(&self, key: &EntryKey) -> Result<()> {
        debug!("Preferring {} as default entry", key);
        *self.preferred_default.write() = Some(key.clone());
        Ok(())
    }
}
