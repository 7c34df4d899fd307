//! Feeds of "installed applications changed" events
use crate::error::Result;
use log::debug;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Removed,
    Changed,
    /// Anything the source reports that does not affect searchables.
    Other(String),
}

impl ChangeKind {
    pub fn affects_searchables(&self) -> bool {
        matches!(self, ChangeKind::Added | ChangeKind::Removed | ChangeKind::Changed)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Added => write!(f, "added"),
            ChangeKind::Removed => write!(f, "removed"),
            ChangeKind::Changed => write!(f, "changed"),
            ChangeKind::Other(kind) => write!(f, "{kind}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    /// Package the event is about, when the source knows it.
    pub package: Option<String>,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, package: impl Into<String>) -> Self {
        Self {
            kind,
            package: Some(package.into()),
        }
    }

    pub fn added(package: impl Into<String>) -> Self {
        Self::new(ChangeKind::Added, package)
    }

    pub fn removed(package: impl Into<String>) -> Self {
        Self::new(ChangeKind::Removed, package)
    }

    pub fn changed(package: impl Into<String>) -> Self {
        Self::new(ChangeKind::Changed, package)
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.package {
            Some(package) => write!(f, "{} {}", package, self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

pub type ChangeHandler = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// An external feed of change events.
///
/// Handlers may be invoked on any thread the source chooses.
pub trait ChangeSource: Send + Sync {
    fn subscribe(&self, handler: ChangeHandler) -> Result<SubscriptionId>;

    /// Returns whether the subscription was still registered.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// In-process change source: whoever owns it calls [`LocalChangeSource::publish`].
#[derive(Default)]
pub struct LocalChangeSource {
    handlers: RwLock<HashMap<SubscriptionId, ChangeHandler>>,
}

impl LocalChangeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers the event synchronously on the calling thread.
    pub fn publish(&self, event: &ChangeEvent) {
        let handlers: Vec<ChangeHandler> = self.handlers.read().values().cloned().collect();
        debug!("Publishing '{}' to {} subscriber(s)", event, handlers.len());
        for handler in handlers {
            handler(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().len()
    }
}

impl ChangeSource for LocalChangeSource {
    fn subscribe(&self, handler: ChangeHandler) -> Result<SubscriptionId> {
        let id = SubscriptionId::next();
        self.handlers.write().insert(id, handler);
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.handlers.write().remove(&id).is_some()
    }
}
