//! Process-wide facade over the searchables registry
//!
//! The registry, the update worker and the change-source subscription are
//! created together on first use, exactly once, under one lock. Reads go
//! straight to the registry's current snapshot; external changes are routed
//! through the [`DebounceScheduler`] so bursts cost a single rebuild.
use crate::announcer::{Announcement, Announcer};
use crate::change_source::{ChangeEvent, ChangeHandler, ChangeSource, SubscriptionId};
use crate::config::ServiceConfig;
use crate::entry::{EntryKey, SearchableEntry};
use crate::error::{Result, SearchablesError};
use crate::metrics::Metrics;
use crate::registry::Registry;
use crate::scheduler::{DEFAULT_DEBOUNCE, DEFAULT_WORKER_NAME, DebounceScheduler};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

pub type RegistryFactory = Box<dyn Fn() -> Result<Arc<dyn Registry>> + Send + Sync>;

struct Runtime {
    registry: Arc<dyn Registry>,
    scheduler: Arc<DebounceScheduler>,
    subscription: Mutex<Option<SubscriptionId>>,
}

pub struct SearchManagerService {
    factory: RegistryFactory,
    change_source: Arc<dyn ChangeSource>,
    announcer: Arc<dyn Announcer>,
    debounce: Duration,
    worker_name: String,
    metrics: Metrics,
    runtime: Mutex<Option<Arc<Runtime>>>,
    closed: AtomicBool,
}

impl SearchManagerService {
    /// Nothing is built until the first call that needs the registry.
    pub fn new<F>(
        factory: F,
        change_source: Arc<dyn ChangeSource>,
        announcer: Arc<dyn Announcer>,
    ) -> Self
    where
        F: Fn() -> Result<Arc<dyn Registry>> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            change_source,
            announcer,
            debounce: DEFAULT_DEBOUNCE,
            worker_name: DEFAULT_WORKER_NAME.to_string(),
            metrics: Metrics::new(),
            runtime: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }

    pub fn with_config(self, config: &ServiceConfig) -> Self {
        self.with_debounce(config.debounce())
            .with_worker_name(config.worker_thread_name.clone())
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn is_initialized(&self) -> bool {
        self.runtime.lock().is_some()
    }

    /// Builds the registry, starts the update worker and subscribes to the
    /// change source, unless that already happened. Safe to race from any
    /// number of threads; exactly one of them does the work.
    pub fn ensure_initialized(&self) -> Result<()> {
        self.runtime().map(|_| ())
    }

    fn runtime(&self) -> Result<Arc<Runtime>> {
        let mut slot = self.runtime.lock();
        if let Some(runtime) = slot.as_ref() {
            return Ok(runtime.clone());
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(SearchablesError::Closed);
        }

        let registry = (self.factory)()?;
        if let Err(e) = registry.rebuild() {
            error!("Initial searchables build failed, starting empty: {}", e);
        }

        let scheduler = Arc::new(DebounceScheduler::start(
            &self.worker_name,
            self.debounce,
            self.metrics.clone(),
            {
                let registry = registry.clone();
                let announcer = self.announcer.clone();
                let metrics = self.metrics.clone();
                move || {
                    registry.rebuild()?;
                    announce(announcer.as_ref(), &metrics);
                    Ok(())
                }
            },
        )?);

        let target = Arc::downgrade(&scheduler);
        let handler: ChangeHandler = Arc::new(move |event: &ChangeEvent| forward(&target, event));
        let subscription = self.change_source.subscribe(handler)?;

        info!(
            "Searchables service initialized (debounce {:?}, worker '{}')",
            self.debounce, self.worker_name
        );
        let runtime = Arc::new(Runtime {
            registry,
            scheduler,
            subscription: Mutex::new(Some(subscription)),
        });
        *slot = Some(runtime.clone());
        Ok(runtime)
    }

    pub fn registry(&self) -> Result<Arc<dyn Registry>> {
        Ok(self.runtime()?.registry.clone())
    }

    /// Requests a debounced rebuild, exactly as a relevant change event would.
    pub fn signal_change(&self) -> Result<()> {
        self.runtime()?.scheduler.signal_change();
        Ok(())
    }

    /// A missing or unknown key is simply not found.
    pub fn get_entry_by_key(&self, key: Option<&EntryKey>) -> Result<Option<Arc<SearchableEntry>>> {
        let registry = self.registry()?;
        Ok(key.and_then(|key| registry.find_by_key(key)))
    }

    pub fn get_default_entry(&self) -> Result<Option<Arc<SearchableEntry>>> {
        Ok(self.registry()?.get_default())
    }

    /// Served from whatever snapshot is live, even while a rebuild runs.
    pub fn list_entries<P>(&self, predicate: P) -> Result<Vec<Arc<SearchableEntry>>>
    where
        P: Fn(&SearchableEntry) -> bool,
    {
        Ok(self.registry()?.list_matching(&predicate))
    }

    /// Updates the default on the calling thread and announces immediately,
    /// bypassing the debounce window.
    pub fn set_default_entry(&self, key: &EntryKey) -> Result<()> {
        self.registry()?.set_default(key)?;
        announce(self.announcer.as_ref(), &self.metrics);
        Ok(())
    }

    /// With `global_search` the default entry, otherwise the entry owned by
    /// `launch`.
    pub fn searchable_for(
        &self,
        launch: Option<&EntryKey>,
        global_search: bool,
    ) -> Result<Option<Arc<SearchableEntry>>> {
        if global_search {
            return self.get_default_entry();
        }
        if launch.is_none() {
            error!("searchable_for() called without a launching component");
        }
        self.get_entry_by_key(launch)
    }

    pub fn entries_in_global_search(&self) -> Result<Vec<Arc<SearchableEntry>>> {
        self.list_entries(|entry| entry.include_in_global_search)
    }

    pub fn entries_for_web_search(&self) -> Result<Vec<Arc<SearchableEntry>>> {
        self.list_entries(|entry| entry.handles_web_search)
    }

    pub fn default_for_web_search(&self) -> Result<Option<Arc<SearchableEntry>>> {
        self.get_default_entry()
    }

    /// Unsubscribes from the change source and stops the update worker.
    /// Reads keep serving the last snapshot. Calling it again does nothing.
    pub fn shutdown(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        let Some(runtime) = self.runtime.lock().clone() else {
            return Ok(());
        };

        if let Some(id) = runtime.subscription.lock().take() {
            if !self.change_source.unsubscribe(id) {
                warn!("Change source no longer knew subscription {:?}", id);
            }
            info!("Searchables service shut down");
        }
        runtime.scheduler.shutdown()
    }
}

impl Drop for SearchManagerService {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("Failed to shut down searchables service: {}", e);
        }
    }
}

fn forward(scheduler: &Weak<DebounceScheduler>, event: &ChangeEvent) {
    if !event.kind.affects_searchables() {
        return;
    }
    debug!("Got {}", event);
    if let Some(scheduler) = scheduler.upgrade() {
        scheduler.signal_change();
    }
}

fn announce(announcer: &dyn Announcer, metrics: &Metrics) {
    announcer.announce(Announcement::SearchablesChanged);
    metrics.announcements_sent.inc();
}

static GLOBAL: OnceLock<SearchManagerService> = OnceLock::new();

/// Installs the process-wide service. Only the first call succeeds.
pub fn install_global(service: SearchManagerService) -> Result<&'static SearchManagerService> {
    let mut installed = false;
    let global = GLOBAL.get_or_init(|| {
        installed = true;
        service
    });
    if installed {
        Ok(global)
    } else {
        Err(SearchablesError::Other(
            "a global searchables service is already installed".to_string(),
        ))
    }
}

pub fn global() -> Option<&'static SearchManagerService> {
    GLOBAL.get()
}
