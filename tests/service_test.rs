use crossbeam_channel::{Receiver, Sender, unbounded};
use searchables::{
    Announcement, Announcer, ChangeEvent, ChangeKind, EntryKey, EntryProvider, LocalChangeSource,
    Registry, Result, SearchManagerService, SearchableEntry, SearchablesError, SnapshotRegistry,
    StaticProvider,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Default)]
struct CountingAnnouncer {
    count: AtomicUsize,
}

impl CountingAnnouncer {
    fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl Announcer for CountingAnnouncer {
    fn announce(&self, announcement: Announcement) {
        assert_eq!(announcement, Announcement::SearchablesChanged);
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Wraps a snapshot registry and records how rebuilds behave.
struct ProbeRegistry {
    inner: SnapshotRegistry,
    rebuild_delay: Duration,
    rebuilds: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ProbeRegistry {
    fn new(provider: Arc<StaticProvider>, rebuild_delay: Duration) -> Self {
        Self {
            inner: SnapshotRegistry::new(move || provider.scan()),
            rebuild_delay,
            rebuilds: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    fn rebuilds(&self) -> usize {
        self.rebuilds.load(Ordering::SeqCst)
    }
}

impl Registry for ProbeRegistry {
    fn rebuild(&self) -> Result<()> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        thread::sleep(self.rebuild_delay);
        let result = self.inner.rebuild();
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.rebuilds.fetch_add(1, Ordering::SeqCst);
        result
    }

    fn find_by_key(&self, key: &EntryKey) -> Option<Arc<SearchableEntry>> {
        self.inner.find_by_key(key)
    }

    fn get_default(&self) -> Option<Arc<SearchableEntry>> {
        self.inner.get_default()
    }

    fn list_matching(
        &self,
        predicate: &dyn Fn(&SearchableEntry) -> bool,
    ) -> Vec<Arc<SearchableEntry>> {
        self.inner.list_matching(predicate)
    }

    fn set_default(&self, key: &EntryKey) -> Result<()> {
        self.inner.set_default(key)
    }
}

fn entry(package: &str) -> SearchableEntry {
    SearchableEntry::new(EntryKey::new(package, "Search"), package)
        .web_search(true)
        .in_global_search(true)
}

struct Harness {
    service: SearchManagerService,
    source: Arc<LocalChangeSource>,
    announcer: Arc<CountingAnnouncer>,
    registry: Arc<ProbeRegistry>,
    provider: Arc<StaticProvider>,
    constructions: Arc<AtomicUsize>,
}

fn harness(window: Duration, rebuild_delay: Duration) -> Harness {
    let provider = Arc::new(StaticProvider::new(vec![entry("alpha"), entry("beta")]));
    let registry = Arc::new(ProbeRegistry::new(provider.clone(), rebuild_delay));
    let source = Arc::new(LocalChangeSource::new());
    let announcer = Arc::new(CountingAnnouncer::default());
    let constructions = Arc::new(AtomicUsize::new(0));

    let created = registry.clone();
    let counter = constructions.clone();
    let service = SearchManagerService::new(
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(created.clone() as Arc<dyn Registry>)
        },
        source.clone(),
        announcer.clone(),
    )
    .with_debounce(window);

    Harness {
        service,
        source,
        announcer,
        registry,
        provider,
        constructions,
    }
}

fn sleep_until(start: Instant, offset: Duration) {
    let target = start + offset;
    let now = Instant::now();
    if target > now {
        thread::sleep(target - now);
    }
}

#[test]
fn test_concurrent_first_access_initializes_once() {
    let h = Arc::new(harness(Duration::from_millis(200), Duration::from_millis(20)));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let h = h.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                h.service.ensure_initialized().unwrap();
                let alpha = EntryKey::new("alpha", "Search");
                assert!(h.service.get_entry_by_key(Some(&alpha)).unwrap().is_some());
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(h.constructions.load(Ordering::SeqCst), 1);
    assert_eq!(h.registry.rebuilds(), 1);
    assert_eq!(h.source.subscriber_count(), 1);
}

#[test]
fn test_burst_of_changes_rebuilds_once_after_quiet_window() {
    let h = harness(Duration::from_millis(200), Duration::ZERO);
    h.service.ensure_initialized().unwrap();
    let initial = h.registry.rebuilds();

    let start = Instant::now();
    for i in 0..4 {
        sleep_until(start, Duration::from_millis(50 * i));
        h.source.publish(&ChangeEvent::changed("alpha"));
    }

    sleep_until(start, Duration::from_millis(300));
    assert_eq!(h.registry.rebuilds(), initial);
    assert_eq!(h.announcer.count(), 0);

    sleep_until(start, Duration::from_millis(550));
    assert_eq!(h.registry.rebuilds(), initial + 1);
    assert_eq!(h.announcer.count(), 1);
    assert_eq!(h.service.metrics().signals_received.get(), 4);
}

#[test]
fn test_rebuilds_never_overlap() {
    let h = Arc::new(harness(Duration::from_millis(10), Duration::from_millis(60)));
    h.service.ensure_initialized().unwrap();

    let senders: Vec<_> = (0..3)
        .map(|_| {
            let h = h.clone();
            thread::spawn(move || {
                for _ in 0..10 {
                    h.source.publish(&ChangeEvent::added("gamma"));
                    thread::sleep(Duration::from_millis(50));
                }
            })
        })
        .collect();
    for sender in senders {
        sender.join().unwrap();
    }
    thread::sleep(Duration::from_millis(300));

    assert!(h.registry.rebuilds() > 2);
    assert_eq!(h.registry.peak.load(Ordering::SeqCst), 1);
}

#[test]
fn test_reads_do_not_wait_for_rebuild() {
    let (started_tx, started_rx): (Sender<()>, Receiver<()>) = unbounded();
    let (release_tx, release_rx): (Sender<()>, Receiver<()>) = unbounded();
    let hold = Arc::new(AtomicBool::new(false));
    let provider = Arc::new(StaticProvider::new(vec![entry("alpha")]));

    let scan_hold = hold.clone();
    let scan_provider = provider.clone();
    let registry = Arc::new(SnapshotRegistry::new(move || {
        if scan_hold.load(Ordering::SeqCst) {
            started_tx.send(()).ok();
            release_rx.recv().ok();
        }
        scan_provider.scan()
    }));
    let announcer = Arc::new(CountingAnnouncer::default());
    let source = Arc::new(LocalChangeSource::new());
    let service = SearchManagerService::new(
        move || Ok(registry.clone() as Arc<dyn Registry>),
        source.clone(),
        announcer.clone(),
    )
    .with_debounce(Duration::from_millis(10));
    service.ensure_initialized().unwrap();

    hold.store(true, Ordering::SeqCst);
    provider.push(entry("beta"));
    source.publish(&ChangeEvent::added("beta"));
    started_rx.recv_timeout(Duration::from_secs(2)).unwrap();

    let before = Instant::now();
    let entries = service.list_entries(|_| true).unwrap();
    assert!(before.elapsed() < Duration::from_millis(100));
    assert_eq!(entries.len(), 1);
    let beta = EntryKey::new("beta", "Search");
    assert!(service.get_entry_by_key(Some(&beta)).unwrap().is_none());

    release_tx.send(()).unwrap();
    thread::sleep(Duration::from_millis(100));
    assert_eq!(service.list_entries(|_| true).unwrap().len(), 2);
    assert_eq!(announcer.count(), 1);
}

#[test]
fn test_set_default_is_immediate_and_announced() {
    let h = harness(Duration::from_millis(200), Duration::ZERO);
    let beta = EntryKey::new("beta", "Search");

    assert_eq!(h.service.get_default_entry().unwrap().unwrap().key.package, "alpha");
    h.service.set_default_entry(&beta).unwrap();
    assert_eq!(h.service.get_default_entry().unwrap().unwrap().key, beta);
    assert_eq!(h.announcer.count(), 1);
    assert_eq!(h.registry.rebuilds(), 1);
}

#[test]
fn test_missing_or_unknown_key_is_not_found() {
    let h = harness(Duration::from_millis(200), Duration::ZERO);
    assert!(h.service.get_entry_by_key(None).unwrap().is_none());
    assert!(h
        .service
        .get_entry_by_key(Some(&EntryKey::new("nobody", "Nothing")))
        .unwrap()
        .is_none());
}

#[test]
fn test_failed_rebuild_keeps_snapshot_and_worker() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let provider = Arc::new(StaticProvider::new(vec![entry("alpha")]));
    let scan_provider = provider.clone();
    let registry = Arc::new(SnapshotRegistry::new(move || {
        // Initial build succeeds, the first rebuild fails, later ones succeed.
        if counter.fetch_add(1, Ordering::SeqCst) == 1 {
            return Err(SearchablesError::Rebuild("package database locked".to_string()));
        }
        scan_provider.scan()
    }));
    let announcer = Arc::new(CountingAnnouncer::default());
    let source = Arc::new(LocalChangeSource::new());
    let service = SearchManagerService::new(
        move || Ok(registry.clone() as Arc<dyn Registry>),
        source.clone(),
        announcer.clone(),
    )
    .with_debounce(Duration::from_millis(20));
    service.ensure_initialized().unwrap();

    provider.push(entry("beta"));
    source.publish(&ChangeEvent::added("beta"));
    thread::sleep(Duration::from_millis(150));
    assert_eq!(service.list_entries(|_| true).unwrap().len(), 1);
    assert_eq!(announcer.count(), 0);
    assert_eq!(service.metrics().rebuilds_failed.get(), 1);

    source.publish(&ChangeEvent::changed("beta"));
    thread::sleep(Duration::from_millis(150));
    assert_eq!(service.list_entries(|_| true).unwrap().len(), 2);
    assert_eq!(announcer.count(), 1);
}

#[test]
fn test_shutdown_unsubscribes_once() {
    let h = harness(Duration::from_millis(20), Duration::ZERO);
    h.service.ensure_initialized().unwrap();
    assert_eq!(h.source.subscriber_count(), 1);

    h.service.shutdown().unwrap();
    h.service.shutdown().unwrap();
    assert_eq!(h.source.subscriber_count(), 0);

    h.provider.push(entry("gamma"));
    h.source.publish(&ChangeEvent::added("gamma"));
    thread::sleep(Duration::from_millis(100));
    assert_eq!(h.registry.rebuilds(), 1);
    assert_eq!(h.service.list_entries(|_| true).unwrap().len(), 2);
}

#[test]
fn test_irrelevant_events_do_not_rebuild() {
    let h = harness(Duration::from_millis(20), Duration::ZERO);
    h.service.ensure_initialized().unwrap();

    h.source.publish(&ChangeEvent::new(ChangeKind::Other("data-cleared".into()), "alpha"));
    thread::sleep(Duration::from_millis(100));
    assert_eq!(h.registry.rebuilds(), 1);
    assert_eq!(h.announcer.count(), 0);
}

#[test]
fn test_end_to_end() {
    let h = harness(Duration::from_millis(200), Duration::ZERO);
    h.service.ensure_initialized().unwrap();
    let initial = h.registry.rebuilds();

    h.provider.push(entry("x"));
    h.source.publish(&ChangeEvent::added("x"));
    thread::sleep(Duration::from_millis(20));
    h.source.publish(&ChangeEvent::changed("x"));
    thread::sleep(Duration::from_millis(20));
    h.source.publish(&ChangeEvent::changed("x"));

    thread::sleep(Duration::from_millis(300));
    assert_eq!(h.registry.rebuilds() - initial, 1);
    assert_eq!(h.announcer.count(), 1);

    let x = EntryKey::new("x", "Search");
    h.service.set_default_entry(&x).unwrap();
    assert_eq!(h.announcer.count(), 2);
    assert_eq!(h.service.get_default_entry().unwrap().unwrap().key, x);
}
