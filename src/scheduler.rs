//! Debounced, serialized rebuild scheduling on a dedicated worker thread
//!
//! Signals may come from any thread. Each one pushes the pending rebuild out
//! to `signal time + window`; the worker runs the rebuild task once the
//! stream of signals has been quiet for the whole window. Signals that arrive
//! while a rebuild is running queue up behind it and schedule the next one.
use crate::error::{Result, SearchablesError};
use crate::metrics::Metrics;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use log::{debug, error, warn};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);
pub const DEFAULT_WORKER_NAME: &str = "searchables-update";

/// Work executed for every debounced burst of signals.
pub type RebuildTask = Box<dyn Fn() -> Result<()> + Send + 'static>;

#[derive(Debug)]
enum Command {
    Signal(Instant),
    Shutdown,
}

pub struct DebounceScheduler {
    sender: Sender<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
    window: Duration,
    metrics: Metrics,
}

impl DebounceScheduler {
    /// Spawns the worker thread. The task only ever runs on that thread.
    pub fn start<F>(name: &str, window: Duration, metrics: Metrics, task: F) -> Result<Self>
    where
        F: Fn() -> Result<()> + Send + 'static,
    {
        let (sender, receiver) = unbounded();
        let worker_metrics = metrics.clone();
        let task: RebuildTask = Box::new(task);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run_worker(receiver, window, task, worker_metrics))?;
        debug!("Started update worker '{}' with {:?} window", name, window);

        Ok(Self {
            sender,
            worker: Mutex::new(Some(handle)),
            window,
            metrics,
        })
    }

    /// Requests a rebuild. Never blocks.
    pub fn signal_change(&self) {
        self.metrics.signals_received.inc();
        if self.sender.send(Command::Signal(Instant::now())).is_err() {
            warn!("Update worker has stopped, dropping change signal");
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops the worker, discarding a rebuild that has not started yet.
    /// A rebuild already in progress is allowed to finish.
    pub fn shutdown(&self) -> Result<()> {
        let Some(handle) = self.worker.lock().take() else {
            return Ok(());
        };
        // The worker may already be gone; joining is enough then.
        let _ = self.sender.send(Command::Shutdown);
        if handle.thread().id() == thread::current().id() {
            return Ok(());
        }
        handle
            .join()
            .map_err(|_| SearchablesError::Other("update worker panicked".to_string()))
    }
}

impl Drop for DebounceScheduler {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("Failed to stop update worker: {}", e);
        }
    }
}

fn run_worker(receiver: Receiver<Command>, window: Duration, task: RebuildTask, metrics: Metrics) {
    let mut deadline: Option<Instant> = None;

    loop {
        let received = match deadline {
            None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
            Some(at) => receiver.recv_deadline(at),
        };

        match received {
            Ok(Command::Signal(sent_at)) => {
                let at = sent_at + window;
                // Concurrent senders can enqueue slightly out of order.
                deadline = Some(deadline.map_or(at, |current| current.max(at)));
            }
            Ok(Command::Shutdown) => {
                if deadline.is_some() {
                    debug!("Discarding pending rebuild on shutdown");
                }
                break;
            }
            Err(RecvTimeoutError::Timeout) => {
                deadline = None;
                execute(&task, &metrics);
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    debug!("Update worker exiting");
}

fn execute(task: &RebuildTask, metrics: &Metrics) {
    debug!("Running debounced rebuild");
    match panic::catch_unwind(AssertUnwindSafe(|| task())) {
        Ok(Ok(())) => metrics.rebuilds_completed.inc(),
        Ok(Err(e)) => {
            metrics.rebuilds_failed.inc();
            error!("Rebuild failed, keeping previous snapshot: {}", e);
        }
        Err(payload) => {
            metrics.rebuilds_failed.inc();
            error!(
                "Rebuild panicked, keeping previous snapshot: {}",
                panic_message(payload.as_ref())
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
