use crate::error::{Result, SearchablesError};
use prometheus::{Encoder, IntCounter, Opts, Registry, TextEncoder};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    pub signals_received: IntCounter,
    pub rebuilds_completed: IntCounter,
    pub rebuilds_failed: IntCounter,
    pub announcements_sent: IntCounter,
    registry: Arc<Registry>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn counter(name: &str, help: &str) -> IntCounter {
    IntCounter::with_opts(Opts::new(name, help).namespace("searchables"))
        .expect("static metric definition is valid")
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();
        let signals_received = counter("signals_received", "Number of change signals received");
        let rebuilds_completed = counter("rebuilds_completed", "Number of successful rebuilds");
        let rebuilds_failed = counter(
            "rebuilds_failed",
            "Number of rebuilds that failed or panicked",
        );
        let announcements_sent = counter(
            "announcements_sent",
            "Number of searchables-changed announcements",
        );

        registry.register(Box::new(signals_received.clone())).ok();
        registry.register(Box::new(rebuilds_completed.clone())).ok();
        registry.register(Box::new(rebuilds_failed.clone())).ok();
        registry.register(Box::new(announcements_sent.clone())).ok();

        Metrics {
            signals_received,
            rebuilds_completed,
            rebuilds_failed,
            announcements_sent,
            registry: Arc::new(registry),
        }
    }

    pub fn gather(&self) -> Result<String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|e| SearchablesError::Other(e.to_string()))?;
        Ok(String::from_utf8(buffer).unwrap_or_default())
    }
}
