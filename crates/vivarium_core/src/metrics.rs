//! Performance metrics collection for the simulation.
//!
//! Structured logging and counters for monitoring simulation health.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Metrics collector shared by the world and the tick loop.
pub struct Metrics {
    tick_count: AtomicU64,
    generation: AtomicU64,
    agent_count: AtomicU64,
    pub counters: Mutex<HashMap<String, AtomicU64>>,
    start_time: Instant,
    log_interval: u64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new(100)
    }
}

impl Metrics {
    /// Creates a new metrics collector logging every `log_interval` ticks.
    #[must_use]
    pub fn new(log_interval: u64) -> Self {
        Self {
            tick_count: AtomicU64::new(0),
            generation: AtomicU64::new(0),
            agent_count: AtomicU64::new(0),
            counters: Mutex::new(HashMap::new()),
            start_time: Instant::now(),
            log_interval: log_interval.max(1),
        }
    }

    /// Records a completed tick with its duration.
    pub fn record_tick(&self, duration: Duration, agents: usize) {
        self.tick_count.fetch_add(1, Ordering::Relaxed);
        self.agent_count.store(agents as u64, Ordering::Relaxed);

        let tick = self.tick_count.load(Ordering::Relaxed);
        if tick % self.log_interval == 0 {
            tracing::info!(
                tick = tick,
                generation = self.generation.load(Ordering::Relaxed),
                agents = agents,
                duration_us = duration.as_micros() as u64,
                "Simulation tick"
            );
        }
    }

    /// Records a completed genetic epoch.
    pub fn record_generation(&self, generation: u64) {
        self.generation.store(generation, Ordering::Relaxed);
    }

    /// Increments a named counter.
    pub fn increment_counter(&self, name: &str) {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn agent_count(&self) -> u64 {
        self.agent_count.load(Ordering::Relaxed)
    }

    /// Elapsed time since metrics creation.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Initialize tracing subscriber for logging.
pub fn init_logging() {
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(tracing::Level::INFO)
            .finish(),
    )
    .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new(10);
        assert_eq!(metrics.tick_count(), 0);
        assert_eq!(metrics.generation(), 0);
    }

    #[test]
    fn test_record_tick() {
        let metrics = Metrics::new(10);
        metrics.record_tick(Duration::from_millis(16), 64);
        assert_eq!(metrics.tick_count(), 1);
        assert_eq!(metrics.agent_count(), 64);
    }

    #[test]
    fn test_increment_counter() {
        let metrics = Metrics::new(10);
        metrics.increment_counter("kills");
        metrics.increment_counter("kills");
        let counters = metrics.counters.lock().unwrap();
        assert_eq!(counters["kills"].load(Ordering::Relaxed), 2);
    }
}
