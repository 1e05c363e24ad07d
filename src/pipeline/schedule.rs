// src/pipeline/schedule.rs

//! Periodic execution of poll cycles.

use std::future::Future;
use std::sync::Arc;

use tokio::time::{Instant, sleep_until};

use crate::config::ConfigProvider;
use crate::error::Result;
use crate::models::Config;
use crate::pipeline::cycle::PollCycle;
use crate::storage::HistoryStore;

type CycleFactory = dyn Fn(&Config, Arc<dyn HistoryStore>) -> Result<PollCycle> + Send + Sync;

/// Runs one cycle immediately, then one per poll interval.
///
/// Cycles run serially and never overlap. Each cycle is built from the
/// configuration snapshot current at its start; an interval change takes
/// effect for the pending wait.
pub struct Scheduler {
    provider: Arc<ConfigProvider>,
    store: Arc<dyn HistoryStore>,
    factory: Box<CycleFactory>,
}

impl Scheduler {
    pub fn new(provider: Arc<ConfigProvider>, store: Arc<dyn HistoryStore>) -> Self {
        Self {
            provider,
            store,
            factory: Box::new(PollCycle::from_config),
        }
    }

    /// Replace how cycles are built from a configuration snapshot.
    pub fn with_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&Config, Arc<dyn HistoryStore>) -> Result<PollCycle> + Send + Sync + 'static,
    {
        self.factory = Box::new(factory);
        self
    }

    /// Loop until `shutdown` resolves. Returns the number of cycles started.
    ///
    /// Shutdown is observed between cycles; a running cycle finishes first.
    pub async fn run<F>(&self, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut changes = self.provider.subscribe();
        let mut cycles = 0;

        loop {
            let started = Instant::now();
            let config = changes.borrow_and_update().clone();

            match (self.factory)(&config, Arc::clone(&self.store)) {
                Ok(cycle) => {
                    cycles += 1;
                    log::info!("Starting poll cycle #{}", cycles);
                    cycle.run().await;
                }
                Err(e) => log::error!("Could not set up poll cycle: {}", e),
            }

            let mut next = started + self.provider.current().poll_interval();
            log::debug!(
                "Next poll in {}s",
                next.saturating_duration_since(Instant::now()).as_secs()
            );

            loop {
                tokio::select! {
                    _ = &mut shutdown => {
                        log::info!("Shutdown requested, scheduler stopping");
                        return cycles;
                    }
                    _ = sleep_until(next) => break,
                    Ok(()) = changes.changed() => {
                        let interval = changes.borrow_and_update().poll_interval();
                        next = started + interval;
                        log::info!("Poll interval is now {}s", interval.as_secs());
                    }
                }
            }
        }
    }
}
