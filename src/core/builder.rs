use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    core::Config,
    error::ConfigError,
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
};

use super::orchestrator::Orchestrator;

/// Builder for constructing an [`Orchestrator`] with optional subscribers.
pub struct OrchestratorBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl OrchestratorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (module lifecycle, recovery, etc.)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds a single subscriber.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Validates the configuration and builds the orchestrator.
    ///
    /// Spawns the subscriber workers and the bus listener when subscribers
    /// were given, so it must be called inside a tokio runtime in that case.
    pub fn build(self) -> Result<Arc<Orchestrator>, ConfigError> {
        self.cfg.validate()?;

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let lifetime = CancellationToken::new();

        if !self.subscribers.is_empty() {
            let set = SubscriberSet::new(self.subscribers, bus.clone());
            subscriber_listener(&bus, set, lifetime.clone());
        }

        Ok(Arc::new(Orchestrator::new_internal(self.cfg, bus, lifetime)))
    }
}

/// Forwards bus events to the subscriber set until the orchestrator is dropped.
fn subscriber_listener(bus: &Bus, set: SubscriberSet, lifetime: CancellationToken) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = lifetime.cancelled() => break,
                msg = rx.recv() => match msg {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "subscriber listener lagged behind the bus");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        // Drain what was already queued for the workers.
        set.shutdown().await;
    });
}
