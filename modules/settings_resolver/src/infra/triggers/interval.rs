//! Timer-driven trigger

use crate::config::TriggerConfig;
use crate::contract::{CfgError, TriggerState, ValueProviderTrigger};
use crate::domain::dispatcher::EventDispatcher;
use crate::domain::events::TriggerEvent;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Fires `update` every `interval` while armed.
///
/// The next deadline is set once the listeners of the previous firing have
/// finished, so slow listeners push later firings back instead of piling up.
pub struct IntervalTrigger {
    interval: Duration,
    events: Arc<EventDispatcher<TriggerEvent>>,
    running: Mutex<Option<Running>>,
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl IntervalTrigger {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            events: Arc::new(EventDispatcher::new()),
            running: Mutex::new(None),
        }
    }

    pub fn from_config(config: &TriggerConfig) -> Self {
        Self::new(config.interval_duration())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

async fn run(
    interval: Duration,
    mut deadline: Instant,
    events: Arc<EventDispatcher<TriggerEvent>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = sleep_until(deadline) => {}
        }

        if let Err(e) = events.emit(TriggerEvent::Update).await {
            tracing::warn!(error = %e, "Trigger update listener failed");
        }
        deadline = Instant::now() + interval;
    }
}

#[async_trait]
impl ValueProviderTrigger for IntervalTrigger {
    fn events(&self) -> &EventDispatcher<TriggerEvent> {
        &self.events
    }

    async fn start(&self) -> Result<(), CfgError> {
        let mut running = self.running.lock();
        if running.is_some() {
            tracing::warn!("Interval trigger already started");
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let deadline = Instant::now() + self.interval;
        let handle = tokio::spawn(run(self.interval, deadline, self.events.clone(), cancel.clone()));
        *running = Some(Running { cancel, handle });

        tracing::info!(interval_ms = self.interval.as_millis() as u64, "Interval trigger started");
        Ok(())
    }

    async fn stop(&self) -> Result<(), CfgError> {
        let Some(Running { cancel, handle }) = self.running.lock().take() else {
            return Ok(());
        };

        cancel.cancel();
        handle.await.map_err(|e| CfgError::Trigger {
            message: format!("interval task failed: {}", e),
        })?;

        tracing::info!("Interval trigger stopped");
        Ok(())
    }

    fn state(&self) -> TriggerState {
        if self.running.lock().is_some() {
            TriggerState::Armed
        } else {
            TriggerState::Idle
        }
    }
}

impl Drop for IntervalTrigger {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.cancel.cancel();
        }
    }
}
