//! Single-flight periodic timer driving the ingestion cycle.
//!
//! At most one tick runs at a time. A tick that would start while another is
//! still running (a slow write, or a manual trigger racing the timer) is
//! skipped; the next scheduled tick is the retry.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use utoipa::ToSchema;

use crate::datex::FeedSource;
use crate::influx::TimeSeriesStore;
use crate::sync::worker::{IngestionCycle, TickOutcome};

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TickRecord {
    pub finished_at: DateTime<Utc>,
    pub outcome: TickOutcome,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngestionStatus {
    pub running: bool,
    pub tick_in_progress: bool,
    pub interval_seconds: u64,
    pub last_tick: Option<TickRecord>,
}

pub struct IngestionScheduler<F, S> {
    cycle: Arc<IngestionCycle<F, S>>,
    period: Duration,
    in_progress: AtomicBool,
    last_tick: Mutex<Option<TickRecord>>,
    stop_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

/// Clears the in-progress flag even if the tick future is dropped.
struct InProgressGuard<'a>(&'a AtomicBool);

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<F, S> IngestionScheduler<F, S>
where
    F: FeedSource + 'static,
    S: TimeSeriesStore + 'static,
{
    #[must_use]
    pub fn new(cycle: IngestionCycle<F, S>, period: Duration) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            cycle: Arc::new(cycle),
            period: period.max(Duration::from_secs(1)),
            in_progress: AtomicBool::new(false),
            last_tick: Mutex::new(None),
            stop_tx,
            handle: Mutex::new(None),
        }
    }

    /// Run one tick unless another is in flight.
    ///
    /// Returns `None` when the tick was skipped.
    pub async fn tick(&self) -> Option<TickOutcome> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("Previous ingestion tick still running, skipping this one");
            return None;
        }
        let _guard = InProgressGuard(&self.in_progress);

        let outcome = self.cycle.run_once().await;
        *self.last_tick.lock().unwrap_or_else(PoisonError::into_inner) = Some(TickRecord {
            finished_at: Utc::now(),
            outcome: outcome.clone(),
        });
        Some(outcome)
    }

    /// Start ticking every period, the first tick immediately.
    ///
    /// Does nothing if the timer is already running.
    pub fn start(self: &Arc<Self>) {
        let mut handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            tracing::debug!("Ingestion scheduler already running");
            return;
        }

        self.stop_tx.send_replace(false);
        let mut stop_rx = self.stop_tx.subscribe();
        let this = Arc::clone(self);

        tracing::info!(interval_secs = self.period.as_secs(), "Starting ingestion scheduler");

        *handle = Some(tokio::spawn(async move {
            let mut ticker = interval(this.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        this.tick().await;
                    }
                    _ = stop_rx.changed() => {
                        if *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("Ingestion scheduler stopped");
        }));
    }

    /// Stop the timer, letting an in-flight tick finish first.
    pub async fn stop(&self) {
        self.stop_tx.send_replace(true);
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            tracing::error!(error = %e, "Ingestion scheduler task ended abnormally");
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    #[must_use]
    pub fn tick_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn status(&self) -> IngestionStatus {
        IngestionStatus {
            running: self.is_running(),
            tick_in_progress: self.tick_in_progress(),
            interval_seconds: self.period.as_secs(),
            last_tick: self
                .last_tick
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }
}
