//! Background registration that fires the reconciliation sweep.
//!
//! The scheduler owns one tokio task. [`ReconcileScheduler::start`] spawns it and hands
//! back a [`SchedulerHandle`]. [`SchedulerHandle::stop`] (or dropping the handle) ends
//! the task once any in-flight sweep has finished.

use std::sync::{Arc, RwLock};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::services::{ReconcileReport, ReconciliationJob};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// Fires once a day at a fixed UTC time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    at: NaiveTime,
}

impl DailySchedule {
    pub fn new(at: NaiveTime) -> Self {
        Self { at }
    }

    /// Parses `HH:MM`.
    pub fn parse(value: &str) -> Result<Self, chrono::ParseError> {
        NaiveTime::parse_from_str(value.trim(), "%H:%M").map(Self::new)
    }

    pub fn at(&self) -> NaiveTime {
        self.at
    }

    /// First firing strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = Utc.from_utc_datetime(&now.date_naive().and_time(self.at));
        if today > now {
            today
        } else {
            today + Duration::days(1)
        }
    }
}

impl DailySchedule {
    /// Next slot to fire at, never at or before `last_slot`. Guards against the wall
    /// clock stepping back after a firing.
    pub fn next_slot(
        &self,
        now: DateTime<Utc>,
        last_slot: Option<DateTime<Utc>>,
    ) -> DateTime<Utc> {
        let from = last_slot.map_or(now, |slot| slot.max(now));
        self.next_after(from)
    }
}

impl Default for DailySchedule {
    fn default() -> Self {
        Self::new(NaiveTime::MIN)
    }
}

/// What wakes the scheduler up.
#[derive(Debug)]
pub enum Trigger {
    Daily {
        schedule: DailySchedule,
        /// Slot of the last firing; later slots are counted from here, not from `now`.
        last_slot: Option<DateTime<Utc>>,
    },
    /// Fires whenever a [`ManualTrigger`] is pulled; ends when every sender is gone.
    Manual(mpsc::Receiver<()>),
}

impl Trigger {
    pub fn daily(schedule: DailySchedule) -> Self {
        Trigger::Daily {
            schedule,
            last_slot: None,
        }
    }

    pub fn manual() -> (Self, ManualTrigger) {
        let (tx, rx) = mpsc::channel(8);
        (Trigger::Manual(rx), ManualTrigger { tx })
    }

    /// Waits for the next firing. `false` means the trigger is exhausted.
    async fn wait(&mut self, clock: &dyn Clock) -> bool {
        match self {
            Trigger::Daily {
                schedule,
                last_slot,
            } => {
                let now = clock.now();
                let next = schedule.next_slot(now, *last_slot);
                let delay = (next - now).to_std().unwrap_or(StdDuration::ZERO);
                info!(next_run = %next, "Next reconciliation sweep scheduled");
                tokio::time::sleep(delay).await;
                *last_slot = Some(next);
                true
            }
            Trigger::Manual(rx) => rx.recv().await.is_some(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ManualTrigger {
    tx: mpsc::Sender<()>,
}

impl ManualTrigger {
    /// Requests one sweep. Returns `false` if the scheduler has already stopped.
    pub async fn fire(&self) -> bool {
        self.tx.send(()).await.is_ok()
    }
}

pub struct ReconcileScheduler;

impl ReconcileScheduler {
    pub fn start(
        job: ReconciliationJob,
        clock: Arc<dyn Clock>,
        mut trigger: Trigger,
    ) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let (report_tx, report_rx) = watch::channel(None);

        let task = tokio::spawn(async move {
            info!("Reconciliation scheduler started");
            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => break,
                    fired = trigger.wait(&*clock) => {
                        if !fired {
                            break;
                        }
                        // Runs to completion even if a stop request arrives meanwhile.
                        match job.run(clock.now()).await {
                            Ok(report) => {
                                report_tx.send_replace(Some(report));
                            }
                            Err(e) => {
                                error!(error = %e, "Reconciliation sweep aborted; retrying at next tick");
                            }
                        }
                    }
                }
            }
            info!("Reconciliation scheduler stopped");
        });

        SchedulerHandle {
            shutdown: Some(shutdown_tx),
            task,
            reports: report_rx,
        }
    }
}

pub struct SchedulerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
    reports: watch::Receiver<Option<ReconcileReport>>,
}

impl SchedulerHandle {
    /// Report of the most recent successful sweep, if any.
    pub fn subscribe(&self) -> watch::Receiver<Option<ReconcileReport>> {
        self.reports.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.task.await {
            error!(error = %e, "Reconciliation scheduler task did not exit cleanly");
        }
    }
}
