//! Daily close-out of ended events.
//!
//! A sweep selects every active event whose scheduled end has passed, turns their
//! still-pending tickets into no-shows and then completes the events. Both writes are
//! conditioned on current state, so a sweep can be re-run at any time, including after
//! it died halfway.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::store::{EventStore, StoreError, TicketStore};

pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Failed to select ended events: {0}")]
    Select(#[source] StoreError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub events_selected: usize,
    pub tickets_marked_no_show: u64,
    pub events_completed: u64,
    /// Batches whose writes failed; their events stay active for the next sweep.
    pub failed_batches: usize,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.events_selected == 0
    }
}

#[derive(Clone)]
pub struct ReconciliationJob {
    events: Arc<dyn EventStore>,
    tickets: Arc<dyn TicketStore>,
    batch_size: usize,
}

impl ReconciliationJob {
    pub fn new(events: Arc<dyn EventStore>, tickets: Arc<dyn TicketStore>) -> Self {
        Self {
            events,
            tickets,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Runs one sweep against the state of the world at `now`.
    ///
    /// Failing to select candidates aborts the sweep. A failed write only loses its own
    /// batch: the remaining batches still run, and the failed batch's events are left
    /// active so the next sweep picks them up again.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<ReconcileReport, ReconcileError> {
        let due = self
            .events
            .list_due_for_close(now)
            .await
            .map_err(ReconcileError::Select)?;

        let mut report = ReconcileReport {
            events_selected: due.len(),
            ..ReconcileReport::default()
        };

        if due.is_empty() {
            info!("Reconciliation sweep found no ended events");
            return Ok(report);
        }

        let ids: Vec<Uuid> = due.iter().map(|e| e.id).collect();
        for (index, batch) in ids.chunks(self.batch_size).enumerate() {
            if let Err(e) = self.close_batch(batch, now, &mut report).await {
                error!(
                    batch = index,
                    events = batch.len(),
                    error = %e,
                    "Reconciliation batch failed"
                );
                report.failed_batches += 1;
            }
        }

        if report.events_completed < report.events_selected as u64 && report.failed_batches == 0 {
            // Another sweep completed some of these between our select and our update.
            warn!(
                selected = report.events_selected,
                completed = report.events_completed,
                "Some ended events were already completed by a concurrent sweep"
            );
        }

        info!(
            events_selected = report.events_selected,
            events_completed = report.events_completed,
            tickets_marked_no_show = report.tickets_marked_no_show,
            failed_batches = report.failed_batches,
            "Reconciliation sweep finished"
        );

        Ok(report)
    }

    /// Counts land in `report` as each write commits, so a batch that fails on the
    /// event update still accounts for the tickets it already swept.
    async fn close_batch(
        &self,
        event_ids: &[Uuid],
        now: DateTime<Utc>,
        report: &mut ReconcileReport,
    ) -> Result<(), StoreError> {
        // Tickets first: completing an event whose tickets were not swept would hide
        // them from every later sweep.
        let tickets = self.tickets.mark_pending_as_no_show(event_ids, now).await?;
        report.tickets_marked_no_show += tickets;

        let events = self.events.complete_events(event_ids, now).await?;
        report.events_completed += events;
        Ok(())
    }
}
