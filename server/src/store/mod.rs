//! Persistence seam for events and tickets.
//!
//! Every mutation exposed here is a write gated on the record's current state. Callers
//! never read-modify-write; they state the precondition and let the backend decide
//! whether it still holds when the write lands.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{CheckInStatus, Event, NewEvent, NewTicket, Ticket};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Ticket code already issued: {0}")]
    DuplicateTicketCode(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether retrying the same call later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Unavailable(_) => true,
            StoreError::DuplicateTicketCode(_) => false,
            StoreError::Database(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of an optimistic write that only applies when the stored state matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conditional<T> {
    /// Precondition held; carries the record as written.
    Applied(T),
    /// Precondition failed; carries the record as currently stored.
    Rejected(T),
    /// No record with that key.
    Missing,
}

impl<T> Conditional<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Conditional::Applied(_))
    }
}

/// Point-in-time ticket breakdown for one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TicketCounts {
    pub total: u64,
    pub checked_in: u64,
    pub no_show: u64,
}

impl TicketCounts {
    pub fn pending(&self) -> u64 {
        self.total
            .saturating_sub(self.checked_in)
            .saturating_sub(self.no_show)
    }
}

#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn insert_ticket(&self, ticket: NewTicket) -> StoreResult<Ticket>;

    async fn find_ticket(&self, ticket_code: &str) -> StoreResult<Option<Ticket>>;

    /// Moves one ticket from `expected` to `next`, stamping `check_in_time` when `next`
    /// is `CheckedIn`. A pair the state machine does not allow is `Rejected` without
    /// touching the record.
    async fn transition_ticket(
        &self,
        ticket_code: &str,
        expected: CheckInStatus,
        next: CheckInStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Conditional<Ticket>>;

    /// Marks every still-pending ticket of the given events as no-show. Returns the
    /// number of tickets changed.
    async fn mark_pending_as_no_show(
        &self,
        event_ids: &[Uuid],
        at: DateTime<Utc>,
    ) -> StoreResult<u64>;

    async fn count_tickets(&self, event_id: Uuid) -> StoreResult<TicketCounts>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn insert_event(&self, event: NewEvent) -> StoreResult<Event>;

    async fn find_event(&self, event_id: Uuid) -> StoreResult<Option<Event>>;

    /// Active events whose scheduled end is strictly before `now`, oldest first.
    async fn list_due_for_close(&self, now: DateTime<Utc>) -> StoreResult<Vec<Event>>;

    /// Completes the given events, skipping any that are no longer active. Returns the
    /// number of events changed.
    async fn complete_events(&self, event_ids: &[Uuid], at: DateTime<Utc>) -> StoreResult<u64>;
}
