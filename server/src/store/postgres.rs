use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{Conditional, EventStore, StoreError, StoreResult, TicketCounts, TicketStore};
use crate::models::{CheckInStatus, Event, EventStatus, NewEvent, NewTicket, Ticket};

const TICKET_COLUMNS: &str = "id, ticket_code, event_id, check_in_status, check_in_time, \
     is_paid, is_free_ticket, created_at, updated_at";

const EVENT_COLUMNS: &str = "id, name, scheduled_end, status, created_at, updated_at";

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TicketStore for PostgresStore {
    async fn insert_ticket(&self, ticket: NewTicket) -> StoreResult<Ticket> {
        let sql = format!(
            "INSERT INTO tickets (ticket_code, event_id, is_paid, is_free_ticket) \
             VALUES ($1, $2, $3, $4) RETURNING {TICKET_COLUMNS}"
        );
        sqlx::query_as::<_, Ticket>(&sql)
            .bind(&ticket.ticket_code)
            .bind(ticket.event_id)
            .bind(ticket.is_paid)
            .bind(ticket.is_free_ticket)
            .fetch_one(self.pool())
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db)
                    if db.code().as_deref() == Some(UNIQUE_VIOLATION) =>
                {
                    StoreError::DuplicateTicketCode(ticket.ticket_code.clone())
                }
                other => StoreError::Database(other),
            })
    }

    async fn find_ticket(&self, ticket_code: &str) -> StoreResult<Option<Ticket>> {
        let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE ticket_code = $1");
        let ticket = sqlx::query_as::<_, Ticket>(&sql)
            .bind(ticket_code)
            .fetch_optional(self.pool())
            .await?;
        Ok(ticket)
    }

    async fn transition_ticket(
        &self,
        ticket_code: &str,
        expected: CheckInStatus,
        next: CheckInStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Conditional<Ticket>> {
        let updated = if expected.can_transition_to(next) {
            let check_in_time = (next == CheckInStatus::CheckedIn).then_some(at);
            let sql = format!(
                "UPDATE tickets \
                 SET check_in_status = $3, \
                     check_in_time = COALESCE($4, check_in_time), \
                     updated_at = $5 \
                 WHERE ticket_code = $1 AND check_in_status = $2 \
                 RETURNING {TICKET_COLUMNS}"
            );
            sqlx::query_as::<_, Ticket>(&sql)
                .bind(ticket_code)
                .bind(expected)
                .bind(next)
                .bind(check_in_time)
                .bind(at)
                .fetch_optional(self.pool())
                .await?
        } else {
            warn!(
                ticket_code,
                from = expected.as_str(),
                to = next.as_str(),
                "Refusing ticket transition outside the check-in state machine"
            );
            None
        };

        if let Some(ticket) = updated {
            return Ok(Conditional::Applied(ticket));
        }

        // Zero rows: either the code is unknown or the precondition no longer holds.
        debug!(
            ticket_code,
            expected = expected.as_str(),
            "Conditional ticket update matched no row"
        );
        Ok(match self.find_ticket(ticket_code).await? {
            Some(current) => Conditional::Rejected(current),
            None => Conditional::Missing,
        })
    }

    async fn mark_pending_as_no_show(
        &self,
        event_ids: &[Uuid],
        at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET check_in_status = $2, updated_at = $3
            WHERE event_id = ANY($1) AND check_in_status = $4
            "#,
        )
        .bind(event_ids)
        .bind(CheckInStatus::NoShow)
        .bind(at)
        .bind(CheckInStatus::Pending)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected())
    }

    async fn count_tickets(&self, event_id: Uuid) -> StoreResult<TicketCounts> {
        let (total, checked_in, no_show): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE check_in_status = $2),
                COUNT(*) FILTER (WHERE check_in_status = $3)
            FROM tickets
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .bind(CheckInStatus::CheckedIn)
        .bind(CheckInStatus::NoShow)
        .fetch_one(self.pool())
        .await?;

        Ok(TicketCounts {
            total: total.max(0) as u64,
            checked_in: checked_in.max(0) as u64,
            no_show: no_show.max(0) as u64,
        })
    }
}

#[async_trait]
impl EventStore for PostgresStore {
    async fn insert_event(&self, event: NewEvent) -> StoreResult<Event> {
        let sql = format!(
            "INSERT INTO events (name, scheduled_end, status) \
             VALUES ($1, $2, $3) RETURNING {EVENT_COLUMNS}"
        );
        let event = sqlx::query_as::<_, Event>(&sql)
            .bind(event.name)
            .bind(event.scheduled_end)
            .bind(event.status)
            .fetch_one(self.pool())
            .await?;
        Ok(event)
    }

    async fn find_event(&self, event_id: Uuid) -> StoreResult<Option<Event>> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1");
        let event = sqlx::query_as::<_, Event>(&sql)
            .bind(event_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(event)
    }

    async fn list_due_for_close(&self, now: DateTime<Utc>) -> StoreResult<Vec<Event>> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE status = $1 AND scheduled_end < $2 \
             ORDER BY scheduled_end, id"
        );
        let events = sqlx::query_as::<_, Event>(&sql)
            .bind(EventStatus::Active)
            .bind(now)
            .fetch_all(self.pool())
            .await?;
        Ok(events)
    }

    async fn complete_events(&self, event_ids: &[Uuid], at: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE events
            SET status = $2, updated_at = $3
            WHERE id = ANY($1) AND status = $4
            "#,
        )
        .bind(event_ids)
        .bind(EventStatus::Completed)
        .bind(at)
        .bind(EventStatus::Active)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected())
    }
}
