//! In-process backend. Each map sits behind one lock, so a conditional write observes
//! and updates a record in a single critical section.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Conditional, EventStore, StoreError, StoreResult, TicketCounts, TicketStore};
use crate::models::{CheckInStatus, Event, EventStatus, NewEvent, NewTicket, Ticket};

#[derive(Debug, Default)]
pub struct MemoryStore {
    events: RwLock<HashMap<Uuid, Event>>,
    tickets: RwLock<HashMap<String, Ticket>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All tickets of one event, in no particular order.
    pub async fn tickets_for_event(&self, event_id: Uuid) -> Vec<Ticket> {
        self.tickets
            .read()
            .await
            .values()
            .filter(|t| t.event_id == event_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn insert_ticket(&self, ticket: NewTicket) -> StoreResult<Ticket> {
        let mut tickets = self.tickets.write().await;
        if tickets.contains_key(&ticket.ticket_code) {
            return Err(StoreError::DuplicateTicketCode(ticket.ticket_code));
        }

        let now = Utc::now();
        let record = Ticket {
            id: Uuid::new_v4(),
            ticket_code: ticket.ticket_code.clone(),
            event_id: ticket.event_id,
            check_in_status: CheckInStatus::Pending,
            check_in_time: None,
            is_paid: ticket.is_paid,
            is_free_ticket: ticket.is_free_ticket,
            created_at: now,
            updated_at: now,
        };
        tickets.insert(ticket.ticket_code, record.clone());
        Ok(record)
    }

    async fn find_ticket(&self, ticket_code: &str) -> StoreResult<Option<Ticket>> {
        Ok(self.tickets.read().await.get(ticket_code).cloned())
    }

    async fn transition_ticket(
        &self,
        ticket_code: &str,
        expected: CheckInStatus,
        next: CheckInStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Conditional<Ticket>> {
        let mut tickets = self.tickets.write().await;
        let Some(ticket) = tickets.get_mut(ticket_code) else {
            return Ok(Conditional::Missing);
        };

        if ticket.check_in_status != expected || !expected.can_transition_to(next) {
            return Ok(Conditional::Rejected(ticket.clone()));
        }

        ticket.check_in_status = next;
        if next == CheckInStatus::CheckedIn {
            ticket.check_in_time = Some(at);
        }
        ticket.updated_at = at;
        Ok(Conditional::Applied(ticket.clone()))
    }

    async fn mark_pending_as_no_show(
        &self,
        event_ids: &[Uuid],
        at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut tickets = self.tickets.write().await;
        let mut changed = 0;
        for ticket in tickets.values_mut() {
            if ticket.check_in_status == CheckInStatus::Pending
                && event_ids.contains(&ticket.event_id)
            {
                ticket.check_in_status = CheckInStatus::NoShow;
                ticket.updated_at = at;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn count_tickets(&self, event_id: Uuid) -> StoreResult<TicketCounts> {
        let tickets = self.tickets.read().await;
        let counts = tickets
            .values()
            .filter(|t| t.event_id == event_id)
            .fold(TicketCounts::default(), |mut acc, t| {
                acc.total += 1;
                match t.check_in_status {
                    CheckInStatus::CheckedIn => acc.checked_in += 1,
                    CheckInStatus::NoShow => acc.no_show += 1,
                    CheckInStatus::Pending => {}
                }
                acc
            });
        Ok(counts)
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn insert_event(&self, event: NewEvent) -> StoreResult<Event> {
        let now = Utc::now();
        let record = Event {
            id: Uuid::new_v4(),
            name: event.name,
            scheduled_end: event.scheduled_end,
            status: event.status,
            created_at: now,
            updated_at: now,
        };
        self.events.write().await.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_event(&self, event_id: Uuid) -> StoreResult<Option<Event>> {
        Ok(self.events.read().await.get(&event_id).cloned())
    }

    async fn list_due_for_close(&self, now: DateTime<Utc>) -> StoreResult<Vec<Event>> {
        let mut due: Vec<Event> = self
            .events
            .read()
            .await
            .values()
            .filter(|e| e.is_due_for_close(now))
            .cloned()
            .collect();
        due.sort_by_key(|e| (e.scheduled_end, e.id));
        Ok(due)
    }

    async fn complete_events(&self, event_ids: &[Uuid], at: DateTime<Utc>) -> StoreResult<u64> {
        let mut events = self.events.write().await;
        let mut changed = 0;
        for id in event_ids {
            if let Some(event) = events.get_mut(id) {
                if event.status.can_transition_to(EventStatus::Completed) {
                    event.status = EventStatus::Completed;
                    event.updated_at = at;
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_duplicate_ticket_code_is_rejected() {
        let store = MemoryStore::new();
        let event_id = Uuid::new_v4();
        store
            .insert_ticket(NewTicket::paid("AG-001", event_id))
            .await
            .unwrap();

        let err = store
            .insert_ticket(NewTicket::free("AG-001", event_id))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateTicketCode(code) if code == "AG-001"));
    }

    #[tokio::test]
    async fn test_transition_reports_current_state_on_mismatch() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .insert_ticket(NewTicket::paid("AG-002", Uuid::new_v4()))
            .await
            .unwrap();

        let first = store
            .transition_ticket("AG-002", CheckInStatus::Pending, CheckInStatus::CheckedIn, now)
            .await
            .unwrap();
        assert!(first.is_applied());

        let later = now + Duration::minutes(5);
        let second = store
            .transition_ticket("AG-002", CheckInStatus::Pending, CheckInStatus::CheckedIn, later)
            .await
            .unwrap();
        match second {
            Conditional::Rejected(current) => {
                assert_eq!(current.check_in_status, CheckInStatus::CheckedIn);
                assert_eq!(current.check_in_time, Some(now));
            }
            other => panic!("expected rejection, got {:?}", other),
        }

        let missing = store
            .transition_ticket("NOPE", CheckInStatus::Pending, CheckInStatus::CheckedIn, now)
            .await
            .unwrap();
        assert_eq!(missing, Conditional::Missing);
    }

    #[tokio::test]
    async fn test_transition_never_leaves_a_terminal_state() {
        let store = MemoryStore::new();
        let scanned_at = Utc::now();
        store
            .insert_ticket(NewTicket::paid("AG-003", Uuid::new_v4()))
            .await
            .unwrap();
        store
            .transition_ticket("AG-003", CheckInStatus::Pending, CheckInStatus::CheckedIn, scanned_at)
            .await
            .unwrap();

        let later = scanned_at + Duration::hours(1);
        for (expected, next) in [
            (CheckInStatus::CheckedIn, CheckInStatus::Pending),
            (CheckInStatus::CheckedIn, CheckInStatus::NoShow),
            (CheckInStatus::CheckedIn, CheckInStatus::CheckedIn),
        ] {
            let outcome = store
                .transition_ticket("AG-003", expected, next, later)
                .await
                .unwrap();
            assert!(
                matches!(outcome, Conditional::Rejected(_)),
                "{:?} -> {:?} should be rejected",
                expected,
                next
            );
        }

        // Pending -> Pending is not a transition either.
        store
            .insert_ticket(NewTicket::free("AG-004", Uuid::new_v4()))
            .await
            .unwrap();
        let outcome = store
            .transition_ticket("AG-004", CheckInStatus::Pending, CheckInStatus::Pending, later)
            .await
            .unwrap();
        assert!(matches!(outcome, Conditional::Rejected(_)));

        let stored = store.find_ticket("AG-003").await.unwrap().unwrap();
        assert_eq!(stored.check_in_status, CheckInStatus::CheckedIn);
        assert_eq!(stored.check_in_time, Some(scanned_at));
        assert_eq!(stored.updated_at, scanned_at);
    }

    #[tokio::test]
    async fn test_due_for_close_skips_future_and_completed_events() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let ended = store
            .insert_event(NewEvent::active("Ended", now - Duration::hours(2)))
            .await
            .unwrap();
        store
            .insert_event(NewEvent::active("Upcoming", now + Duration::hours(2)))
            .await
            .unwrap();
        store
            .insert_event(NewEvent {
                name: "Draft".to_string(),
                scheduled_end: now - Duration::hours(2),
                status: EventStatus::Draft,
            })
            .await
            .unwrap();

        let due = store.list_due_for_close(now).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, ended.id);

        assert_eq!(store.complete_events(&[ended.id], now).await.unwrap(), 1);
        assert_eq!(store.complete_events(&[ended.id], now).await.unwrap(), 0);
        assert!(store.list_due_for_close(now).await.unwrap().is_empty());
    }
}
