use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{CheckInStatus, Ticket};
use crate::store::{Conditional, StoreError, TicketStore};

#[derive(Debug, Error)]
pub enum CheckInError {
    #[error("No ticket with code '{0}'")]
    NotFound(String),

    #[error("Ticket '{0}' is already checked in")]
    AlreadyCheckedIn(String),

    #[error("Ticket '{0}' was marked as a no-show; the event is closed")]
    EventClosed(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CheckInError {
    /// Only infrastructure failures are worth retrying; state conflicts are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            CheckInError::Store(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Moves a single ticket from pending to checked in.
///
/// Safe to call from many request handlers at once and alongside a running
/// reconciliation sweep: the store write only lands while the ticket is still pending,
/// so exactly one of the competing writers wins.
#[derive(Clone)]
pub struct CheckInService {
    tickets: Arc<dyn TicketStore>,
}

impl CheckInService {
    pub fn new(tickets: Arc<dyn TicketStore>) -> Self {
        Self { tickets }
    }

    pub async fn check_in(
        &self,
        ticket_code: &str,
        now: DateTime<Utc>,
    ) -> Result<Ticket, CheckInError> {
        let outcome = self
            .tickets
            .transition_ticket(
                ticket_code,
                CheckInStatus::Pending,
                CheckInStatus::CheckedIn,
                now,
            )
            .await?;

        match outcome {
            Conditional::Applied(ticket) => {
                info!(ticket_code, event_id = %ticket.event_id, "Ticket checked in");
                Ok(ticket)
            }
            Conditional::Rejected(current) => {
                warn!(
                    ticket_code,
                    status = current.check_in_status.as_str(),
                    "Check-in rejected"
                );
                Err(match current.check_in_status {
                    CheckInStatus::NoShow => CheckInError::EventClosed(ticket_code.to_string()),
                    // A pending ticket only shows up here if the backend lost the race
                    // to itself; report it as taken rather than pretend success.
                    CheckInStatus::CheckedIn | CheckInStatus::Pending => {
                        CheckInError::AlreadyCheckedIn(ticket_code.to_string())
                    }
                })
            }
            Conditional::Missing => {
                warn!(ticket_code, "Check-in for unknown ticket code");
                Err(CheckInError::NotFound(ticket_code.to_string()))
            }
        }
    }

    pub async fn get_ticket(&self, ticket_code: &str) -> Result<Ticket, CheckInError> {
        self.tickets
            .find_ticket(ticket_code)
            .await?
            .ok_or_else(|| CheckInError::NotFound(ticket_code.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTicket;
    use crate::store::MemoryStore;
    use chrono::Duration;
    use uuid::Uuid;

    async fn service_with_ticket(code: &str) -> (CheckInService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_ticket(NewTicket::paid(code, Uuid::new_v4()))
            .await
            .unwrap();
        (CheckInService::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_check_in_sets_status_and_time() {
        let (service, _) = service_with_ticket("T-100").await;
        let now = Utc::now();

        let ticket = service.check_in("T-100", now).await.unwrap();
        assert_eq!(ticket.check_in_status, CheckInStatus::CheckedIn);
        assert_eq!(ticket.check_in_time, Some(now));
    }

    #[tokio::test]
    async fn test_second_scan_is_already_checked_in_and_keeps_time() {
        let (service, store) = service_with_ticket("T-101").await;
        let first = Utc::now();
        service.check_in("T-101", first).await.unwrap();

        let err = service
            .check_in("T-101", first + Duration::minutes(3))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckInError::AlreadyCheckedIn(_)));
        assert!(!err.is_retryable());

        let stored = store.find_ticket("T-101").await.unwrap().unwrap();
        assert_eq!(stored.check_in_time, Some(first));
    }

    #[tokio::test]
    async fn test_no_show_ticket_is_event_closed() {
        let (service, store) = service_with_ticket("T-102").await;
        let ticket = store.find_ticket("T-102").await.unwrap().unwrap();
        store
            .mark_pending_as_no_show(&[ticket.event_id], Utc::now())
            .await
            .unwrap();

        let err = service.check_in("T-102", Utc::now()).await.unwrap_err();
        assert!(matches!(err, CheckInError::EventClosed(_)));

        let stored = store.find_ticket("T-102").await.unwrap().unwrap();
        assert_eq!(stored.check_in_status, CheckInStatus::NoShow);
        assert_eq!(stored.check_in_time, None);
    }

    #[tokio::test]
    async fn test_unknown_code_is_not_found() {
        let (service, _) = service_with_ticket("T-103").await;
        let err = service.check_in("T-999", Utc::now()).await.unwrap_err();
        assert!(matches!(err, CheckInError::NotFound(code) if code == "T-999"));
    }
}
