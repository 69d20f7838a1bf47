use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::store::{EventStore, StoreError, TicketStore};

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("No event with id '{0}'")]
    EventNotFound(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Live check-in breakdown for one event. This is what the exporter consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStatistics {
    pub event_id: Uuid,
    pub event_name: String,
    pub total_sold_tickets: u64,
    pub checked_in_tickets: u64,
    pub no_show_tickets: u64,
    pub pending_tickets: u64,
}

impl EventStatistics {
    /// Nothing sold yet. Callers render an empty state, not an error.
    pub fn has_no_data(&self) -> bool {
        self.total_sold_tickets == 0
    }
}

#[derive(Clone)]
pub struct StatisticsAggregator {
    events: Arc<dyn EventStore>,
    tickets: Arc<dyn TicketStore>,
}

impl StatisticsAggregator {
    pub fn new(events: Arc<dyn EventStore>, tickets: Arc<dyn TicketStore>) -> Self {
        Self { events, tickets }
    }

    /// Reads the current counts straight from the store; nothing is cached.
    pub async fn event_statistics(&self, event_id: Uuid) -> Result<EventStatistics, StatsError> {
        let event = self
            .events
            .find_event(event_id)
            .await?
            .ok_or(StatsError::EventNotFound(event_id))?;

        let counts = self.tickets.count_tickets(event_id).await?;

        Ok(EventStatistics {
            event_id,
            event_name: event.name,
            total_sold_tickets: counts.total,
            checked_in_tickets: counts.checked_in,
            no_show_tickets: counts.no_show,
            pending_tickets: counts.pending(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewEvent, NewTicket};
    use crate::store::MemoryStore;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_event_without_tickets_reports_zeroes() {
        let store = Arc::new(MemoryStore::new());
        let event = store
            .insert_event(NewEvent::active("Quiet night", Utc::now() + Duration::days(3)))
            .await
            .unwrap();

        let stats = StatisticsAggregator::new(store.clone(), store.clone())
            .event_statistics(event.id)
            .await
            .unwrap();

        assert_eq!(stats.event_name, "Quiet night");
        assert_eq!(stats.total_sold_tickets, 0);
        assert_eq!(stats.checked_in_tickets, 0);
        assert_eq!(stats.no_show_tickets, 0);
        assert!(stats.has_no_data());
    }

    #[tokio::test]
    async fn test_counts_follow_ticket_states() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let event = store
            .insert_event(NewEvent::active("Gallery opening", now + Duration::days(1)))
            .await
            .unwrap();
        for code in ["G-1", "G-2", "G-3"] {
            store.insert_ticket(NewTicket::paid(code, event.id)).await.unwrap();
        }
        store
            .transition_ticket(
                "G-1",
                crate::models::CheckInStatus::Pending,
                crate::models::CheckInStatus::CheckedIn,
                now,
            )
            .await
            .unwrap();

        let stats = StatisticsAggregator::new(store.clone(), store.clone())
            .event_statistics(event.id)
            .await
            .unwrap();

        assert_eq!(stats.total_sold_tickets, 3);
        assert_eq!(stats.checked_in_tickets, 1);
        assert_eq!(stats.no_show_tickets, 0);
        assert_eq!(stats.pending_tickets, 2);
    }

    #[tokio::test]
    async fn test_unknown_event_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let missing = Uuid::new_v4();
        let err = StatisticsAggregator::new(store.clone(), store)
            .event_statistics(missing)
            .await
            .unwrap_err();
        assert!(matches!(err, StatsError::EventNotFound(id) if id == missing));
    }

    #[test]
    fn test_statistics_serialize_in_camel_case() {
        let stats = EventStatistics {
            event_id: Uuid::nil(),
            event_name: "Expo".to_string(),
            total_sold_tickets: 4,
            checked_in_tickets: 1,
            no_show_tickets: 2,
            pending_tickets: 1,
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["totalSoldTickets"], 4);
        assert_eq!(json["checkedInTickets"], 1);
        assert_eq!(json["noShowTickets"], 2);
        assert_eq!(json["eventName"], "Expo");
    }
}
