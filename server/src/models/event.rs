use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle state of an event. Only `Active -> Completed` is ever applied by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Draft,
    Active,
    Completed,
}

impl EventStatus {
    pub fn can_transition_to(self, next: EventStatus) -> bool {
        matches!((self, next), (EventStatus::Active, EventStatus::Completed))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub scheduled_end: DateTime<Utc>,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// True once the event is over and still waiting to be closed out.
    pub fn is_due_for_close(&self, now: DateTime<Utc>) -> bool {
        self.status == EventStatus::Active && self.scheduled_end < now
    }
}

/// Input for seeding events. Event creation itself lives outside this service.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub name: String,
    pub scheduled_end: DateTime<Utc>,
    pub status: EventStatus,
}

impl NewEvent {
    pub fn active(name: impl Into<String>, scheduled_end: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            scheduled_end,
            status: EventStatus::Active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn event(status: EventStatus, scheduled_end: DateTime<Utc>) -> Event {
        let now = Utc::now();
        Event {
            id: Uuid::new_v4(),
            name: "Launch party".to_string(),
            scheduled_end,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_only_active_to_completed_is_allowed() {
        assert!(EventStatus::Active.can_transition_to(EventStatus::Completed));
        assert!(!EventStatus::Completed.can_transition_to(EventStatus::Active));
        assert!(!EventStatus::Draft.can_transition_to(EventStatus::Completed));
        assert!(!EventStatus::Active.can_transition_to(EventStatus::Draft));
    }

    #[test]
    fn test_due_for_close_requires_active_and_past_end() {
        let now = Utc::now();
        let yesterday = now - Duration::days(1);
        let tomorrow = now + Duration::days(1);

        assert!(event(EventStatus::Active, yesterday).is_due_for_close(now));
        assert!(!event(EventStatus::Active, tomorrow).is_due_for_close(now));
        assert!(!event(EventStatus::Active, now).is_due_for_close(now));
        assert!(!event(EventStatus::Completed, yesterday).is_due_for_close(now));
        assert!(!event(EventStatus::Draft, yesterday).is_due_for_close(now));
    }
}
