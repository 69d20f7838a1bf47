use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Per-ticket check-in state. `CheckedIn` and `NoShow` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "check_in_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CheckInStatus {
    Pending,
    CheckedIn,
    NoShow,
}

impl CheckInStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, CheckInStatus::Pending)
    }

    pub fn can_transition_to(self, next: CheckInStatus) -> bool {
        self == CheckInStatus::Pending && next.is_terminal()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CheckInStatus::Pending => "pending",
            CheckInStatus::CheckedIn => "checked_in",
            CheckInStatus::NoShow => "no_show",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: Uuid,
    pub ticket_code: String,
    pub event_id: Uuid,
    pub check_in_status: CheckInStatus,
    pub check_in_time: Option<DateTime<Utc>>,
    pub is_paid: bool,
    pub is_free_ticket: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A ticket as issued by the purchase flow. Always starts `Pending`.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub ticket_code: String,
    pub event_id: Uuid,
    pub is_paid: bool,
    pub is_free_ticket: bool,
}

impl NewTicket {
    pub fn paid(ticket_code: impl Into<String>, event_id: Uuid) -> Self {
        Self {
            ticket_code: ticket_code.into(),
            event_id,
            is_paid: true,
            is_free_ticket: false,
        }
    }

    pub fn free(ticket_code: impl Into<String>, event_id: Uuid) -> Self {
        Self {
            ticket_code: ticket_code.into(),
            event_id,
            is_paid: false,
            is_free_ticket: true,
        }
    }
}
