use axum::extract::{Path, State};
use axum::response::Response;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::routes::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "checkin-server",
    };

    success(payload, "Health check successful")
}

pub async fn check_in_ticket(
    State(state): State<AppState>,
    Path(ticket_code): Path<String>,
) -> Result<Response, AppError> {
    let ticket = state.checkin.check_in(&ticket_code, Utc::now()).await?;
    Ok(success(ticket, "Ticket checked in"))
}

pub async fn get_ticket(
    State(state): State<AppState>,
    Path(ticket_code): Path<String>,
) -> Result<Response, AppError> {
    let ticket = state.checkin.get_ticket(&ticket_code).await?;
    Ok(success(ticket, "Ticket found"))
}

pub async fn event_statistics(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Response, AppError> {
    let event_id = Uuid::parse_str(&event_id)
        .map_err(|_| AppError::ValidationError(format!("'{}' is not a valid event id", event_id)))?;

    let stats = state.stats.event_statistics(event_id).await?;
    let message = if stats.has_no_data() {
        "No tickets sold for this event"
    } else {
        "Event statistics"
    };
    Ok(success(stats, message))
}

pub async fn run_reconciliation(State(state): State<AppState>) -> Result<Response, AppError> {
    let report = state.reconciliation.run(Utc::now()).await?;
    Ok(success(report, "Reconciliation sweep finished"))
}
