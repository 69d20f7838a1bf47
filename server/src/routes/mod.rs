use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{apply_security_headers, create_cors_layer, Config};
use crate::handlers::{
    check_in_ticket, event_statistics, get_ticket, health_check, run_reconciliation,
};
use crate::services::{CheckInService, ReconciliationJob, StatisticsAggregator};
use crate::store::{EventStore, TicketStore};

#[derive(Clone)]
pub struct AppState {
    pub checkin: CheckInService,
    pub stats: StatisticsAggregator,
    pub reconciliation: ReconciliationJob,
}

impl AppState {
    pub fn new<S>(store: Arc<S>, batch_size: usize) -> Self
    where
        S: EventStore + TicketStore + 'static,
    {
        Self {
            checkin: CheckInService::new(store.clone()),
            stats: StatisticsAggregator::new(store.clone(), store.clone()),
            reconciliation: ReconciliationJob::new(store.clone(), store)
                .with_batch_size(batch_size),
        }
    }
}

pub fn create_routes(state: AppState, config: &Config) -> Router {
    let router = Router::new()
        .route("/health", get(health_check))
        .route("/tickets/:code", get(get_ticket))
        .route("/tickets/:code/check-in", post(check_in_ticket))
        .route("/events/:id/statistics", get(event_statistics))
        .route("/admin/reconcile", post(run_reconciliation))
        .with_state(state);

    apply_security_headers(router, config.production)
        .layer(create_cors_layer(&config.cors_allowed_origins))
        .layer(TraceLayer::new_for_http())
}
