use axum::Router;

use backend_application::AppState;

use crate::handlers::{checkin_handlers, ops_handlers, payment_handlers, ticket_handlers};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/v1/payments/initialize",
            axum::routing::post(payment_handlers::initialize_payment),
        )
        .route(
            "/v1/payments/webhook",
            axum::routing::post(payment_handlers::payment_webhook),
        )
        .route(
            "/v1/orders/:id",
            axum::routing::get(payment_handlers::get_order),
        )
        .route(
            "/v1/orders/:id/cancel",
            axum::routing::post(payment_handlers::cancel_order),
        )
        .route(
            "/v1/tickets/:id",
            axum::routing::get(ticket_handlers::get_ticket),
        )
        .route(
            "/v1/tickets/:id/transfer",
            axum::routing::post(ticket_handlers::transfer_ticket),
        )
        .route(
            "/v1/tickets/:id/assign",
            axum::routing::post(ticket_handlers::assign_ticket),
        )
        .route(
            "/v1/tickets/:id/qr",
            axum::routing::post(ticket_handlers::regenerate_qr),
        )
        .route(
            "/v1/tickets/:id/cancel",
            axum::routing::post(ticket_handlers::cancel_ticket),
        )
        .route(
            "/v1/checkin",
            axum::routing::post(checkin_handlers::check_in),
        )
        .route(
            "/v1/checkin/log",
            axum::routing::get(checkin_handlers::list_checkin_log),
        )
        .route(
            "/v1/ops/health/live",
            axum::routing::get(ops_handlers::health_live),
        )
        .route(
            "/v1/ops/health/ready",
            axum::routing::get(ops_handlers::health_ready),
        )
        .route(
            "/v1/ops/metrics/prometheus",
            axum::routing::get(ops_handlers::metrics_prometheus),
        )
        .with_state(state)
}
