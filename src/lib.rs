// src/lib.rs

pub mod common;
pub mod config;
pub mod db;
pub mod docs;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use axum::{
    routing::{get, post, put},
    Router,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{config::AppState, docs::ApiDoc};

/// Router completo da API. A autenticação é feita pelos extractors de cada
/// handler (`CompanyContext`, `MasterUser`).
pub fn app(state: AppState) -> Router {
    let billing_routes = Router::new()
        .route("/run-daily", post(handlers::billing::run_daily))
        .route("/reconcile", post(handlers::billing::reconcile))
        .route("/notify", post(handlers::billing::notify))
        .route("/billings", get(handlers::billing::list_billings))
        .route("/billings/{id}/status", put(handlers::billing::set_billing_status))
        .route(
            "/contracts/{id}/notifications",
            get(handlers::billing::list_notifications),
        )
        .route("/contracts/{id}/months", get(handlers::billing::list_months))
        .route(
            "/contracts/{id}/months/{year}/{month}",
            put(handlers::billing::set_month_status),
        );

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/billing", billing_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
}
