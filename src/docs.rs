// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Execuções ---
        handlers::billing::run_daily,
        handlers::billing::reconcile,

        // --- Notificações ---
        handlers::billing::notify,
        handlers::billing::list_notifications,

        // --- Cobranças e livro mensal ---
        handlers::billing::list_billings,
        handlers::billing::set_billing_status,
        handlers::billing::list_months,
        handlers::billing::set_month_status,
    ),
    components(
        schemas(
            // --- Models ---
            models::billing::BillingStatus,
            models::billing::Billing,
            models::billing::ContractMonthStatus,
            models::billing::MonthView,
            models::notification::NotificationKind,
            models::notification::DeliveryStatus,
            models::notification::BillingNotification,
            models::gateway::GatewayLinkStatus,
            models::gateway::GatewayLink,

            // --- Resumos ---
            services::billing_pipeline::DailyRunSummary,
            services::billing_pipeline::StepSummary,
            services::reconcile_service::ReconcileSummary,
            services::notification_service::ManualNotifyStatus,
            services::notification_service::ManualNotifyOutcome,

            // --- Payloads ---
            handlers::billing::RunDailyPayload,
            handlers::billing::NotifyPayload,
            handlers::billing::StatusPayload,
            handlers::billing::ReconcileResponse,
        )
    ),
    tags(
        (name = "Billing", description = "Cobranças recorrentes, lembretes e reconciliação Pix")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
