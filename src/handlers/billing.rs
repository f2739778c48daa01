// src/handlers/billing.rs

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    common::{date_only, error::AppError},
    config::AppState,
    middleware::auth::{CompanyContext, MasterUser},
    models::{
        billing::{Billing, BillingStatus, ContractMonthStatus, MonthView},
        notification::{BillingNotification, NotificationKind},
    },
    services::{
        billing_pipeline::{DailyRunOptions, DailyRunSummary},
        notification_service::{ManualNotifyOutcome, ManualNotifyRequest},
        reconcile_service::ReconcileSummary,
    },
};

// ---
// Validação Customizada
// ---
fn validate_date_only(value: &str) -> Result<(), ValidationError> {
    if date_only::parse_date(value).is_err() {
        let mut err = ValidationError::new("date");
        err.message = Some("Use o formato AAAA-MM-DD.".into());
        return Err(err);
    }
    Ok(())
}

fn parse_optional_date(value: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    value.map(date_only::parse_date).transpose()
}

fn today(state: &AppState) -> NaiveDate {
    date_only::today_at(Utc::now(), state.config.timezone_offset_hours)
}

// =============================================================================
//  1. EXECUÇÕES (PIPELINE DIÁRIO E RECONCILIAÇÃO)
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunDailyPayload {
    /// Data de referência (padrão: hoje no fuso da operação).
    #[validate(custom(function = "validate_date_only"))]
    #[schema(example = "2024-09-22")]
    pub date: Option<String>,

    pub generate: Option<bool>,
    pub pre: Option<bool>,
    pub due: Option<bool>,
    pub late: Option<bool>,
}

// POST /api/billing/run-daily
#[utoipa::path(
    post,
    path = "/api/billing/run-daily",
    tag = "Billing",
    request_body = RunDailyPayload,
    responses(
        (status = 200, description = "Resumo da execução", body = DailyRunSummary),
        (status = 400, description = "Data inválida")
    ),
    params(
        ("x-company-id" = Option<Uuid>, Header, description = "Empresa (apenas usuários master)")
    ),
    security(("api_jwt" = []))
)]
pub async fn run_daily(
    State(app_state): State<AppState>,
    company: CompanyContext,
    Json(payload): Json<RunDailyPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let as_of = parse_optional_date(payload.date.as_deref())?.unwrap_or_else(|| today(&app_state));
    let options = DailyRunOptions {
        generate: payload.generate.unwrap_or(true),
        pre: payload.pre.unwrap_or(true),
        due: payload.due.unwrap_or(true),
        late: payload.late.unwrap_or(true),
        company_id: Some(company.company_id),
    };

    let summary = app_state.pipeline.run_daily(as_of, options).await?;
    Ok(Json(summary))
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReconcileQuery {
    /// Quantidade máxima de links consultados nesta passada.
    #[validate(range(min = 1, max = 500, message = "O limite deve estar entre 1 e 500."))]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResponse {
    /// `true` quando outra reconciliação já estava rodando.
    pub already_running: bool,
    pub summary: Option<ReconcileSummary>,
}

// POST /api/billing/reconcile
#[utoipa::path(
    post,
    path = "/api/billing/reconcile",
    tag = "Billing",
    params(ReconcileQuery),
    responses(
        (status = 200, description = "Resultado da reconciliação", body = ReconcileResponse),
        (status = 403, description = "Apenas usuários master")
    ),
    security(("api_jwt" = []))
)]
pub async fn reconcile(
    State(app_state): State<AppState>,
    _master: MasterUser,
    Query(query): Query<ReconcileQuery>,
) -> Result<impl IntoResponse, AppError> {
    query.validate()?;

    let limit = query.limit.unwrap_or(app_state.config.reconcile_batch_limit);
    let summary = app_state.reconcile_service.run(limit).await?;

    Ok(Json(ReconcileResponse {
        already_running: summary.is_none(),
        summary,
    }))
}

// =============================================================================
//  2. NOTIFICAÇÃO MANUAL
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotifyPayload {
    pub contract_id: Uuid,

    /// Obrigatória para contratos por intervalo de dias ou datas personalizadas.
    #[validate(custom(function = "validate_date_only"))]
    #[schema(example = "2024-10-10")]
    pub date: Option<String>,

    /// `pre`, `due`, `late` ou `manual` (padrão).
    #[serde(default = "default_notify_kind")]
    pub kind: NotificationKind,

    #[serde(default)]
    pub force: bool,
}

fn default_notify_kind() -> NotificationKind {
    NotificationKind::Manual
}

// POST /api/billing/notify
#[utoipa::path(
    post,
    path = "/api/billing/notify",
    tag = "Billing",
    request_body = NotifyPayload,
    responses(
        (status = 200, description = "Notificação enviada (ou ignorada por falta de telefone)", body = ManualNotifyOutcome),
        (status = 400, description = "Data não é vencimento do contrato"),
        (status = 404, description = "Contrato não encontrado"),
        (status = 409, description = "Mês/cobrança encerrados ou já notificado"),
        (status = 502, description = "Falha no envio")
    ),
    params(
        ("x-company-id" = Option<Uuid>, Header, description = "Empresa (apenas usuários master)")
    ),
    security(("api_jwt" = []))
)]
pub async fn notify(
    State(app_state): State<AppState>,
    company: CompanyContext,
    Json(payload): Json<NotifyPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let request = ManualNotifyRequest {
        contract_id: payload.contract_id,
        date: parse_optional_date(payload.date.as_deref())?,
        kind: payload.kind,
        force: payload.force,
    };

    let outcome = app_state
        .notification_service
        .notify(company.company_id, request, today(&app_state))
        .await?;

    Ok(Json(outcome))
}

// GET /api/billing/contracts/{id}/notifications
#[utoipa::path(
    get,
    path = "/api/billing/contracts/{id}/notifications",
    tag = "Billing",
    params(
        ("id" = Uuid, Path, description = "ID do contrato"),
        ("x-company-id" = Option<Uuid>, Header, description = "Empresa (apenas usuários master)")
    ),
    responses(
        (status = 200, description = "Histórico de envios do contrato", body = Vec<BillingNotification>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_notifications(
    State(app_state): State<AppState>,
    company: CompanyContext,
    Path(contract_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let rows = app_state
        .notification_service
        .list_for_contract(company.company_id, contract_id)
        .await?;
    Ok(Json(rows))
}

// =============================================================================
//  3. COBRANÇAS E LIVRO MENSAL
// =============================================================================

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MonthQuery {
    #[validate(range(min = 1900, max = 9999))]
    pub year: i32,
    #[validate(range(min = 1, max = 12, message = "O mês deve estar entre 1 e 12."))]
    pub month: u32,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct YearQuery {
    #[validate(range(min = 1900, max = 9999))]
    pub year: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusPayload {
    pub status: BillingStatus,
}

// GET /api/billing/billings?year=2024&month=9
#[utoipa::path(
    get,
    path = "/api/billing/billings",
    tag = "Billing",
    params(
        MonthQuery,
        ("x-company-id" = Option<Uuid>, Header, description = "Empresa (apenas usuários master)")
    ),
    responses(
        (status = 200, description = "Cobranças do mês", body = Vec<Billing>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_billings(
    State(app_state): State<AppState>,
    company: CompanyContext,
    Query(query): Query<MonthQuery>,
) -> Result<impl IntoResponse, AppError> {
    query.validate()?;

    let billings = app_state
        .month_status_service
        .list_billings(company.company_id, query.year, query.month)
        .await?;
    Ok(Json(billings))
}

// PUT /api/billing/billings/{id}/status
#[utoipa::path(
    put,
    path = "/api/billing/billings/{id}/status",
    tag = "Billing",
    request_body = StatusPayload,
    params(
        ("id" = Uuid, Path, description = "ID da cobrança"),
        ("x-company-id" = Option<Uuid>, Header, description = "Empresa (apenas usuários master)")
    ),
    responses(
        (status = 200, description = "Cobrança atualizada", body = Billing),
        (status = 404, description = "Cobrança não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn set_billing_status(
    State(app_state): State<AppState>,
    company: CompanyContext,
    Path(billing_id): Path<Uuid>,
    Json(payload): Json<StatusPayload>,
) -> Result<impl IntoResponse, AppError> {
    let billing = app_state
        .month_status_service
        .set_billing_status(company.company_id, billing_id, payload.status)
        .await?;
    Ok(Json(billing))
}

// GET /api/billing/contracts/{id}/months?year=2024
#[utoipa::path(
    get,
    path = "/api/billing/contracts/{id}/months",
    tag = "Billing",
    params(
        ("id" = Uuid, Path, description = "ID do contrato"),
        YearQuery,
        ("x-company-id" = Option<Uuid>, Header, description = "Empresa (apenas usuários master)")
    ),
    responses(
        (status = 200, description = "Status de cada mês do ano", body = Vec<MonthView>),
        (status = 404, description = "Contrato não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_months(
    State(app_state): State<AppState>,
    company: CompanyContext,
    Path(contract_id): Path<Uuid>,
    Query(query): Query<YearQuery>,
) -> Result<impl IntoResponse, AppError> {
    query.validate()?;

    let months = app_state
        .month_status_service
        .month_view(company.company_id, contract_id, query.year)
        .await?;
    Ok(Json(months))
}

// PUT /api/billing/contracts/{id}/months/{year}/{month}
#[utoipa::path(
    put,
    path = "/api/billing/contracts/{id}/months/{year}/{month}",
    tag = "Billing",
    request_body = StatusPayload,
    params(
        ("id" = Uuid, Path, description = "ID do contrato"),
        ("year" = i32, Path, description = "Ano"),
        ("month" = u32, Path, description = "Mês (1-12)"),
        ("x-company-id" = Option<Uuid>, Header, description = "Empresa (apenas usuários master)")
    ),
    responses(
        (status = 200, description = "Mês atualizado", body = ContractMonthStatus),
        (status = 400, description = "Mês inválido"),
        (status = 404, description = "Contrato não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn set_month_status(
    State(app_state): State<AppState>,
    company: CompanyContext,
    Path((contract_id, year, month)): Path<(Uuid, i32, u32)>,
    Json(payload): Json<StatusPayload>,
) -> Result<impl IntoResponse, AppError> {
    let row = app_state
        .month_status_service
        .set_status(company.company_id, contract_id, year, month, payload.status)
        .await?;
    Ok(Json(row))
}
