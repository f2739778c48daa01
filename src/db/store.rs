// src/db/store.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        billing::{Billing, BillingStatus, ContractMonthStatus, NewBilling},
        company::{GatewaySettings, WhatsAppSettings},
        contract::BillableContract,
        gateway::{GatewayLink, NewGatewayLink},
        notification::{BillingNotification, NewNotification, NotificationKind},
    },
};

/// Persistência consumida pelo motor de cobrança.
///
/// Toda operação recebe o escopo explícito (empresa/contrato); nada depende de
/// estado implícito de conexão. As garantias de idempotência moram aqui:
/// `insert_billing_if_absent` ignora duplicatas pela chave (contrato, data) e
/// `insert_notification` devolve `None` quando a chave de envio único já existe.
#[async_trait]
pub trait BillingStore: Send + Sync {
    // --- Contratos e empresas ---

    /// Contratos ativos (com cliente e cronograma), opcionalmente de uma empresa só.
    async fn list_billable_contracts(
        &self,
        company_id: Option<Uuid>,
    ) -> Result<Vec<BillableContract>, AppError>;

    async fn find_billable_contract(
        &self,
        company_id: Uuid,
        contract_id: Uuid,
    ) -> Result<Option<BillableContract>, AppError>;

    async fn touch_last_billed(&self, contract_id: Uuid, billed_on: NaiveDate) -> Result<(), AppError>;

    async fn whatsapp_settings(&self, company_id: Uuid) -> Result<Option<WhatsAppSettings>, AppError>;

    async fn gateway_settings(&self, company_id: Uuid) -> Result<Option<GatewaySettings>, AppError>;

    // --- Cobranças ---

    /// Insere se não existir; `None` quando (contrato, data) já tinha cobrança.
    async fn insert_billing_if_absent(&self, new: &NewBilling) -> Result<Option<Billing>, AppError>;

    async fn find_billing(
        &self,
        contract_id: Uuid,
        billing_date: NaiveDate,
    ) -> Result<Option<Billing>, AppError>;

    async fn find_billing_by_id(
        &self,
        company_id: Uuid,
        billing_id: Uuid,
    ) -> Result<Option<Billing>, AppError>;

    /// Marca como paga preservando o primeiro `gateway_paid_at`/`gateway_txid`.
    async fn mark_billing_paid(
        &self,
        billing_id: Uuid,
        txid: Option<&str>,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<Billing>, AppError>;

    async fn set_billing_status(
        &self,
        billing_id: Uuid,
        status: BillingStatus,
    ) -> Result<Option<Billing>, AppError>;

    async fn list_billings(
        &self,
        company_id: Uuid,
        year: i32,
        month: u32,
    ) -> Result<Vec<Billing>, AppError>;

    // --- Livro mensal ---

    async fn month_status(
        &self,
        contract_id: Uuid,
        year: i32,
        month: u32,
    ) -> Result<Option<ContractMonthStatus>, AppError>;

    /// Upsert para `paid` (sempre vence).
    async fn set_month_paid(
        &self,
        contract_id: Uuid,
        company_id: Uuid,
        year: i32,
        month: u32,
    ) -> Result<ContractMonthStatus, AppError>;

    /// Cria como `pending` se não existir; nunca sobrescreve.
    async fn ensure_month_pending(
        &self,
        contract_id: Uuid,
        company_id: Uuid,
        year: i32,
        month: u32,
    ) -> Result<ContractMonthStatus, AppError>;

    /// Sobrescrita manual. Para `paid`/`canceled` também atualiza, na mesma
    /// transação, todas as cobranças do contrato naquele mês.
    async fn set_month_status(
        &self,
        contract_id: Uuid,
        company_id: Uuid,
        year: i32,
        month: u32,
        status: BillingStatus,
    ) -> Result<ContractMonthStatus, AppError>;

    async fn list_month_statuses(
        &self,
        contract_id: Uuid,
        year: i32,
    ) -> Result<Vec<ContractMonthStatus>, AppError>;

    // --- Log de notificações ---

    /// Existe envio automático com sucesso para a chave? Falhas e envios
    /// forçados não contam.
    async fn has_sent_notification(
        &self,
        contract_id: Uuid,
        due_date: NaiveDate,
        kind: NotificationKind,
    ) -> Result<bool, AppError>;

    async fn has_paid_notification(&self, billing_id: Uuid) -> Result<bool, AppError>;

    /// `None` quando a linha violaria a unicidade de envio (outra execução venceu).
    async fn insert_notification(
        &self,
        new: &NewNotification,
    ) -> Result<Option<BillingNotification>, AppError>;

    async fn list_notifications(
        &self,
        company_id: Uuid,
        contract_id: Uuid,
    ) -> Result<Vec<BillingNotification>, AppError>;

    // --- Links do gateway ---

    async fn find_gateway_link(
        &self,
        company_id: Uuid,
        contract_id: Uuid,
        due_date: NaiveDate,
    ) -> Result<Option<GatewayLink>, AppError>;

    /// Upsert por (empresa, contrato, vencimento); nunca reescreve link já pago.
    async fn save_gateway_link(&self, link: &NewGatewayLink) -> Result<GatewayLink, AppError>;

    async fn attach_billing_to_link(
        &self,
        company_id: Uuid,
        contract_id: Uuid,
        due_date: NaiveDate,
        billing_id: Uuid,
    ) -> Result<(), AppError>;

    /// Links aguardando pagamento, os atualizados há mais tempo primeiro.
    async fn list_pending_gateway_links(&self, limit: i64) -> Result<Vec<GatewayLink>, AppError>;

    async fn mark_gateway_link_processing(&self, link_id: Uuid) -> Result<(), AppError>;

    async fn mark_gateway_link_paid(
        &self,
        link_id: Uuid,
        paid_at: DateTime<Utc>,
        detail: &Value,
    ) -> Result<(), AppError>;
}
