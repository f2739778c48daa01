// src/db/pg_store.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{
        BillingRepository, BillingStore, CompanyRepository, ContractRepository,
        GatewayLinkRepository, MonthStatusRepository, NotificationRepository,
    },
    models::{
        billing::{Billing, BillingStatus, ContractMonthStatus, NewBilling},
        company::{GatewaySettings, WhatsAppSettings},
        contract::BillableContract,
        gateway::{GatewayLink, NewGatewayLink},
        notification::{BillingNotification, NewNotification, NotificationKind},
    },
};

/// Implementação Postgres do `BillingStore`, montada a partir dos repositórios.
#[derive(Clone)]
pub struct PgBillingStore {
    pool: PgPool,
    contracts: ContractRepository,
    companies: CompanyRepository,
    billings: BillingRepository,
    months: MonthStatusRepository,
    notifications: NotificationRepository,
    links: GatewayLinkRepository,
}

impl PgBillingStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            contracts: ContractRepository::new(pool.clone()),
            companies: CompanyRepository::new(pool.clone()),
            billings: BillingRepository::new(pool.clone()),
            months: MonthStatusRepository::new(pool.clone()),
            notifications: NotificationRepository::new(pool.clone()),
            links: GatewayLinkRepository::new(pool.clone()),
            pool,
        }
    }
}

#[async_trait]
impl BillingStore for PgBillingStore {
    async fn list_billable_contracts(
        &self,
        company_id: Option<Uuid>,
    ) -> Result<Vec<BillableContract>, AppError> {
        self.contracts.list_active(company_id).await
    }

    async fn find_billable_contract(
        &self,
        company_id: Uuid,
        contract_id: Uuid,
    ) -> Result<Option<BillableContract>, AppError> {
        self.contracts.find_billable(company_id, contract_id).await
    }

    async fn touch_last_billed(&self, contract_id: Uuid, billed_on: NaiveDate) -> Result<(), AppError> {
        self.contracts.touch_last_billed(&self.pool, contract_id, billed_on).await
    }

    async fn whatsapp_settings(&self, company_id: Uuid) -> Result<Option<WhatsAppSettings>, AppError> {
        self.companies.whatsapp_settings(company_id).await
    }

    async fn gateway_settings(&self, company_id: Uuid) -> Result<Option<GatewaySettings>, AppError> {
        self.companies.gateway_settings(company_id).await
    }

    async fn insert_billing_if_absent(&self, new: &NewBilling) -> Result<Option<Billing>, AppError> {
        self.billings.insert_if_absent(&self.pool, new).await
    }

    async fn find_billing(
        &self,
        contract_id: Uuid,
        billing_date: NaiveDate,
    ) -> Result<Option<Billing>, AppError> {
        self.billings.find_by_contract_date(&self.pool, contract_id, billing_date).await
    }

    async fn find_billing_by_id(
        &self,
        company_id: Uuid,
        billing_id: Uuid,
    ) -> Result<Option<Billing>, AppError> {
        self.billings.find_by_id(&self.pool, company_id, billing_id).await
    }

    async fn mark_billing_paid(
        &self,
        billing_id: Uuid,
        txid: Option<&str>,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<Billing>, AppError> {
        self.billings.mark_paid(&self.pool, billing_id, txid, paid_at).await
    }

    async fn set_billing_status(
        &self,
        billing_id: Uuid,
        status: BillingStatus,
    ) -> Result<Option<Billing>, AppError> {
        self.billings.set_status(&self.pool, billing_id, status).await
    }

    async fn list_billings(
        &self,
        company_id: Uuid,
        year: i32,
        month: u32,
    ) -> Result<Vec<Billing>, AppError> {
        self.billings.list_for_month(company_id, year, month).await
    }

    async fn month_status(
        &self,
        contract_id: Uuid,
        year: i32,
        month: u32,
    ) -> Result<Option<ContractMonthStatus>, AppError> {
        self.months.find(contract_id, year, month).await
    }

    async fn set_month_paid(
        &self,
        contract_id: Uuid,
        company_id: Uuid,
        year: i32,
        month: u32,
    ) -> Result<ContractMonthStatus, AppError> {
        self.months
            .upsert(&self.pool, contract_id, company_id, year, month, BillingStatus::Paid)
            .await
    }

    async fn ensure_month_pending(
        &self,
        contract_id: Uuid,
        company_id: Uuid,
        year: i32,
        month: u32,
    ) -> Result<ContractMonthStatus, AppError> {
        self.months
            .insert_pending_if_absent(&self.pool, contract_id, company_id, year, month)
            .await
    }

    async fn set_month_status(
        &self,
        contract_id: Uuid,
        company_id: Uuid,
        year: i32,
        month: u32,
        status: BillingStatus,
    ) -> Result<ContractMonthStatus, AppError> {
        // 1. Inicia a transação: mês e cobranças mudam juntos ou nada muda
        let mut tx = self.pool.begin().await?;

        // 2. Grava o status do mês
        let row = self.months
            .upsert(&mut *tx, contract_id, company_id, year, month, status)
            .await?;

        // 3. Mantém as cobranças do mês coerentes com o livro
        if status.is_terminal() {
            let updated = self.billings
                .set_status_for_month(&mut *tx, contract_id, year, month, status)
                .await?;
            tracing::debug!(%contract_id, year, month, updated, "Cobranças do mês atualizadas");
        }

        // 4. Commit
        tx.commit().await?;
        Ok(row)
    }

    async fn list_month_statuses(
        &self,
        contract_id: Uuid,
        year: i32,
    ) -> Result<Vec<ContractMonthStatus>, AppError> {
        self.months.list_for_year(contract_id, year).await
    }

    async fn has_sent_notification(
        &self,
        contract_id: Uuid,
        due_date: NaiveDate,
        kind: NotificationKind,
    ) -> Result<bool, AppError> {
        self.notifications.has_sent(contract_id, due_date, kind).await
    }

    async fn has_paid_notification(&self, billing_id: Uuid) -> Result<bool, AppError> {
        self.notifications.has_paid_for_billing(billing_id).await
    }

    async fn insert_notification(
        &self,
        new: &NewNotification,
    ) -> Result<Option<BillingNotification>, AppError> {
        self.notifications.insert(&self.pool, new).await
    }

    async fn list_notifications(
        &self,
        company_id: Uuid,
        contract_id: Uuid,
    ) -> Result<Vec<BillingNotification>, AppError> {
        self.notifications.list_for_contract(company_id, contract_id).await
    }

    async fn find_gateway_link(
        &self,
        company_id: Uuid,
        contract_id: Uuid,
        due_date: NaiveDate,
    ) -> Result<Option<GatewayLink>, AppError> {
        self.links.find(company_id, contract_id, due_date).await
    }

    async fn save_gateway_link(&self, link: &NewGatewayLink) -> Result<GatewayLink, AppError> {
        if let Some(saved) = self.links.upsert(&self.pool, link).await? {
            return Ok(saved);
        }

        // Link já estava pago: devolve o que está gravado
        self.links
            .find(link.company_id, link.contract_id, link.due_date)
            .await?
            .ok_or_else(|| AppError::GatewayError("link de pagamento sumiu durante o upsert".into()))
    }

    async fn attach_billing_to_link(
        &self,
        company_id: Uuid,
        contract_id: Uuid,
        due_date: NaiveDate,
        billing_id: Uuid,
    ) -> Result<(), AppError> {
        self.links
            .attach_billing(&self.pool, company_id, contract_id, due_date, billing_id)
            .await
    }

    async fn list_pending_gateway_links(&self, limit: i64) -> Result<Vec<GatewayLink>, AppError> {
        self.links.list_pending(limit).await
    }

    async fn mark_gateway_link_processing(&self, link_id: Uuid) -> Result<(), AppError> {
        self.links.mark_processing(&self.pool, link_id).await
    }

    async fn mark_gateway_link_paid(
        &self,
        link_id: Uuid,
        paid_at: DateTime<Utc>,
        detail: &Value,
    ) -> Result<(), AppError> {
        self.links.mark_paid(&self.pool, link_id, paid_at, detail).await
    }
}
