// src/services/month_status_service.rs

use std::{collections::HashMap, sync::Arc};

use chrono::{Datelike, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    common::{date_only, error::AppError},
    db::BillingStore,
    models::billing::{Billing, BillingStatus, ContractMonthStatus, MonthView},
    services::reminder_service::ReminderService,
};

/// Livro mensal (status por contrato e mês) e mudanças manuais de status.
pub struct MonthStatusService {
    store: Arc<dyn BillingStore>,
    reminders: Arc<ReminderService>,
}

impl MonthStatusService {
    pub fn new(store: Arc<dyn BillingStore>, reminders: Arc<ReminderService>) -> Self {
        Self { store, reminders }
    }

    /// `paid` sempre vence, qualquer que seja o status anterior.
    pub async fn set_paid(
        &self,
        contract_id: Uuid,
        company_id: Uuid,
        billing_date: NaiveDate,
    ) -> Result<ContractMonthStatus, AppError> {
        self.store
            .set_month_paid(contract_id, company_id, billing_date.year(), billing_date.month())
            .await
    }

    /// Cria o mês como `pending` se ainda não existir; nunca reabre mês encerrado.
    pub async fn ensure_pending(
        &self,
        contract_id: Uuid,
        company_id: Uuid,
        billing_date: NaiveDate,
    ) -> Result<ContractMonthStatus, AppError> {
        self.store
            .ensure_month_pending(contract_id, company_id, billing_date.year(), billing_date.month())
            .await
    }

    /// Sobrescrita manual do mês. `paid`/`canceled` levam junto as cobranças
    /// do contrato naquele mês.
    pub async fn set_status(
        &self,
        company_id: Uuid,
        contract_id: Uuid,
        year: i32,
        month: u32,
        status: BillingStatus,
    ) -> Result<ContractMonthStatus, AppError> {
        validate_month(year, month)?;

        self.store
            .find_billable_contract(company_id, contract_id)
            .await?
            .ok_or(AppError::ContractNotFound)?;

        let row = self
            .store
            .set_month_status(contract_id, company_id, year, month, status)
            .await?;

        tracing::info!(%company_id, %contract_id, year, month, status = status.as_str(), "Status do mês alterado");
        Ok(row)
    }

    /// Os 12 meses do ano com status gravado e status efetivo.
    pub async fn month_view(
        &self,
        company_id: Uuid,
        contract_id: Uuid,
        year: i32,
    ) -> Result<Vec<MonthView>, AppError> {
        validate_month(year, 1)?;

        let billable = self
            .store
            .find_billable_contract(company_id, contract_id)
            .await?
            .ok_or(AppError::ContractNotFound)?;

        let stored: HashMap<i32, BillingStatus> = self
            .store
            .list_month_statuses(contract_id, year)
            .await?
            .into_iter()
            .map(|row| (row.month, row.status))
            .collect();

        Ok((1..=12u32)
            .map(|month| {
                let stored_status = stored.get(&(month as i32)).copied();
                MonthView {
                    year,
                    month,
                    stored_status,
                    effective_status: effective_status(
                        stored_status,
                        billable.contract.cancellation_date,
                        year,
                        month,
                    ),
                }
            })
            .collect())
    }

    /// Mudança manual de uma cobrança. `paid` é idempotente, propaga para o
    /// livro mensal e dispara no máximo uma confirmação.
    pub async fn set_billing_status(
        &self,
        company_id: Uuid,
        billing_id: Uuid,
        status: BillingStatus,
    ) -> Result<Billing, AppError> {
        let billing = self
            .store
            .find_billing_by_id(company_id, billing_id)
            .await?
            .ok_or(AppError::BillingNotFound)?;

        let updated = match status {
            BillingStatus::Paid => {
                let paid = self
                    .store
                    .mark_billing_paid(billing.id, None, Utc::now())
                    .await?
                    .ok_or(AppError::BillingNotFound)?;

                self.set_paid(paid.contract_id, paid.company_id, paid.billing_date).await?;

                // A confirmação é acessória: falha aqui não desfaz o pagamento
                if let Err(e) = self.reminders.notify_paid(&paid).await {
                    tracing::warn!(billing_id = %paid.id, error = %e, "Falha ao enviar confirmação de pagamento");
                }
                paid
            }
            other => self
                .store
                .set_billing_status(billing.id, other)
                .await?
                .ok_or(AppError::BillingNotFound)?,
        };

        tracing::info!(
            %company_id,
            %billing_id,
            from = billing.status.as_str(),
            to = updated.status.as_str(),
            "Status da cobrança alterado"
        );
        Ok(updated)
    }

    pub async fn list_billings(
        &self,
        company_id: Uuid,
        year: i32,
        month: u32,
    ) -> Result<Vec<Billing>, AppError> {
        validate_month(year, month)?;
        self.store.list_billings(company_id, year, month).await
    }
}

/// Regra de leitura: a partir do mês seguinte ao cancelamento do contrato o
/// mês aparece como `canceled`, independente do que está gravado.
pub fn effective_status(
    stored: Option<BillingStatus>,
    cancellation_date: Option<NaiveDate>,
    year: i32,
    month: u32,
) -> BillingStatus {
    let canceled_before = cancellation_date.is_some_and(|canceled| {
        NaiveDate::from_ymd_opt(year, month, 1)
            .is_some_and(|viewed| date_only::month_index(canceled) < date_only::month_index(viewed))
    });

    if canceled_before {
        BillingStatus::Canceled
    } else {
        stored.unwrap_or(BillingStatus::Pending)
    }
}

fn validate_month(year: i32, month: u32) -> Result<(), AppError> {
    if NaiveDate::from_ymd_opt(year, month, 1).is_none() || !(1900..=9999).contains(&year) {
        return Err(AppError::InvalidDate(format!("{year}-{month:02}")));
    }
    Ok(())
}
