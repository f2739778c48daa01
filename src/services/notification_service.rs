// src/services/notification_service.rs

use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::BillingStore,
    models::{
        gateway::GatewayLink,
        notification::{BillingNotification, NotificationKind},
    },
    services::{
        billing_pipeline::ensure_pending_billing,
        locks::ContractLock,
        reminder_service::{Reminder, ReminderService},
        schedule::BillingRule,
    },
};

#[derive(Debug, Clone)]
pub struct ManualNotifyRequest {
    pub contract_id: Uuid,
    /// Data de referência; obrigatória para `interval_days` e `custom_dates`.
    pub date: Option<NaiveDate>,
    pub kind: NotificationKind,
    /// Ignora a checagem de envio anterior.
    pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ManualNotifyStatus {
    Sent,
    SkippedNoPhone,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManualNotifyOutcome {
    pub status: ManualNotifyStatus,
    #[schema(value_type = String, format = Date)]
    pub due_date: NaiveDate,
    pub billing_id: Option<Uuid>,
    /// Variante de mensagem usada (`due_gateway`, `late`...).
    pub template: Option<String>,
    pub payment_link: Option<GatewayLink>,
    pub notification_id: Option<Uuid>,
}

pub struct NotificationService {
    store: Arc<dyn BillingStore>,
    reminders: Arc<ReminderService>,
    locks: Arc<dyn ContractLock>,
}

impl NotificationService {
    pub fn new(
        store: Arc<dyn BillingStore>,
        reminders: Arc<ReminderService>,
        locks: Arc<dyn ContractLock>,
    ) -> Self {
        Self { store, reminders, locks }
    }

    /// Disparo manual de um lembrete, com as mesmas garantias do pipeline.
    pub async fn notify(
        &self,
        company_id: Uuid,
        request: ManualNotifyRequest,
        today: NaiveDate,
    ) -> Result<ManualNotifyOutcome, AppError> {
        if request.kind == NotificationKind::Paid {
            return Err(AppError::InvalidNotificationKind(request.kind.as_str().into()));
        }

        // 1. Contrato e vencimento
        let billable = self
            .store
            .find_billable_contract(company_id, request.contract_id)
            .await?
            .ok_or(AppError::ContractNotFound)?;
        let contract = &billable.contract;

        let rule = BillingRule::from_contract(&billable)?;
        let due_date = rule.resolve_due_date(request.date, today)?;
        let amount = rule
            .amount_due_on(contract.value, due_date)
            .ok_or_else(|| AppError::NotABillingDate(due_date.to_string()))?;

        // 2. Mês e cobrança já encerrados
        if let Some(month) = self
            .store
            .month_status(contract.id, due_date.year(), due_date.month())
            .await?
        {
            if month.status.is_terminal() {
                return Err(AppError::MonthAlreadySettled(month.status));
            }
        }

        let billing = self.store.find_billing(contract.id, due_date).await?;
        if request.kind != NotificationKind::Pre {
            if let Some(billing) = billing.as_ref().filter(|b| b.status.is_terminal()) {
                return Err(AppError::BillingAlreadySettled(billing.status));
            }
        }

        // 3. Exclusão por contrato até o log ser gravado; liberado no drop
        let _guard = self.locks.acquire(contract.id).await?;

        if !request.force
            && self
                .store
                .has_sent_notification(contract.id, due_date, request.kind)
                .await?
        {
            return Err(AppError::AlreadyNotified);
        }

        if billable.client.notification_phone().is_none() {
            tracing::info!(contract_id = %contract.id, "Cliente sem telefone; notificação manual ignorada");
            return Ok(ManualNotifyOutcome {
                status: ManualNotifyStatus::SkippedNoPhone,
                due_date,
                billing_id: billing.map(|b| b.id),
                template: None,
                payment_link: None,
                notification_id: None,
            });
        }

        // 4. Cobrança e mês passam a existir a partir do primeiro aviso
        let billing = match billing {
            Some(billing) => billing,
            None => ensure_pending_billing(self.store.as_ref(), &billable, due_date, amount).await?,
        };
        self.store
            .ensure_month_pending(contract.id, company_id, due_date.year(), due_date.month())
            .await?;

        // 5. Envio
        let delivery = self
            .reminders
            .deliver(
                &Reminder {
                    billable: &billable,
                    kind: request.kind,
                    due_date,
                    amount: billing.amount,
                    billing_id: Some(billing.id),
                    forced: request.force,
                },
                today,
            )
            .await?;

        if !delivery.is_sent() {
            return Err(AppError::DeliveryFailed(
                delivery.error.unwrap_or_else(|| "mensagem não entregue".into()),
            ));
        }

        Ok(ManualNotifyOutcome {
            status: ManualNotifyStatus::Sent,
            due_date,
            billing_id: Some(billing.id),
            template: Some(delivery.template.as_str().to_string()),
            payment_link: delivery.payment_link,
            notification_id: delivery.notification.map(|n| n.id),
        })
    }

    pub async fn list_for_contract(
        &self,
        company_id: Uuid,
        contract_id: Uuid,
    ) -> Result<Vec<BillingNotification>, AppError> {
        self.store.list_notifications(company_id, contract_id).await
    }
}
