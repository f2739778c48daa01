// src/services/reminder_service.rs

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::BillingStore,
    models::{
        billing::Billing,
        contract::BillableContract,
        gateway::{GatewayLink, PaymentLinkRequest},
        notification::{BillingNotification, DeliveryStatus, NewNotification, NotificationKind},
    },
    services::{
        gateway::PaymentGateway,
        messenger::Messenger,
        templates::{self, TemplateContext, TemplateKind},
    },
};

/// O que deve ser enviado: um lembrete de um vencimento específico.
#[derive(Debug, Clone)]
pub struct Reminder<'a> {
    pub billable: &'a BillableContract,
    pub kind: NotificationKind,
    pub due_date: NaiveDate,
    pub amount: Decimal,
    pub billing_id: Option<Uuid>,
    pub forced: bool,
}

#[derive(Debug, Clone)]
pub struct Delivery {
    pub status: DeliveryStatus,
    pub template: TemplateKind,
    pub payment_link: Option<GatewayLink>,
    pub notification: Option<BillingNotification>,
    pub error: Option<String>,
}

impl Delivery {
    pub fn is_sent(&self) -> bool {
        self.status == DeliveryStatus::Sent
    }
}

/// Envio compartilhado entre pipeline, disparo manual e confirmação de pagamento:
/// link opcional, renderização, envio e uma linha de log por tentativa.
pub struct ReminderService {
    store: Arc<dyn BillingStore>,
    messenger: Arc<dyn Messenger>,
    gateway: Arc<dyn PaymentGateway>,
}

impl ReminderService {
    pub fn new(
        store: Arc<dyn BillingStore>,
        messenger: Arc<dyn Messenger>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self { store, messenger, gateway }
    }

    /// Quem chama já validou dedupe e telefone; aqui só se garante o registro.
    pub async fn deliver(&self, reminder: &Reminder<'_>, today: NaiveDate) -> Result<Delivery, AppError> {
        let billable = reminder.billable;
        let contract = &billable.contract;

        let phone = billable
            .client
            .notification_phone()
            .ok_or_else(|| AppError::DeliveryFailed("cliente sem telefone".into()))?;

        // 1. Link de pagamento é opcional: falha no gateway não impede o lembrete
        let payment_link = match self
            .gateway
            .ensure_payment_link(&PaymentLinkRequest {
                company_id: contract.company_id,
                contract_id: contract.id,
                billing_id: reminder.billing_id,
                due_date: reminder.due_date,
                amount: reminder.amount,
                description: contract.description.clone(),
                client_name: billable.client.name.clone(),
                client_document: billable.client.document().map(str::to_string),
            })
            .await
        {
            Ok(link) => link,
            Err(e) => {
                tracing::warn!(
                    company_id = %contract.company_id,
                    contract_id = %contract.id,
                    due_date = %reminder.due_date,
                    error = %e,
                    "Falha ao obter link de pagamento; enviando sem link"
                );
                None
            }
        };

        // 2. Renderiza
        let has_link = payment_link.as_ref().is_some_and(|l| l.copy_paste.is_some());
        let template = match reminder.kind {
            NotificationKind::Manual => TemplateKind::for_manual(reminder.due_date, today, has_link),
            kind => TemplateKind::for_reminder(kind, has_link),
        };
        let message = templates::render(
            template,
            &TemplateContext {
                client_name: billable.client.display_name().to_string(),
                company_name: billable.company_name.clone(),
                description: contract.description.clone(),
                amount: reminder.amount,
                due_date: reminder.due_date,
                pix_key: billable.company_pix_key.clone(),
                copy_paste: payment_link.as_ref().and_then(|l| l.copy_paste.clone()),
                paid_on: None,
            },
        );

        // 3. Envia e registra
        let outcome = self.messenger.send(contract.company_id, phone, &message).await;
        let status = if outcome.ok { DeliveryStatus::Sent } else { DeliveryStatus::Failed };

        let notification = self
            .store
            .insert_notification(&NewNotification {
                company_id: contract.company_id,
                billing_id: reminder.billing_id.or_else(|| payment_link.as_ref().and_then(|l| l.billing_id)),
                contract_id: contract.id,
                client_id: billable.client.id,
                kind: reminder.kind,
                due_date: reminder.due_date,
                status,
                forced: reminder.forced,
                message,
                provider_response: Some(outcome.snapshot()),
            })
            .await?;

        if notification.is_none() && status == DeliveryStatus::Sent {
            tracing::warn!(
                contract_id = %contract.id,
                due_date = %reminder.due_date,
                kind = reminder.kind.as_str(),
                "Outro envio registrou este lembrete primeiro"
            );
        }

        tracing::info!(
            company_id = %contract.company_id,
            contract_id = %contract.id,
            due_date = %reminder.due_date,
            kind = reminder.kind.as_str(),
            template = template.as_str(),
            sent = outcome.ok,
            "Lembrete processado"
        );

        Ok(Delivery {
            status,
            template,
            payment_link,
            notification,
            error: outcome.error,
        })
    }

    /// Confirmação de pagamento: no máximo uma por cobrança.
    /// `None` quando não havia o que enviar (já enviada, sem telefone, contrato sumiu).
    pub async fn notify_paid(&self, billing: &Billing) -> Result<Option<DeliveryStatus>, AppError> {
        if self.store.has_paid_notification(billing.id).await? {
            return Ok(None);
        }

        let Some(billable) = self
            .store
            .find_billable_contract(billing.company_id, billing.contract_id)
            .await?
        else {
            tracing::warn!(billing_id = %billing.id, "Contrato da cobrança paga não encontrado");
            return Ok(None);
        };

        let Some(phone) = billable.client.notification_phone() else {
            return Ok(None);
        };

        let message = templates::render(
            TemplateKind::Paid,
            &TemplateContext {
                client_name: billable.client.display_name().to_string(),
                company_name: billable.company_name.clone(),
                description: billable.contract.description.clone(),
                amount: billing.amount,
                due_date: billing.billing_date,
                pix_key: None,
                copy_paste: None,
                paid_on: billing.gateway_paid_at.map(|at| at.date_naive()),
            },
        );

        let outcome = self.messenger.send(billing.company_id, phone, &message).await;
        let status = if outcome.ok { DeliveryStatus::Sent } else { DeliveryStatus::Failed };

        self.store
            .insert_notification(&NewNotification {
                company_id: billing.company_id,
                billing_id: Some(billing.id),
                contract_id: billing.contract_id,
                client_id: billable.client.id,
                kind: NotificationKind::Paid,
                due_date: billing.billing_date,
                status,
                forced: false,
                message,
                provider_response: Some(outcome.snapshot()),
            })
            .await?;

        tracing::info!(
            company_id = %billing.company_id,
            billing_id = %billing.id,
            sent = outcome.ok,
            "Confirmação de pagamento processada"
        );

        Ok(Some(status))
    }
}
