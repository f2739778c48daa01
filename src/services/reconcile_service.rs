// src/services/reconcile_service.rs

use std::sync::Arc;

use chrono::{Datelike, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    common::error::AppError,
    db::BillingStore,
    models::{
        billing::{Billing, BillingStatus, NewBilling},
        gateway::GatewayLink,
        notification::DeliveryStatus,
    },
    services::{gateway::PaymentGateway, locks::RunGuard, reminder_service::ReminderService},
};

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    pub checked: u32,
    pub settled: u32,
    pub still_pending: u32,
    pub notified: u32,
    pub errors: u32,
}

#[derive(Debug, PartialEq, Eq)]
enum LinkOutcome {
    Settled { notified: bool },
    Pending,
}

/// Consulta no PSP os links aguardando pagamento e propaga o `paid` para
/// cobrança, livro mensal e notificação de confirmação.
pub struct ReconcileService {
    store: Arc<dyn BillingStore>,
    gateway: Arc<dyn PaymentGateway>,
    reminders: Arc<ReminderService>,
    guard: RunGuard,
}

impl ReconcileService {
    pub fn new(
        store: Arc<dyn BillingStore>,
        gateway: Arc<dyn PaymentGateway>,
        reminders: Arc<ReminderService>,
    ) -> Self {
        Self { store, gateway, reminders, guard: RunGuard::new() }
    }

    /// `None` quando já existe uma execução em andamento.
    pub async fn run(&self, limit: i64) -> Result<Option<ReconcileSummary>, AppError> {
        let Some(_token) = self.guard.try_start() else {
            tracing::debug!("Reconciliação já em andamento; ignorando disparo");
            return Ok(None);
        };

        let links = self.store.list_pending_gateway_links(limit).await?;
        let mut summary = ReconcileSummary::default();

        for link in &links {
            summary.checked += 1;

            match self.reconcile_link(link).await {
                Ok(LinkOutcome::Settled { notified }) => {
                    summary.settled += 1;
                    if notified {
                        summary.notified += 1;
                    }
                }
                Ok(LinkOutcome::Pending) => summary.still_pending += 1,
                Err(e) => {
                    tracing::error!(
                        company_id = %link.company_id,
                        contract_id = %link.contract_id,
                        txid = link.txid.as_deref().unwrap_or_default(),
                        error = %e,
                        "Falha ao reconciliar link de pagamento"
                    );
                    summary.errors += 1;
                }
            }
        }

        if summary.checked > 0 {
            tracing::info!(?summary, "Reconciliação do gateway concluída");
        }
        Ok(Some(summary))
    }

    async fn reconcile_link(&self, link: &GatewayLink) -> Result<LinkOutcome, AppError> {
        let txid = link
            .txid
            .as_deref()
            .ok_or_else(|| AppError::GatewayError("link sem txid".into()))?;

        let charge = self.gateway.get_charge_status(link.company_id, txid).await?;

        if !charge.is_settled() {
            // Só roda o updated_at: o próximo lote começa pelos outros links
            self.store.mark_gateway_link_processing(link.id).await?;
            return Ok(LinkOutcome::Pending);
        }

        let now = Utc::now();
        let paid_at = charge.paid_at.unwrap_or(now);

        // 1. Cobrança (o primeiro a marcar define data e txid)
        let billing = self.billing_for(link).await?;
        let billing = self
            .store
            .mark_billing_paid(billing.id, Some(txid), paid_at)
            .await?
            .ok_or(AppError::BillingNotFound)?;

        // 2. Livro mensal
        self.store
            .set_month_paid(
                link.contract_id,
                link.company_id,
                link.due_date.year(),
                link.due_date.month(),
            )
            .await?;

        // 3. Confirmação ao cliente, uma vez por cobrança
        let delivery = self.reminders.notify_paid(&billing).await?;
        if delivery == Some(DeliveryStatus::Failed) {
            // Link continua na fila: a próxima passada reenvia a confirmação
            self.store.mark_gateway_link_processing(link.id).await?;
            return Ok(LinkOutcome::Settled { notified: false });
        }

        // 4. Link sai da fila só com a cascata completa
        self.store.mark_gateway_link_paid(link.id, now, &charge.raw).await?;
        let notified = delivery == Some(DeliveryStatus::Sent);

        tracing::info!(
            company_id = %link.company_id,
            contract_id = %link.contract_id,
            due_date = %link.due_date,
            txid,
            "Pagamento Pix confirmado"
        );

        Ok(LinkOutcome::Settled { notified })
    }

    /// Cobrança do link: pelo `billing_id` se conhecido, senão por
    /// (contrato, vencimento). Se ainda não existir, nasce paga.
    async fn billing_for(&self, link: &GatewayLink) -> Result<Billing, AppError> {
        if let Some(billing_id) = link.billing_id {
            if let Some(billing) = self.store.find_billing_by_id(link.company_id, billing_id).await? {
                return Ok(billing);
            }
        }

        if let Some(billing) = self.store.find_billing(link.contract_id, link.due_date).await? {
            return Ok(billing);
        }

        let inserted = self
            .store
            .insert_billing_if_absent(&NewBilling {
                company_id: link.company_id,
                contract_id: link.contract_id,
                billing_date: link.due_date,
                amount: link.amount,
                status: BillingStatus::Paid,
            })
            .await?;

        match inserted {
            Some(billing) => Ok(billing),
            None => self
                .store
                .find_billing(link.contract_id, link.due_date)
                .await?
                .ok_or(AppError::BillingNotFound),
        }
    }
}
