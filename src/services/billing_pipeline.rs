// src/services/billing_pipeline.rs

use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::{date_only, error::AppError},
    db::BillingStore,
    models::{
        billing::{Billing, BillingStatus, NewBilling},
        contract::BillableContract,
        notification::NotificationKind,
    },
    services::{
        reminder_service::{Reminder, ReminderService},
        schedule::{self, BillingRule},
    },
};

/// Passos habilitados numa execução. O escopo de empresa é opcional
/// (o agendador roda para todas).
#[derive(Debug, Clone, Copy)]
pub struct DailyRunOptions {
    pub generate: bool,
    pub pre: bool,
    pub due: bool,
    pub late: bool,
    pub company_id: Option<Uuid>,
}

impl Default for DailyRunOptions {
    fn default() -> Self {
        Self { generate: true, pre: true, due: true, late: true, company_id: None }
    }
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StepSummary {
    /// Contratos com vencimento na data alvo do passo.
    pub candidates: u32,
    pub created: u32,
    pub sent: u32,
    pub failed: u32,
    pub skipped: u32,
    pub errors: u32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyRunSummary {
    #[schema(value_type = String, format = Date)]
    pub as_of: NaiveDate,
    pub contracts: u32,
    pub generate: Option<StepSummary>,
    pub pre: Option<StepSummary>,
    pub due: Option<StepSummary>,
    pub late: Option<StepSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepOutcome {
    NotDue,
    Created,
    Existing,
    Skipped(SkipReason),
    Sent,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SkipReason {
    MonthSettled,
    BillingSettled,
    NoPhone,
    AlreadySent,
}

impl StepSummary {
    fn record(&mut self, outcome: StepOutcome) {
        if outcome == StepOutcome::NotDue {
            return;
        }
        self.candidates += 1;
        match outcome {
            StepOutcome::Created => self.created += 1,
            StepOutcome::Existing | StepOutcome::Skipped(_) => self.skipped += 1,
            StepOutcome::Sent => self.sent += 1,
            StepOutcome::Failed => self.failed += 1,
            StepOutcome::NotDue => {}
        }
    }

    fn record_error(&mut self) {
        self.candidates += 1;
        self.errors += 1;
    }
}

pub struct BillingPipeline {
    store: Arc<dyn BillingStore>,
    reminders: Arc<ReminderService>,
    pre_reminder_days: i64,
    late_reminder_days: i64,
}

impl BillingPipeline {
    pub fn new(
        store: Arc<dyn BillingStore>,
        reminders: Arc<ReminderService>,
        pre_reminder_days: i64,
        late_reminder_days: i64,
    ) -> Self {
        Self { store, reminders, pre_reminder_days, late_reminder_days }
    }

    /// Execução diária: gera as cobranças do dia e dispara os lembretes
    /// pre/due/late. Pode ser repetida para a mesma data sem duplicar
    /// cobranças nem envios.
    pub async fn run_daily(
        &self,
        as_of: NaiveDate,
        options: DailyRunOptions,
    ) -> Result<DailyRunSummary, AppError> {
        let contracts = self.store.list_billable_contracts(options.company_id).await?;

        tracing::info!(
            as_of = %as_of,
            contracts = contracts.len(),
            company_id = ?options.company_id,
            "Iniciando execução diária de cobrança"
        );

        let mut summary = DailyRunSummary {
            as_of,
            contracts: contracts.len() as u32,
            generate: None,
            pre: None,
            due: None,
            late: None,
        };

        // A geração vem antes para que o lembrete do dia já encontre a cobrança
        if options.generate {
            summary.generate = Some(self.generate_step(&contracts, as_of).await);
        }
        if options.pre {
            let target = date_only::add_days(as_of, self.pre_reminder_days);
            summary.pre = Some(self.reminder_step(&contracts, NotificationKind::Pre, target, as_of).await);
        }
        if options.due {
            summary.due = Some(self.reminder_step(&contracts, NotificationKind::Due, as_of, as_of).await);
        }
        if options.late {
            let target = date_only::add_days(as_of, -self.late_reminder_days);
            summary.late = Some(self.reminder_step(&contracts, NotificationKind::Late, target, as_of).await);
        }

        tracing::info!(as_of = %as_of, ?summary, "Execução diária concluída");
        Ok(summary)
    }

    async fn generate_step(&self, contracts: &[BillableContract], as_of: NaiveDate) -> StepSummary {
        let mut step = StepSummary::default();

        for billable in contracts {
            match self.generate_for(billable, as_of).await {
                Ok(outcome) => step.record(outcome),
                Err(e) => {
                    tracing::error!(
                        company_id = %billable.contract.company_id,
                        contract_id = %billable.contract.id,
                        date = %as_of,
                        step = "generate",
                        error = %e,
                        "Falha ao gerar cobrança"
                    );
                    step.record_error();
                }
            }
        }

        step
    }

    async fn reminder_step(
        &self,
        contracts: &[BillableContract],
        kind: NotificationKind,
        target: NaiveDate,
        as_of: NaiveDate,
    ) -> StepSummary {
        let mut step = StepSummary::default();

        for billable in contracts {
            match self.remind(billable, kind, target, as_of).await {
                Ok(StepOutcome::Skipped(reason)) => {
                    tracing::debug!(
                        contract_id = %billable.contract.id,
                        due_date = %target,
                        step = kind.as_str(),
                        ?reason,
                        "Lembrete ignorado"
                    );
                    step.record(StepOutcome::Skipped(reason));
                }
                Ok(outcome) => step.record(outcome),
                Err(e) => {
                    tracing::error!(
                        company_id = %billable.contract.company_id,
                        contract_id = %billable.contract.id,
                        due_date = %target,
                        step = kind.as_str(),
                        error = %e,
                        "Falha ao processar lembrete"
                    );
                    step.record_error();
                }
            }
        }

        step
    }

    async fn generate_for(&self, billable: &BillableContract, as_of: NaiveDate) -> Result<StepOutcome, AppError> {
        let contract = &billable.contract;
        if !schedule::is_billable_on(contract, as_of) {
            return Ok(StepOutcome::NotDue);
        }

        let rule = BillingRule::from_contract(billable)?;
        let Some(amount) = rule.amount_due_on(contract.value, as_of) else {
            return Ok(StepOutcome::NotDue);
        };

        let (year, month) = (as_of.year(), as_of.month());

        // Mês já encerrado: a cobrança nasce com o mesmo status, nunca rebaixa o livro
        let status = self
            .store
            .month_status(contract.id, year, month)
            .await?
            .map(|m| m.status)
            .filter(|s| s.is_terminal())
            .unwrap_or(BillingStatus::Pending);

        let inserted = self
            .store
            .insert_billing_if_absent(&NewBilling {
                company_id: contract.company_id,
                contract_id: contract.id,
                billing_date: as_of,
                amount,
                status,
            })
            .await?;

        let outcome = if inserted.is_some() { StepOutcome::Created } else { StepOutcome::Existing };
        let billing = match inserted {
            Some(billing) => billing,
            None => self.existing_billing(contract.id, as_of).await?,
        };

        self.store
            .ensure_month_pending(contract.id, contract.company_id, year, month)
            .await?;
        self.store.touch_last_billed(contract.id, as_of).await?;
        self.store
            .attach_billing_to_link(contract.company_id, contract.id, as_of, billing.id)
            .await?;

        if outcome == StepOutcome::Created {
            tracing::debug!(contract_id = %contract.id, billing_date = %as_of, %amount, "Cobrança gerada");
        }
        Ok(outcome)
    }

    async fn remind(
        &self,
        billable: &BillableContract,
        kind: NotificationKind,
        target: NaiveDate,
        as_of: NaiveDate,
    ) -> Result<StepOutcome, AppError> {
        let contract = &billable.contract;
        if !schedule::is_billable_on(contract, target) {
            return Ok(StepOutcome::NotDue);
        }

        let rule = BillingRule::from_contract(billable)?;
        let Some(amount) = rule.amount_due_on(contract.value, target) else {
            return Ok(StepOutcome::NotDue);
        };

        let (year, month) = (target.year(), target.month());

        // 1. Mês encerrado no livro: nenhum lembrete automático
        if let Some(month_status) = self.store.month_status(contract.id, year, month).await? {
            if month_status.status.is_terminal() {
                return Ok(StepOutcome::Skipped(SkipReason::MonthSettled));
            }
        }

        // 2. A cobrança pode estar paga antes do livro (fluxos manuais)
        let billing = self.store.find_billing(contract.id, target).await?;
        if kind != NotificationKind::Pre
            && billing.as_ref().is_some_and(|b| b.status.is_terminal())
        {
            return Ok(StepOutcome::Skipped(SkipReason::BillingSettled));
        }

        // 3. Sem telefone não há envio (não é erro)
        if billable.client.notification_phone().is_none() {
            return Ok(StepOutcome::Skipped(SkipReason::NoPhone));
        }

        // 4. Dedupe: só um envio com sucesso por (contrato, vencimento, tipo)
        if self.store.has_sent_notification(contract.id, target, kind).await? {
            return Ok(StepOutcome::Skipped(SkipReason::AlreadySent));
        }

        // 5. No dia e depois do vencimento a cobrança precisa existir
        let billing = match (kind, billing) {
            (_, Some(billing)) => Some(billing),
            (NotificationKind::Pre, None) => None,
            (_, None) => Some(ensure_pending_billing(self.store.as_ref(), billable, target, amount).await?),
        };

        self.store
            .ensure_month_pending(contract.id, contract.company_id, year, month)
            .await?;

        let delivery = self
            .reminders
            .deliver(
                &Reminder {
                    billable,
                    kind,
                    due_date: target,
                    amount: billing.as_ref().map(|b| b.amount).unwrap_or(amount),
                    billing_id: billing.as_ref().map(|b| b.id),
                    forced: false,
                },
                as_of,
            )
            .await?;

        Ok(if delivery.is_sent() { StepOutcome::Sent } else { StepOutcome::Failed })
    }

    async fn existing_billing(&self, contract_id: Uuid, billing_date: NaiveDate) -> Result<Billing, AppError> {
        self.store
            .find_billing(contract_id, billing_date)
            .await?
            .ok_or(AppError::BillingNotFound)
    }
}

/// Cria a cobrança pendente de um vencimento se ainda não existir.
/// Usado também pelo disparo manual.
pub async fn ensure_pending_billing(
    store: &dyn BillingStore,
    billable: &BillableContract,
    due_date: NaiveDate,
    amount: Decimal,
) -> Result<Billing, AppError> {
    let contract = &billable.contract;
    if let Some(billing) = store
        .insert_billing_if_absent(&NewBilling {
            company_id: contract.company_id,
            contract_id: contract.id,
            billing_date: due_date,
            amount,
            status: BillingStatus::Pending,
        })
        .await?
    {
        return Ok(billing);
    }

    store
        .find_billing(contract.id, due_date)
        .await?
        .ok_or(AppError::BillingNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_due_contracts_are_not_counted() {
        let mut step = StepSummary::default();
        step.record(StepOutcome::NotDue);
        step.record(StepOutcome::Sent);
        step.record(StepOutcome::Skipped(SkipReason::AlreadySent));
        step.record(StepOutcome::Failed);
        step.record_error();

        assert_eq!(step.candidates, 4);
        assert_eq!(step.sent, 1);
        assert_eq!(step.skipped, 1);
        assert_eq!(step.failed, 1);
        assert_eq!(step.errors, 1);
    }
}
