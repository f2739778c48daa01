// src/services/schedule.rs

//! Regras de vencimento de um contrato. Tudo aqui é puro (sem I/O), para que o
//! pipeline, a notificação manual e os testes calculem as mesmas datas.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;

use crate::{
    common::{date_only, error::AppError},
    models::contract::{BillableContract, BillingMode, Contract, CustomBillingDate},
};

const ALLOWED_INTERVAL_MONTHS: [u32; 3] = [1, 3, 12];

/// Uma entrada do cronograma `custom_dates` já resolvida para valor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledCharge {
    pub due_date: NaiveDate,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingRule {
    /// Vence no `day` (limitado ao fim do mês) a cada `interval_months` meses,
    /// contados a partir do mês de `anchor`.
    Monthly {
        day: u32,
        interval_months: u32,
        anchor: NaiveDate,
    },
    /// Vence a cada `every` dias a partir de `anchor`.
    IntervalDays { every: i64, anchor: NaiveDate },
    CustomDates(Vec<ScheduledCharge>),
}

impl BillingRule {
    pub fn from_contract(billable: &BillableContract) -> Result<Self, AppError> {
        let contract = &billable.contract;

        match contract.billing_mode {
            BillingMode::Monthly => {
                let day = contract
                    .billing_day
                    .unwrap_or_else(|| contract.start_date.day() as i32);
                if !(1..=31).contains(&day) {
                    return Err(AppError::InvalidBillingRule(format!("billing_day {day} fora de 1..31")));
                }

                let interval_months = contract.billing_interval_months.unwrap_or(1);
                if interval_months < 1 || !ALLOWED_INTERVAL_MONTHS.contains(&(interval_months as u32)) {
                    return Err(AppError::InvalidBillingRule(format!(
                        "intervalo de {interval_months} meses não suportado (use 1, 3 ou 12)"
                    )));
                }

                Ok(BillingRule::Monthly {
                    day: day as u32,
                    interval_months: interval_months as u32,
                    anchor: contract.start_date,
                })
            }
            BillingMode::IntervalDays => match contract.billing_interval_days {
                Some(every) if every > 0 => Ok(BillingRule::IntervalDays {
                    every: every as i64,
                    anchor: contract.start_date,
                }),
                other => Err(AppError::InvalidBillingRule(format!(
                    "billing_interval_days inválido: {other:?}"
                ))),
            },
            BillingMode::CustomDates => {
                let mut charges = billable
                    .custom_dates
                    .iter()
                    .map(|entry| resolve_custom_amount(contract, entry).map(|amount| ScheduledCharge {
                        due_date: entry.due_date,
                        amount,
                    }))
                    .collect::<Result<Vec<_>, _>>()?;
                charges.sort_by_key(|c| c.due_date);
                Ok(BillingRule::CustomDates(charges))
            }
        }
    }

    /// Vencimento desta regra dentro de (ano, mês), se o mês for de cobrança.
    /// Só faz sentido para `Monthly`; as demais regras podem ter vários
    /// vencimentos no mesmo mês.
    pub fn monthly_due_date(&self, year: i32, month: u32) -> Option<NaiveDate> {
        let BillingRule::Monthly { day, interval_months, anchor } = self else {
            return None;
        };

        let first_of_month = NaiveDate::from_ymd_opt(year, month, 1)?;
        let distance = date_only::month_index(first_of_month) - date_only::month_index(*anchor);
        if distance < 0 || distance % *interval_months as i64 != 0 {
            return None;
        }

        date_only::clamp_day(year, month, *day)
    }

    pub fn is_due_on(&self, date: NaiveDate) -> bool {
        match self {
            BillingRule::Monthly { .. } => self.monthly_due_date(date.year(), date.month()) == Some(date),
            BillingRule::IntervalDays { every, anchor } => {
                let offset = (date - *anchor).num_days();
                offset >= 0 && offset % every == 0
            }
            BillingRule::CustomDates(charges) => charges.iter().any(|c| c.due_date == date),
        }
    }

    /// Valor devido na data, ou `None` se a data não é um vencimento.
    pub fn amount_due_on(&self, contract_value: Decimal, date: NaiveDate) -> Option<Decimal> {
        match self {
            BillingRule::CustomDates(charges) => charges
                .iter()
                .find(|c| c.due_date == date)
                .map(|c| c.amount),
            _ if self.is_due_on(date) => Some(contract_value),
            _ => None,
        }
    }

    /// Resolve o vencimento de um disparo manual.
    ///
    /// - `Monthly`: usa o dia de cobrança do mês de `requested` (ou de `today`);
    ///   qualquer dia do mês serve como referência.
    /// - `IntervalDays`: a data é obrigatória e precisa cair exatamente num ciclo.
    /// - `CustomDates`: a data precisa existir no cronograma.
    pub fn resolve_due_date(
        &self,
        requested: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<NaiveDate, AppError> {
        match self {
            BillingRule::Monthly { .. } => {
                let reference = requested.unwrap_or(today);
                self.monthly_due_date(reference.year(), reference.month())
                    .ok_or_else(|| AppError::NotABillingDate(date_only::to_iso(reference)))
            }
            BillingRule::IntervalDays { .. } => {
                let date = requested.ok_or_else(|| {
                    AppError::InvalidDate("informe a data para contratos por intervalo de dias".into())
                })?;
                if self.is_due_on(date) {
                    Ok(date)
                } else {
                    Err(AppError::NotABillingDate(date_only::to_iso(date)))
                }
            }
            BillingRule::CustomDates(charges) => {
                let date = requested.ok_or_else(|| {
                    AppError::InvalidDate("informe a data para contratos com datas personalizadas".into())
                })?;
                charges
                    .iter()
                    .find(|c| c.due_date == date)
                    .map(|c| c.due_date)
                    .ok_or_else(|| AppError::CustomDateNotFound(date_only::to_iso(date)))
            }
        }
    }
}

/// Contrato que o motor pode cobrar/notificar na data: ativo e vigente.
pub fn is_billable_on(contract: &Contract, date: NaiveDate) -> bool {
    contract.active && contract.is_in_force(date)
}

fn resolve_custom_amount(contract: &Contract, entry: &CustomBillingDate) -> Result<Decimal, AppError> {
    match (entry.amount, entry.percentage) {
        (Some(amount), _) => Ok(amount),
        (None, Some(percentage)) => Ok((contract.value * percentage / Decimal::ONE_HUNDRED).round_dp(2)),
        (None, None) => Err(AppError::InvalidBillingRule(format!(
            "data personalizada {} sem valor nem percentual",
            date_only::to_iso(entry.due_date)
        ))),
    }
}
