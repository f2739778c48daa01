// src/models/billing.rs

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Enums (Mapeando o Postgres) ---

/// Status tanto da cobrança quanto do mês do contrato.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "billing_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BillingStatus {
    Pending,
    Paid,
    Canceled,
}

impl BillingStatus {
    /// `paid` e `canceled` encerram o ciclo: nenhum lembrete automático depois disso.
    pub fn is_terminal(self) -> bool {
        matches!(self, BillingStatus::Paid | BillingStatus::Canceled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BillingStatus::Pending => "pending",
            BillingStatus::Paid => "paid",
            BillingStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for BillingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Structs ---

/// Instância de cobrança: uma por (contrato, data de vencimento).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Billing {
    pub id: Uuid,
    #[schema(ignore)]
    pub company_id: Uuid,
    pub contract_id: Uuid,

    #[schema(value_type = String, format = Date, example = "2024-02-29")]
    pub billing_date: NaiveDate,

    #[schema(example = "250.00")]
    pub amount: Decimal,
    pub status: BillingStatus,

    pub gateway_txid: Option<String>,
    pub gateway_paid_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBilling {
    pub company_id: Uuid,
    pub contract_id: Uuid,
    pub billing_date: NaiveDate,
    pub amount: Decimal,
    pub status: BillingStatus,
}

/// Linha do livro mensal: status autoritativo do contrato naquele mês.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContractMonthStatus {
    pub contract_id: Uuid,
    #[schema(ignore)]
    pub company_id: Uuid,
    #[schema(example = 2024)]
    pub year: i32,
    #[schema(example = 9)]
    pub month: i32,
    pub status: BillingStatus,
    pub updated_at: DateTime<Utc>,
}

/// Visão de leitura de um mês: o que está gravado e o que vale na tela.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonthView {
    pub year: i32,
    pub month: u32,
    pub stored_status: Option<BillingStatus>,
    pub effective_status: BillingStatus,
}
