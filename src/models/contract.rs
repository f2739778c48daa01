// src/models/contract.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Enums (Mapeando o Postgres) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "billing_mode", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BillingMode {
    Monthly,      // Todo mês no billing_day (a cada 1, 3 ou 12 meses)
    IntervalDays, // A cada N dias a partir do início
    CustomDates,  // Datas avulsas cadastradas
}

// --- Structs ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: Uuid,

    #[schema(ignore)]
    pub company_id: Uuid,

    pub client_id: Uuid,

    #[schema(example = "Mensalidade plano empresarial")]
    pub description: String,

    #[schema(example = "250.00")]
    pub value: Decimal,

    #[schema(value_type = String, format = Date, example = "2024-01-01")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = Date, example = "2024-12-31")]
    pub end_date: NaiveDate,
    #[schema(value_type = Option<String>, format = Date)]
    pub cancellation_date: Option<NaiveDate>,

    pub active: bool,
    pub billing_mode: BillingMode,

    #[schema(example = 10)]
    pub billing_day: Option<i32>,
    #[schema(example = 1)]
    pub billing_interval_months: Option<i32>,
    pub billing_interval_days: Option<i32>,

    #[schema(value_type = Option<String>, format = Date)]
    pub last_billed_date: Option<NaiveDate>,
}

impl Contract {
    /// Vigente na data: dentro de [início, fim] e sem cancelamento anterior.
    pub fn is_in_force(&self, date: NaiveDate) -> bool {
        self.start_date <= date
            && date <= self.end_date
            && self.cancellation_date.is_none_or(|canceled| canceled >= date)
    }
}

/// Entrada do cronograma de um contrato `custom_dates`: valor fixo ou
/// percentual do valor do contrato.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomBillingDate {
    pub contract_id: Uuid,
    #[schema(value_type = String, format = Date)]
    pub due_date: NaiveDate,
    pub amount: Option<Decimal>,
    #[schema(example = "50.0")]
    pub percentage: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: Uuid,
    #[schema(ignore)]
    pub company_id: Uuid,
    pub name: String,
    pub responsible_name: Option<String>,
    #[schema(example = "(11) 99999-8888")]
    pub phone: Option<String>,
    pub email: Option<String>,
    pub cpf: Option<String>,
    pub cnpj: Option<String>,
    pub active: bool,
}

impl Client {
    /// Telefone utilizável para WhatsApp; vazio conta como ausente.
    pub fn notification_phone(&self) -> Option<&str> {
        self.phone.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }

    /// CPF ou CNPJ (mutuamente exclusivos).
    pub fn document(&self) -> Option<&str> {
        self.cpf.as_deref().or(self.cnpj.as_deref())
    }

    pub fn display_name(&self) -> &str {
        self.responsible_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.name)
    }
}

/// Tudo que o motor precisa saber de um contrato para cobrar e notificar.
#[derive(Debug, Clone)]
pub struct BillableContract {
    pub contract: Contract,
    pub client: Client,
    pub company_name: String,
    pub company_pix_key: Option<String>,
    pub custom_dates: Vec<CustomBillingDate>,
}
