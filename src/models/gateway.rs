// src/models/gateway.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "gateway_link_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GatewayLinkStatus {
    Generated,
    Processing,
    Paid,
}

/// Cobrança Pix emitida para (empresa, contrato, vencimento).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GatewayLink {
    pub id: Uuid,
    #[schema(ignore)]
    pub company_id: Uuid,
    pub contract_id: Uuid,
    pub billing_id: Option<Uuid>,
    #[schema(value_type = String, format = Date)]
    pub due_date: NaiveDate,
    pub amount: Decimal,
    pub txid: Option<String>,
    /// Código "Pix Copia e Cola" (BR Code).
    pub copy_paste: Option<String>,
    /// QR Code em data URI PNG.
    pub qr_image: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub status: GatewayLinkStatus,
    pub paid_at: Option<DateTime<Utc>>,
    #[schema(value_type = Option<Object>)]
    pub payload: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GatewayLink {
    /// Pode ser reaproveitado em um novo lembrete.
    pub fn is_reusable(&self, now: DateTime<Utc>) -> bool {
        self.status != GatewayLinkStatus::Paid
            && self.copy_paste.is_some()
            && self.expires_at.is_none_or(|expires| expires > now)
    }
}

#[derive(Debug, Clone)]
pub struct NewGatewayLink {
    pub company_id: Uuid,
    pub contract_id: Uuid,
    pub billing_id: Option<Uuid>,
    pub due_date: NaiveDate,
    pub amount: Decimal,
    pub txid: String,
    pub copy_paste: String,
    pub qr_image: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub payload: Value,
}

/// Dados para `ensure_payment_link`.
#[derive(Debug, Clone)]
pub struct PaymentLinkRequest {
    pub company_id: Uuid,
    pub contract_id: Uuid,
    pub billing_id: Option<Uuid>,
    pub due_date: NaiveDate,
    pub amount: Decimal,
    pub description: String,
    pub client_name: String,
    pub client_document: Option<String>,
}

/// Resposta do PSP sobre uma cobrança (`GET /v2/cob/{txid}`).
#[derive(Debug, Clone)]
pub struct ChargeStatus {
    pub status: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub raw: Value,
}

impl ChargeStatus {
    pub fn is_settled(&self) -> bool {
        self.status.eq_ignore_ascii_case("CONCLUIDA")
    }
}
