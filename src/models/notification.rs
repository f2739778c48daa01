// src/models/notification.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "notification_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Pre,    // Antes do vencimento
    Due,    // No dia
    Late,   // Em atraso
    Manual, // Disparo avulso pelo usuário
    Paid,   // Confirmação de pagamento
}

impl NotificationKind {
    /// Tipos disparados pelo pipeline diário (deduplicados por contrato + vencimento).
    pub fn is_automatic(self) -> bool {
        matches!(self, NotificationKind::Pre | NotificationKind::Due | NotificationKind::Late)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Pre => "pre",
            NotificationKind::Due => "due",
            NotificationKind::Late => "late",
            NotificationKind::Manual => "manual",
            NotificationKind::Paid => "paid",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "delivery_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

/// Registro (somente inserção) de cada tentativa de envio.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BillingNotification {
    pub id: Uuid,
    #[schema(ignore)]
    pub company_id: Uuid,
    pub billing_id: Option<Uuid>,
    pub contract_id: Uuid,
    pub client_id: Uuid,
    pub kind: NotificationKind,
    #[schema(value_type = String, format = Date)]
    pub due_date: NaiveDate,
    pub status: DeliveryStatus,
    pub forced: bool,
    pub message: String,
    #[schema(value_type = Option<Object>)]
    pub provider_response: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub company_id: Uuid,
    pub billing_id: Option<Uuid>,
    pub contract_id: Uuid,
    pub client_id: Uuid,
    pub kind: NotificationKind,
    pub due_date: NaiveDate,
    pub status: DeliveryStatus,
    pub forced: bool,
    pub message: String,
    pub provider_response: Option<Value>,
}
