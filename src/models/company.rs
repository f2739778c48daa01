// src/models/company.rs

use serde::Deserialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Conexão da empresa com a API HTTP de WhatsApp.
#[derive(Debug, Clone, Deserialize, FromRow)]
pub struct WhatsAppSettings {
    pub company_id: Uuid,
    pub api_url: String,
    pub instance: String,
    pub token: String,
}

/// Credenciais do PSP Pix da empresa.
#[derive(Debug, Clone, Deserialize, FromRow)]
pub struct GatewaySettings {
    pub company_id: Uuid,
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub pix_key: String,
}
