// src/db/company_repo.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::company::{GatewaySettings, WhatsAppSettings},
};

// Configurações de integração por empresa (somente leitura para o motor)
#[derive(Clone)]
pub struct CompanyRepository {
    pool: PgPool,
}

impl CompanyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn whatsapp_settings(
        &self,
        company_id: Uuid,
    ) -> Result<Option<WhatsAppSettings>, AppError> {
        let settings = sqlx::query_as::<_, WhatsAppSettings>(
            r#"
            SELECT
                id AS company_id,
                whatsapp_api_url AS api_url,
                whatsapp_instance AS instance,
                whatsapp_token AS token
            FROM companies
            WHERE id = $1
              AND whatsapp_api_url IS NOT NULL
              AND whatsapp_instance IS NOT NULL
              AND whatsapp_token IS NOT NULL
            "#,
        )
            .bind(company_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(settings)
    }

    /// `None` quando a empresa não tem gateway configurado ou está desligado.
    pub async fn gateway_settings(
        &self,
        company_id: Uuid,
    ) -> Result<Option<GatewaySettings>, AppError> {
        let settings = sqlx::query_as::<_, GatewaySettings>(
            r#"
            SELECT company_id, base_url, client_id, client_secret, pix_key
            FROM company_gateway_settings
            WHERE company_id = $1 AND enabled = TRUE
            "#,
        )
            .bind(company_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(settings)
    }
}
