// src/db/gateway_link_repo.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::gateway::{GatewayLink, NewGatewayLink},
};

#[derive(Clone)]
pub struct GatewayLinkRepository {
    pool: PgPool,
}

impl GatewayLinkRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find(
        &self,
        company_id: Uuid,
        contract_id: Uuid,
        due_date: NaiveDate,
    ) -> Result<Option<GatewayLink>, AppError> {
        let link = sqlx::query_as::<_, GatewayLink>(
            r#"
            SELECT * FROM billing_gateway_links
            WHERE company_id = $1 AND contract_id = $2 AND due_date = $3
            "#,
        )
            .bind(company_id)
            .bind(contract_id)
            .bind(due_date)
            .fetch_optional(&self.pool)
            .await?;

        Ok(link)
    }

    /// UPSERT (Insert or Update) do link. Um link já pago nunca é regerado:
    /// nesse caso o WHERE do DO UPDATE não casa e devolvemos a linha atual.
    pub async fn upsert<'e, E>(
        &self,
        executor: E,
        link: &NewGatewayLink,
    ) -> Result<Option<GatewayLink>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let saved = sqlx::query_as::<_, GatewayLink>(
            r#"
            INSERT INTO billing_gateway_links (
                company_id, contract_id, billing_id, due_date, amount,
                txid, copy_paste, qr_image, expires_at, status, payload
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'generated', $10)
            ON CONFLICT (company_id, contract_id, due_date)
            DO UPDATE SET
                billing_id = COALESCE(EXCLUDED.billing_id, billing_gateway_links.billing_id),
                amount = EXCLUDED.amount,
                txid = EXCLUDED.txid,
                copy_paste = EXCLUDED.copy_paste,
                qr_image = EXCLUDED.qr_image,
                expires_at = EXCLUDED.expires_at,
                status = 'generated',
                payload = EXCLUDED.payload,
                updated_at = NOW()
            WHERE billing_gateway_links.status <> 'paid'
            RETURNING *
            "#,
        )
            .bind(link.company_id)
            .bind(link.contract_id)
            .bind(link.billing_id)
            .bind(link.due_date)
            .bind(link.amount)
            .bind(&link.txid)
            .bind(&link.copy_paste)
            .bind(&link.qr_image)
            .bind(link.expires_at)
            .bind(&link.payload)
            .fetch_optional(executor)
            .await?;

        Ok(saved)
    }

    pub async fn attach_billing<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        contract_id: Uuid,
        due_date: NaiveDate,
        billing_id: Uuid,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE billing_gateway_links
            SET billing_id = $4, updated_at = NOW()
            WHERE company_id = $1 AND contract_id = $2 AND due_date = $3
              AND billing_id IS NULL
            "#,
        )
            .bind(company_id)
            .bind(contract_id)
            .bind(due_date)
            .bind(billing_id)
            .execute(executor)
            .await?;

        Ok(())
    }

    pub async fn list_pending(&self, limit: i64) -> Result<Vec<GatewayLink>, AppError> {
        let links = sqlx::query_as::<_, GatewayLink>(
            r#"
            SELECT * FROM billing_gateway_links
            WHERE status IN ('generated', 'processing')
              AND txid IS NOT NULL
              AND paid_at IS NULL
            ORDER BY updated_at ASC
            LIMIT $1
            "#,
        )
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(links)
    }

    // Atualiza o updated_at para o próximo lote começar pelos outros links
    pub async fn mark_processing<'e, E>(&self, executor: E, link_id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE billing_gateway_links
            SET status = 'processing', updated_at = NOW()
            WHERE id = $1 AND status <> 'paid'
            "#,
        )
            .bind(link_id)
            .execute(executor)
            .await?;

        Ok(())
    }

    /// Guarda o retorno do PSP dentro do payload para auditoria.
    pub async fn mark_paid<'e, E>(
        &self,
        executor: E,
        link_id: Uuid,
        paid_at: DateTime<Utc>,
        detail: &Value,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE billing_gateway_links
            SET status = 'paid',
                paid_at = COALESCE(paid_at, $2),
                payload = COALESCE(payload, '{}'::jsonb) || jsonb_build_object('gateway_detail', $3::jsonb),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
            .bind(link_id)
            .bind(paid_at)
            .bind(detail)
            .execute(executor)
            .await?;

        Ok(())
    }
}
