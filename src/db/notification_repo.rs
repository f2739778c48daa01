// src/db/notification_repo.rs

use chrono::NaiveDate;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::notification::{BillingNotification, NewNotification, NotificationKind},
};

#[derive(Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Só `sent` não forçado bloqueia: uma falha anterior deixa a próxima execução
    // tentar de novo, e um reenvio forçado não ocupa a vaga do automático.
    pub async fn has_sent(
        &self,
        contract_id: Uuid,
        due_date: NaiveDate,
        kind: NotificationKind,
    ) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM billing_notifications
                WHERE contract_id = $1 AND due_date = $2 AND kind = $3
                  AND status = 'sent' AND NOT forced
            )
            "#,
        )
            .bind(contract_id)
            .bind(due_date)
            .bind(kind)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    pub async fn has_paid_for_billing(&self, billing_id: Uuid) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM billing_notifications
                WHERE billing_id = $1 AND kind = 'paid' AND status = 'sent'
            )
            "#,
        )
            .bind(billing_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    /// Os índices únicos parciais garantem um único `sent` por chave; o
    /// `DO NOTHING` transforma a corrida em "não inseriu".
    pub async fn insert<'e, E>(
        &self,
        executor: E,
        new: &NewNotification,
    ) -> Result<Option<BillingNotification>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, BillingNotification>(
            r#"
            INSERT INTO billing_notifications (
                company_id, billing_id, contract_id, client_id,
                kind, due_date, status, forced, message, provider_response
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT DO NOTHING
            RETURNING *
            "#,
        )
            .bind(new.company_id)
            .bind(new.billing_id)
            .bind(new.contract_id)
            .bind(new.client_id)
            .bind(new.kind)
            .bind(new.due_date)
            .bind(new.status)
            .bind(new.forced)
            .bind(&new.message)
            .bind(&new.provider_response)
            .fetch_optional(executor)
            .await?;

        Ok(row)
    }

    pub async fn list_for_contract(
        &self,
        company_id: Uuid,
        contract_id: Uuid,
    ) -> Result<Vec<BillingNotification>, AppError> {
        let rows = sqlx::query_as::<_, BillingNotification>(
            r#"
            SELECT * FROM billing_notifications
            WHERE company_id = $1 AND contract_id = $2
            ORDER BY created_at DESC
            "#,
        )
            .bind(company_id)
            .bind(contract_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }
}
