// src/db/month_status_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::billing::{BillingStatus, ContractMonthStatus},
};

#[derive(Clone)]
pub struct MonthStatusRepository {
    pool: PgPool,
}

impl MonthStatusRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find(
        &self,
        contract_id: Uuid,
        year: i32,
        month: u32,
    ) -> Result<Option<ContractMonthStatus>, AppError> {
        let row = sqlx::query_as::<_, ContractMonthStatus>(
            r#"
            SELECT * FROM contract_month_status
            WHERE contract_id = $1 AND year = $2 AND month = $3
            "#,
        )
            .bind(contract_id)
            .bind(year)
            .bind(month as i32)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    pub async fn list_for_year(
        &self,
        contract_id: Uuid,
        year: i32,
    ) -> Result<Vec<ContractMonthStatus>, AppError> {
        let rows = sqlx::query_as::<_, ContractMonthStatus>(
            r#"
            SELECT * FROM contract_month_status
            WHERE contract_id = $1 AND year = $2
            ORDER BY month ASC
            "#,
        )
            .bind(contract_id)
            .bind(year)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// UPSERT incondicional. Serve tanto para "pago sempre vence" quanto para a
    /// sobrescrita manual.
    pub async fn upsert<'e, E>(
        &self,
        executor: E,
        contract_id: Uuid,
        company_id: Uuid,
        year: i32,
        month: u32,
        status: BillingStatus,
    ) -> Result<ContractMonthStatus, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, ContractMonthStatus>(
            r#"
            INSERT INTO contract_month_status (contract_id, company_id, year, month, status)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (contract_id, year, month)
            DO UPDATE SET
                status = EXCLUDED.status,
                updated_at = NOW()
            RETURNING *
            "#,
        )
            .bind(contract_id)
            .bind(company_id)
            .bind(year)
            .bind(month as i32)
            .bind(status)
            .fetch_one(executor)
            .await?;

        Ok(row)
    }

    /// Cria `pending` só se o mês ainda não existir. O `DO UPDATE` sem mudança
    /// existe para o RETURNING devolver a linha já gravada.
    pub async fn insert_pending_if_absent<'e, E>(
        &self,
        executor: E,
        contract_id: Uuid,
        company_id: Uuid,
        year: i32,
        month: u32,
    ) -> Result<ContractMonthStatus, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, ContractMonthStatus>(
            r#"
            INSERT INTO contract_month_status (contract_id, company_id, year, month, status)
            VALUES ($1, $2, $3, $4, 'pending')
            ON CONFLICT (contract_id, year, month)
            DO UPDATE SET status = contract_month_status.status
            RETURNING *
            "#,
        )
            .bind(contract_id)
            .bind(company_id)
            .bind(year)
            .bind(month as i32)
            .fetch_one(executor)
            .await?;

        Ok(row)
    }
}
