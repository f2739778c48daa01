// src/db/billing_repo.rs

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::billing::{Billing, BillingStatus, NewBilling},
};

#[derive(Clone)]
pub struct BillingRepository {
    pool: PgPool,
}

impl BillingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// INSERT ... ON CONFLICT DO NOTHING: gerar duas vezes não é erro, só não
    /// devolve linha.
    pub async fn insert_if_absent<'e, E>(
        &self,
        executor: E,
        new: &NewBilling,
    ) -> Result<Option<Billing>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let billing = sqlx::query_as::<_, Billing>(
            r#"
            INSERT INTO billings (company_id, contract_id, billing_date, amount, status)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (contract_id, billing_date) DO NOTHING
            RETURNING *
            "#,
        )
            .bind(new.company_id)
            .bind(new.contract_id)
            .bind(new.billing_date)
            .bind(new.amount)
            .bind(new.status)
            .fetch_optional(executor)
            .await?;

        Ok(billing)
    }

    pub async fn find_by_contract_date<'e, E>(
        &self,
        executor: E,
        contract_id: Uuid,
        billing_date: NaiveDate,
    ) -> Result<Option<Billing>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let billing = sqlx::query_as::<_, Billing>(
            "SELECT * FROM billings WHERE contract_id = $1 AND billing_date = $2",
        )
            .bind(contract_id)
            .bind(billing_date)
            .fetch_optional(executor)
            .await?;

        Ok(billing)
    }

    pub async fn find_by_id<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        billing_id: Uuid,
    ) -> Result<Option<Billing>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let billing = sqlx::query_as::<_, Billing>(
            "SELECT * FROM billings WHERE company_id = $1 AND id = $2",
        )
            .bind(company_id)
            .bind(billing_id)
            .fetch_optional(executor)
            .await?;

        Ok(billing)
    }

    // COALESCE: quem marcou primeiro define data e txid.
    pub async fn mark_paid<'e, E>(
        &self,
        executor: E,
        billing_id: Uuid,
        txid: Option<&str>,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<Billing>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let billing = sqlx::query_as::<_, Billing>(
            r#"
            UPDATE billings
            SET status = 'paid',
                gateway_paid_at = COALESCE(gateway_paid_at, $2),
                gateway_txid = COALESCE(gateway_txid, $3),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
            .bind(billing_id)
            .bind(paid_at)
            .bind(txid)
            .fetch_optional(executor)
            .await?;

        Ok(billing)
    }

    pub async fn set_status<'e, E>(
        &self,
        executor: E,
        billing_id: Uuid,
        status: BillingStatus,
    ) -> Result<Option<Billing>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let billing = sqlx::query_as::<_, Billing>(
            r#"
            UPDATE billings
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
            .bind(billing_id)
            .bind(status)
            .fetch_optional(executor)
            .await?;

        Ok(billing)
    }

    /// Replica o status manual do mês para todas as cobranças daquele mês.
    pub async fn set_status_for_month<'e, E>(
        &self,
        executor: E,
        contract_id: Uuid,
        year: i32,
        month: u32,
        status: BillingStatus,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE billings
            SET status = $4, updated_at = NOW()
            WHERE contract_id = $1
              AND EXTRACT(YEAR FROM billing_date)::int = $2
              AND EXTRACT(MONTH FROM billing_date)::int = $3
            "#,
        )
            .bind(contract_id)
            .bind(year)
            .bind(month as i32)
            .bind(status)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn list_for_month(
        &self,
        company_id: Uuid,
        year: i32,
        month: u32,
    ) -> Result<Vec<Billing>, AppError> {
        let billings = sqlx::query_as::<_, Billing>(
            r#"
            SELECT * FROM billings
            WHERE company_id = $1
              AND EXTRACT(YEAR FROM billing_date)::int = $2
              AND EXTRACT(MONTH FROM billing_date)::int = $3
            ORDER BY billing_date ASC, contract_id
            "#,
        )
            .bind(company_id)
            .bind(year)
            .bind(month as i32)
            .fetch_all(&self.pool)
            .await?;

        Ok(billings)
    }
}
