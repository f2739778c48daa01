// src/db/contract_repo.rs

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Executor, FromRow, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::contract::{BillableContract, BillingMode, Client, Contract, CustomBillingDate},
};

// Colunas do contrato + cliente + empresa numa linha só (JOIN)
const BILLABLE_SELECT: &str = r#"
    SELECT
        ct.id, ct.company_id, ct.client_id, ct.description, ct.value,
        ct.start_date, ct.end_date, ct.cancellation_date, ct.active,
        ct.billing_mode, ct.billing_day, ct.billing_interval_months,
        ct.billing_interval_days, ct.last_billed_date,
        cl.name AS client_name,
        cl.responsible_name AS client_responsible_name,
        cl.phone AS client_phone,
        cl.email AS client_email,
        cl.cpf AS client_cpf,
        cl.cnpj AS client_cnpj,
        cl.active AS client_active,
        co.name AS company_name,
        co.pix_key AS company_pix_key
    FROM contracts ct
    JOIN clients cl ON cl.id = ct.client_id
    JOIN companies co ON co.id = ct.company_id
"#;

#[derive(Debug, FromRow)]
struct BillableRow {
    id: Uuid,
    company_id: Uuid,
    client_id: Uuid,
    description: String,
    value: Decimal,
    start_date: NaiveDate,
    end_date: NaiveDate,
    cancellation_date: Option<NaiveDate>,
    active: bool,
    billing_mode: BillingMode,
    billing_day: Option<i32>,
    billing_interval_months: Option<i32>,
    billing_interval_days: Option<i32>,
    last_billed_date: Option<NaiveDate>,
    client_name: String,
    client_responsible_name: Option<String>,
    client_phone: Option<String>,
    client_email: Option<String>,
    client_cpf: Option<String>,
    client_cnpj: Option<String>,
    client_active: bool,
    company_name: String,
    company_pix_key: Option<String>,
}

impl BillableRow {
    fn into_billable(self, custom_dates: Vec<CustomBillingDate>) -> BillableContract {
        BillableContract {
            contract: Contract {
                id: self.id,
                company_id: self.company_id,
                client_id: self.client_id,
                description: self.description,
                value: self.value,
                start_date: self.start_date,
                end_date: self.end_date,
                cancellation_date: self.cancellation_date,
                active: self.active,
                billing_mode: self.billing_mode,
                billing_day: self.billing_day,
                billing_interval_months: self.billing_interval_months,
                billing_interval_days: self.billing_interval_days,
                last_billed_date: self.last_billed_date,
            },
            client: Client {
                id: self.client_id,
                company_id: self.company_id,
                name: self.client_name,
                responsible_name: self.client_responsible_name,
                phone: self.client_phone,
                email: self.client_email,
                cpf: self.client_cpf,
                cnpj: self.client_cnpj,
                active: self.client_active,
            },
            company_name: self.company_name,
            company_pix_key: self.company_pix_key,
            custom_dates,
        }
    }
}

#[derive(Clone)]
pub struct ContractRepository {
    pool: PgPool,
}

impl ContractRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Contratos ativos; a vigência por data é decidida no motor.
    pub async fn list_active(
        &self,
        company_id: Option<Uuid>,
    ) -> Result<Vec<BillableContract>, AppError> {
        let sql = format!(
            "{} WHERE ct.active = TRUE AND ($1::uuid IS NULL OR ct.company_id = $1) ORDER BY ct.company_id, ct.id",
            BILLABLE_SELECT
        );

        let rows = sqlx::query_as::<_, BillableRow>(&sql)
            .bind(company_id)
            .fetch_all(&self.pool)
            .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut schedule: HashMap<Uuid, Vec<CustomBillingDate>> = HashMap::new();
        for date in self.custom_dates_for(&self.pool, &ids).await? {
            schedule.entry(date.contract_id).or_default().push(date);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let dates = schedule.remove(&row.id).unwrap_or_default();
                row.into_billable(dates)
            })
            .collect())
    }

    pub async fn find_billable(
        &self,
        company_id: Uuid,
        contract_id: Uuid,
    ) -> Result<Option<BillableContract>, AppError> {
        let sql = format!("{} WHERE ct.company_id = $1 AND ct.id = $2", BILLABLE_SELECT);

        let row = sqlx::query_as::<_, BillableRow>(&sql)
            .bind(company_id)
            .bind(contract_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let dates = self.custom_dates_for(&self.pool, &[row.id]).await?;
                Ok(Some(row.into_billable(dates)))
            }
            None => Ok(None),
        }
    }

    pub async fn custom_dates_for<'e, E>(
        &self,
        executor: E,
        contract_ids: &[Uuid],
    ) -> Result<Vec<CustomBillingDate>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        if contract_ids.is_empty() {
            return Ok(vec![]);
        }

        let dates = sqlx::query_as::<_, CustomBillingDate>(
            r#"
            SELECT contract_id, due_date, amount, percentage
            FROM contract_custom_dates
            WHERE contract_id = ANY($1)
            ORDER BY contract_id, due_date
            "#,
        )
            .bind(contract_ids)
            .fetch_all(executor)
            .await?;

        Ok(dates)
    }

    // Só contabilidade: a unicidade de `billings` é quem impede duplicata.
    pub async fn touch_last_billed<'e, E>(
        &self,
        executor: E,
        contract_id: Uuid,
        billed_on: NaiveDate,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE contracts
            SET last_billed_date = GREATEST(COALESCE(last_billed_date, $2), $2)
            WHERE id = $1
            "#,
        )
            .bind(contract_id)
            .bind(billed_on)
            .execute(executor)
            .await?;

        Ok(())
    }
}
