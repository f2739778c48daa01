// src/config.rs

use std::{env, str::FromStr, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{BillingStore, PgBillingStore},
    services::{
        gateway::{HttpPixApi, PaymentGateway, PixGateway},
        locks::{ContractLock, InProcessContractLock, PgAdvisoryContractLock},
        messenger::{Messenger, WhatsAppMessenger},
        BillingPipeline, MonthStatusService, NotificationService, ReconcileService, ReminderService,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockBackend {
    Memory,
    Postgres,
}

impl FromStr for LockBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(LockBackend::Memory),
            "postgres" => Ok(LockBackend::Postgres),
            other => anyhow::bail!("CONTRACT_LOCK_BACKEND inválido: {other} (use memory ou postgres)"),
        }
    }
}

/// Parâmetros do motor de cobrança, todos com padrão.
#[derive(Debug, Clone)]
pub struct BillingConfig {
    /// Dias antes do vencimento para o lembrete `pre`.
    pub pre_reminder_days: i64,
    /// Dias depois do vencimento para o lembrete `late`.
    pub late_reminder_days: i64,
    pub daily_run_hour: u32,
    pub timezone_offset_hours: i32,
    pub reconcile_interval: Duration,
    pub reconcile_batch_limit: i64,
    pub http_timeout: Duration,
    pub pix_expiration_secs: i64,
    pub scheduler_enabled: bool,
    pub lock_backend: LockBackend,
    pub bind_addr: String,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            pre_reminder_days: 3,
            late_reminder_days: 4,
            daily_run_hour: 8,
            timezone_offset_hours: -3,
            reconcile_interval: Duration::from_secs(60),
            reconcile_batch_limit: 50,
            http_timeout: Duration::from_secs(15),
            pix_expiration_secs: 86_400,
            scheduler_enabled: true,
            lock_backend: LockBackend::Memory,
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl BillingConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let config = Self {
            pre_reminder_days: env_or("PRE_REMINDER_DAYS", defaults.pre_reminder_days)?,
            late_reminder_days: env_or("LATE_REMINDER_DAYS", defaults.late_reminder_days)?,
            daily_run_hour: env_or("DAILY_RUN_HOUR", defaults.daily_run_hour)?,
            timezone_offset_hours: env_or("TIMEZONE_OFFSET_HOURS", defaults.timezone_offset_hours)?,
            reconcile_interval: Duration::from_secs(env_or("RECONCILE_INTERVAL_SECS", 60u64)?),
            reconcile_batch_limit: env_or("RECONCILE_BATCH_LIMIT", defaults.reconcile_batch_limit)?,
            http_timeout: Duration::from_secs(env_or("HTTP_TIMEOUT_SECS", 15u64)?),
            pix_expiration_secs: env_or("PIX_EXPIRATION_SECS", defaults.pix_expiration_secs)?,
            scheduler_enabled: env_or("SCHEDULER_ENABLED", defaults.scheduler_enabled)?,
            lock_backend: env_or("CONTRACT_LOCK_BACKEND", defaults.lock_backend)?,
            bind_addr: env_or("BIND_ADDR", defaults.bind_addr)?,
        };

        anyhow::ensure!(config.daily_run_hour < 24, "DAILY_RUN_HOUR deve estar entre 0 e 23");
        anyhow::ensure!(config.pre_reminder_days >= 0, "PRE_REMINDER_DAYS não pode ser negativo");
        anyhow::ensure!(config.late_reminder_days >= 0, "LATE_REMINDER_DAYS não pode ser negativo");
        anyhow::ensure!(config.reconcile_batch_limit > 0, "RECONCILE_BATCH_LIMIT deve ser positivo");

        Ok(config)
    }
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key} inválido ({raw}): {e}")),
        _ => Ok(default),
    }
}

/// Colaboradores externos do motor. Em produção vêm de `AppState::new`; nos
/// testes, versões em memória.
pub struct Collaborators {
    pub store: Arc<dyn BillingStore>,
    pub messenger: Arc<dyn Messenger>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub locks: Arc<dyn ContractLock>,
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub jwt_secret: String,
    pub config: Arc<BillingConfig>,
    pub store: Arc<dyn BillingStore>,
    pub pipeline: Arc<BillingPipeline>,
    pub reconcile_service: Arc<ReconcileService>,
    pub notification_service: Arc<NotificationService>,
    pub month_status_service: Arc<MonthStatusService>,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL deve ser definida")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET deve ser definido")?;
        let config = BillingConfig::from_env()?;

        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let store: Arc<dyn BillingStore> = Arc::new(PgBillingStore::new(db_pool.clone()));
        let messenger: Arc<dyn Messenger> = Arc::new(WhatsAppMessenger::new(store.clone(), config.http_timeout)?);
        let pix_api = Arc::new(HttpPixApi::new(config.http_timeout)?);
        let gateway: Arc<dyn PaymentGateway> =
            Arc::new(PixGateway::new(store.clone(), pix_api, config.pix_expiration_secs));
        let locks: Arc<dyn ContractLock> = match config.lock_backend {
            LockBackend::Memory => Arc::new(InProcessContractLock::new()),
            LockBackend::Postgres => Arc::new(PgAdvisoryContractLock::new(db_pool.clone())),
        };

        tracing::info!(lock_backend = ?config.lock_backend, "Serviços de cobrança configurados");

        Ok(Self::with_collaborators(
            db_pool,
            jwt_secret,
            config,
            Collaborators { store, messenger, gateway, locks },
        ))
    }

    pub fn with_collaborators(
        db_pool: PgPool,
        jwt_secret: String,
        config: BillingConfig,
        collaborators: Collaborators,
    ) -> Self {
        let Collaborators { store, messenger, gateway, locks } = collaborators;

        let reminders = Arc::new(ReminderService::new(store.clone(), messenger, gateway.clone()));
        let pipeline = Arc::new(BillingPipeline::new(
            store.clone(),
            reminders.clone(),
            config.pre_reminder_days,
            config.late_reminder_days,
        ));
        let reconcile_service = Arc::new(ReconcileService::new(store.clone(), gateway, reminders.clone()));
        let notification_service = Arc::new(NotificationService::new(store.clone(), reminders.clone(), locks));
        let month_status_service = Arc::new(MonthStatusService::new(store.clone(), reminders));

        Self {
            db_pool,
            jwt_secret,
            config: Arc::new(config),
            store,
            pipeline,
            reconcile_service,
            notification_service,
            month_status_service,
        }
    }
}
