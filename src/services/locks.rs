// src/services/locks.rs

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::common::error::AppError;

/// Exclusão mútua por contrato. A liberação acontece no `Drop` do guard,
/// então não existe caminho (erro, `?`, panic) que deixe o contrato travado.
#[async_trait]
pub trait ContractLock: Send + Sync {
    async fn acquire(&self, contract_id: Uuid) -> Result<ContractLockGuard, AppError>;
}

pub enum ContractLockGuard {
    InProcess(OwnedMutexGuard<()>),
    // O advisory lock é de transação: o rollback no drop solta o lock.
    Postgres(Transaction<'static, Postgres>),
}

impl std::fmt::Debug for ContractLockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContractLockGuard::InProcess(_) => f.write_str("ContractLockGuard::InProcess"),
            ContractLockGuard::Postgres(_) => f.write_str("ContractLockGuard::Postgres"),
        }
    }
}

/// Mapa de mutexes por contrato. Suficiente para uma instância só.
#[derive(Default)]
pub struct InProcessContractLock {
    slots: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl InProcessContractLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, contract_id: Uuid) -> Result<Arc<AsyncMutex<()>>, AppError> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| AppError::InternalServerError(anyhow::anyhow!("mapa de locks envenenado")))?;

        // Descarta slots que ninguém está usando
        slots.retain(|id, slot| *id == contract_id || Arc::strong_count(slot) > 1);

        Ok(slots.entry(contract_id).or_default().clone())
    }
}

#[async_trait]
impl ContractLock for InProcessContractLock {
    async fn acquire(&self, contract_id: Uuid) -> Result<ContractLockGuard, AppError> {
        let slot = self.slot(contract_id)?;
        Ok(ContractLockGuard::InProcess(slot.lock_owned().await))
    }
}

/// `pg_advisory_xact_lock` chaveado pelo id do contrato; funciona entre instâncias.
#[derive(Clone)]
pub struct PgAdvisoryContractLock {
    pool: PgPool,
}

impl PgAdvisoryContractLock {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContractLock for PgAdvisoryContractLock {
    async fn acquire(&self, contract_id: Uuid) -> Result<ContractLockGuard, AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(contract_id.to_string())
            .execute(&mut *tx)
            .await?;

        Ok(ContractLockGuard::Postgres(tx))
    }
}

/// Garante uma execução por vez de um job (ex.: reconciliação).
#[derive(Clone, Default)]
pub struct RunGuard {
    running: Arc<AtomicBool>,
}

/// Enquanto existir, o job está marcado como em execução.
#[derive(Debug)]
pub struct RunToken {
    running: Arc<AtomicBool>,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` se já existe uma execução em andamento.
    pub fn try_start(&self) -> Option<RunToken> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunToken { running: self.running.clone() })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for RunToken {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}
