// src/services/scheduler.rs

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, FixedOffset, NaiveTime, TimeDelta, Utc};
use tokio::task::JoinHandle;

use crate::{
    common::date_only,
    config::BillingConfig,
    services::{
        billing_pipeline::{BillingPipeline, DailyRunOptions},
        reconcile_service::ReconcileService,
    },
};

/// Sobe as duas rotinas de fundo: a execução diária no horário configurado e
/// a reconciliação do gateway em intervalo fixo.
pub fn spawn(
    config: &BillingConfig,
    pipeline: Arc<BillingPipeline>,
    reconcile: Arc<ReconcileService>,
) -> Vec<JoinHandle<()>> {
    let daily = {
        let (hour, offset) = (config.daily_run_hour, config.timezone_offset_hours);
        tokio::spawn(async move {
            loop {
                let wait = duration_until_next_run(Utc::now(), hour, offset);
                tracing::info!(seconds = wait.as_secs(), "Próxima execução diária agendada");
                tokio::time::sleep(wait).await;

                let as_of = date_only::today_at(Utc::now(), offset);
                if let Err(e) = pipeline.run_daily(as_of, DailyRunOptions::default()).await {
                    tracing::error!(as_of = %as_of, error = %e, "Execução diária falhou");
                }
            }
        })
    };

    let reconciler = {
        let (every, limit) = (config.reconcile_interval, config.reconcile_batch_limit);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if let Err(e) = reconcile.run(limit).await {
                    tracing::error!(error = %e, "Reconciliação do gateway falhou");
                }
            }
        })
    };

    vec![daily, reconciler]
}

/// Tempo até a próxima ocorrência de `hour`:00 no fuso `offset_hours`.
pub fn duration_until_next_run(now: DateTime<Utc>, hour: u32, offset_hours: i32) -> Duration {
    let Some(offset) = FixedOffset::east_opt(offset_hours * 3600) else {
        return Duration::from_secs(24 * 3600);
    };
    let Some(run_time) = NaiveTime::from_hms_opt(hour.min(23), 0, 0) else {
        return Duration::from_secs(24 * 3600);
    };

    let local_now = now.with_timezone(&offset);
    let mut next = local_now.date_naive().and_time(run_time);
    if next <= local_now.naive_local() {
        next += TimeDelta::days(1);
    }

    (next - local_now.naive_local())
        .to_std()
        .unwrap_or(Duration::from_secs(60))
}
