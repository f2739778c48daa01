// tests/daily_pipeline_test.rs

mod common;

use billing_backend::{
    models::{billing::BillingStatus, notification::{DeliveryStatus, NotificationKind}},
    services::billing_pipeline::DailyRunOptions,
};
use common::{custom_dates_contract, d, dec, monthly_contract, Harness};

fn generate_only() -> DailyRunOptions {
    DailyRunOptions { generate: true, pre: false, due: false, late: false, company_id: None }
}

#[tokio::test]
async fn day_31_contract_bills_on_last_day_of_short_months() {
    let h = Harness::new();
    let contract_id = h.with_contract(monthly_contract(h.company.id, 31, "250.00"));

    for day in [d(2024, 2, 28), d(2024, 2, 29), d(2024, 4, 30), d(2024, 5, 30), d(2024, 5, 31)] {
        h.state.pipeline.run_daily(day, generate_only()).await.unwrap();
    }

    let mut dates: Vec<_> = h.store.billings_for(contract_id).iter().map(|b| b.billing_date).collect();
    dates.sort();
    assert_eq!(dates, vec![d(2024, 2, 29), d(2024, 4, 30), d(2024, 5, 31)]);

    let february = h.store.billings_for(contract_id).into_iter().find(|b| b.billing_date == d(2024, 2, 29)).unwrap();
    assert_eq!(february.amount, dec("250.00"));
    assert_eq!(february.status, BillingStatus::Pending);
    assert_eq!(
        h.store.month(contract_id, 2024, 2).map(|m| m.status),
        Some(BillingStatus::Pending)
    );
}

#[tokio::test]
async fn generating_twice_keeps_a_single_instance() {
    let h = Harness::new();
    let contract_id = h.with_contract(monthly_contract(h.company.id, 10, "99.90"));

    let first = h.state.pipeline.run_daily(d(2024, 3, 10), generate_only()).await.unwrap();
    let second = h.state.pipeline.run_daily(d(2024, 3, 10), generate_only()).await.unwrap();
    h.state.pipeline.run_daily(d(2024, 3, 10), generate_only()).await.unwrap();

    assert_eq!(first.generate.as_ref().unwrap().created, 1);
    let second = second.generate.unwrap();
    assert_eq!(second.created, 0);
    assert_eq!(second.skipped, 1);
    assert_eq!(h.store.billings_for(contract_id).len(), 1);
}

#[tokio::test]
async fn pre_reminder_is_sent_once_per_due_date() {
    let h = Harness::new();
    let contract_id = h.with_contract(monthly_contract(h.company.id, 25, "250.00"));

    let summary = h.state.pipeline.run_daily(d(2024, 9, 22), DailyRunOptions::default()).await.unwrap();
    assert_eq!(summary.pre.as_ref().unwrap().sent, 1);

    let again = h.state.pipeline.run_daily(d(2024, 9, 22), DailyRunOptions::default()).await.unwrap();
    let pre = again.pre.unwrap();
    assert_eq!(pre.sent, 0);
    assert_eq!(pre.skipped, 1);

    let sent = h.store.sent_notifications(contract_id);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, NotificationKind::Pre);
    assert_eq!(sent[0].due_date, d(2024, 9, 25));

    let messages = h.messenger.sent();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].text.contains("vence em 25/09/2024"));
    assert!(messages[0].text.contains("Chave Pix para pagamento: financeiro@empresa.com.br"));

    // O lembrete antecipado não cria a cobrança
    assert!(h.store.billings_for(contract_id).is_empty());
}

#[tokio::test]
async fn repeated_full_runs_never_duplicate_sends() {
    let h = Harness::new();
    let contract_id = h.with_contract(monthly_contract(h.company.id, 25, "250.00"));

    for as_of in [d(2024, 9, 22), d(2024, 9, 25), d(2024, 9, 29)] {
        for _ in 0..3 {
            h.state.pipeline.run_daily(as_of, DailyRunOptions::default()).await.unwrap();
        }
    }

    let sent = h.store.sent_notifications(contract_id);
    let count = |kind: NotificationKind| sent.iter().filter(|n| n.kind == kind).count();
    assert_eq!(count(NotificationKind::Pre), 1);
    assert_eq!(count(NotificationKind::Due), 1);
    assert_eq!(count(NotificationKind::Late), 1);
    assert_eq!(h.messenger.sent().len(), 3);
    assert_eq!(h.store.billings_for(contract_id).len(), 1);
}

#[tokio::test]
async fn canceled_month_receives_no_reminders() {
    let h = Harness::new();
    let contract_id = h.with_contract(monthly_contract(h.company.id, 25, "250.00"));

    h.state
        .month_status_service
        .set_status(h.company.id, contract_id, 2024, 9, BillingStatus::Canceled)
        .await
        .unwrap();

    let mut day = d(2024, 9, 1);
    while day <= d(2024, 9, 30) {
        h.state.pipeline.run_daily(day, DailyRunOptions::default()).await.unwrap();
        day = day.succ_opt().unwrap();
    }

    assert!(h.store.sent_notifications(contract_id).is_empty());
    assert!(h.messenger.sent().is_empty());

    // A cobrança do mês nasce já com o status do livro
    let billings = h.store.billings_for(contract_id);
    assert_eq!(billings.len(), 1);
    assert_eq!(billings[0].status, BillingStatus::Canceled);
    assert_eq!(h.store.month(contract_id, 2024, 9).unwrap().status, BillingStatus::Canceled);
}

#[tokio::test]
async fn paid_billing_stops_late_reminder() {
    let h = Harness::new();
    let contract_id = h.with_contract(monthly_contract(h.company.id, 10, "180.00"));

    h.state.pipeline.run_daily(d(2024, 10, 10), DailyRunOptions::default()).await.unwrap();
    let billing = h.store.billings_for(contract_id).pop().unwrap();

    h.state
        .month_status_service
        .set_billing_status(h.company.id, billing.id, BillingStatus::Paid)
        .await
        .unwrap();

    let summary = h.state.pipeline.run_daily(d(2024, 10, 14), DailyRunOptions::default()).await.unwrap();
    assert_eq!(summary.late.unwrap().sent, 0);

    let kinds: Vec<_> = h.store.sent_notifications(contract_id).iter().map(|n| n.kind).collect();
    assert_eq!(kinds, vec![NotificationKind::Due, NotificationKind::Paid]);
    assert_eq!(h.store.month(contract_id, 2024, 10).unwrap().status, BillingStatus::Paid);
}

#[tokio::test]
async fn failed_send_is_logged_and_retried_next_run() {
    let h = Harness::new();
    let contract_id = h.with_contract(monthly_contract(h.company.id, 25, "250.00"));

    h.messenger.set_failing(true);
    let failed = h.state.pipeline.run_daily(d(2024, 9, 22), DailyRunOptions::default()).await.unwrap();
    assert_eq!(failed.pre.unwrap().failed, 1);

    h.messenger.set_failing(false);
    let retried = h.state.pipeline.run_daily(d(2024, 9, 22), DailyRunOptions::default()).await.unwrap();
    assert_eq!(retried.pre.unwrap().sent, 1);

    let statuses: Vec<_> = h
        .store
        .notifications()
        .iter()
        .filter(|n| n.contract_id == contract_id)
        .map(|n| n.status)
        .collect();
    assert_eq!(statuses, vec![DeliveryStatus::Failed, DeliveryStatus::Sent]);
}

#[tokio::test]
async fn broken_contract_does_not_stop_the_run() {
    let h = Harness::new();

    let mut broken = monthly_contract(h.company.id, 5, "100.00");
    broken.contract.billing_interval_months = Some(2);
    h.with_contract(broken);
    let healthy_id = h.with_contract(monthly_contract(h.company.id, 5, "100.00"));

    let summary = h.state.pipeline.run_daily(d(2024, 6, 5), DailyRunOptions::default()).await.unwrap();

    let generate = summary.generate.unwrap();
    assert_eq!(generate.errors, 1);
    assert_eq!(generate.created, 1);
    assert_eq!(summary.due.unwrap().sent, 1);
    assert_eq!(h.store.billings_for(healthy_id).len(), 1);
}

#[tokio::test]
async fn client_without_phone_is_skipped_without_log() {
    let h = Harness::new();
    let mut billable = monthly_contract(h.company.id, 25, "250.00");
    billable.client.phone = Some("   ".into());
    let contract_id = h.with_contract(billable);

    let summary = h.state.pipeline.run_daily(d(2024, 9, 22), DailyRunOptions::default()).await.unwrap();

    assert_eq!(summary.pre.unwrap().skipped, 1);
    assert!(h.store.notifications().iter().all(|n| n.contract_id != contract_id));
}

#[tokio::test]
async fn custom_dates_bill_their_share_of_the_contract() {
    let h = Harness::new();
    let contract_id = h.with_contract(custom_dates_contract(
        h.company.id,
        "1000.00",
        &[(d(2024, 3, 5), "30"), (d(2024, 4, 5), "70")],
    ));

    h.state.pipeline.run_daily(d(2024, 3, 5), generate_only()).await.unwrap();
    h.state.pipeline.run_daily(d(2024, 3, 6), generate_only()).await.unwrap();
    h.state.pipeline.run_daily(d(2024, 4, 5), generate_only()).await.unwrap();

    let mut billings = h.store.billings_for(contract_id);
    billings.sort_by_key(|b| b.billing_date);
    let amounts: Vec<_> = billings.iter().map(|b| (b.billing_date, b.amount)).collect();
    assert_eq!(amounts, vec![(d(2024, 3, 5), dec("300.00")), (d(2024, 4, 5), dec("700.00"))]);
}

#[tokio::test]
async fn company_scope_limits_the_run() {
    let h = Harness::new();
    let own = h.with_contract(monthly_contract(h.company.id, 15, "50.00"));
    let other_company = uuid::Uuid::new_v4();
    let foreign = h.with_contract(monthly_contract(other_company, 15, "50.00"));

    let options = DailyRunOptions { company_id: Some(h.company.id), ..generate_only() };
    let summary = h.state.pipeline.run_daily(d(2024, 7, 15), options).await.unwrap();

    assert_eq!(summary.contracts, 1);
    assert_eq!(h.store.billings_for(own).len(), 1);
    assert!(h.store.billings_for(foreign).is_empty());
}
