// tests/common/mod.rs
#![allow(dead_code)]

use std::{
    collections::HashMap,
    str::FromStr,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::Notify;
use uuid::Uuid;

use billing_backend::{
    common::error::AppError,
    config::{AppState, BillingConfig, Collaborators},
    db::BillingStore,
    models::{
        billing::{Billing, BillingStatus, ContractMonthStatus, NewBilling},
        company::{GatewaySettings, WhatsAppSettings},
        contract::{BillableContract, BillingMode, Client, Contract, CustomBillingDate},
        gateway::{ChargeStatus, GatewayLink, GatewayLinkStatus, NewGatewayLink},
        notification::{BillingNotification, DeliveryStatus, NewNotification, NotificationKind},
    },
    services::{
        gateway::{PaymentGateway, PixApi, PixCharge, PixChargeRequest, PixGateway},
        locks::{ContractLock, InProcessContractLock},
        messenger::{Messenger, SendOutcome},
    },
};

pub const JWT_SECRET: &str = "segredo-de-teste";

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

// =============================================================================
//  STORE EM MEMÓRIA
// =============================================================================

#[derive(Default)]
struct Tables {
    contracts: Vec<BillableContract>,
    whatsapp: HashMap<Uuid, WhatsAppSettings>,
    gateway: HashMap<Uuid, GatewaySettings>,
    billings: Vec<Billing>,
    months: Vec<ContractMonthStatus>,
    notifications: Vec<BillingNotification>,
    links: Vec<GatewayLink>,
}

/// Mesmas garantias de unicidade e COALESCE do Postgres, num `Mutex`.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    fail_next_mark_paid: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_contract(&self, billable: BillableContract) {
        self.tables.lock().unwrap().contracts.push(billable);
    }

    pub fn add_whatsapp(&self, company_id: Uuid) {
        self.tables.lock().unwrap().whatsapp.insert(
            company_id,
            WhatsAppSettings {
                company_id,
                api_url: "http://whatsapp.test".into(),
                instance: "principal".into(),
                token: "token".into(),
            },
        );
    }

    pub fn add_gateway(&self, company_id: Uuid) {
        self.tables.lock().unwrap().gateway.insert(
            company_id,
            GatewaySettings {
                company_id,
                base_url: "http://psp.test".into(),
                client_id: "cliente".into(),
                client_secret: "segredo".into(),
                pix_key: "financeiro@empresa.com.br".into(),
            },
        );
    }

    /// A próxima chamada a `mark_billing_paid` falha, como uma queda do banco.
    pub fn fail_next_mark_paid(&self) {
        self.fail_next_mark_paid.store(true, Ordering::SeqCst);
    }

    pub fn billings(&self) -> Vec<Billing> {
        self.tables.lock().unwrap().billings.clone()
    }

    pub fn billings_for(&self, contract_id: Uuid) -> Vec<Billing> {
        self.billings().into_iter().filter(|b| b.contract_id == contract_id).collect()
    }

    pub fn notifications(&self) -> Vec<BillingNotification> {
        self.tables.lock().unwrap().notifications.clone()
    }

    pub fn sent_notifications(&self, contract_id: Uuid) -> Vec<BillingNotification> {
        self.notifications()
            .into_iter()
            .filter(|n| n.contract_id == contract_id && n.status == DeliveryStatus::Sent)
            .collect()
    }

    pub fn links(&self) -> Vec<GatewayLink> {
        self.tables.lock().unwrap().links.clone()
    }

    pub fn month(&self, contract_id: Uuid, year: i32, month: u32) -> Option<ContractMonthStatus> {
        self.tables
            .lock()
            .unwrap()
            .months
            .iter()
            .find(|m| m.contract_id == contract_id && m.year == year && m.month == month as i32)
            .cloned()
    }

    /// Link já existente, como se outra execução o tivesse emitido.
    pub fn seed_link(&self, company_id: Uuid, contract_id: Uuid, due_date: NaiveDate, amount: Decimal, txid: &str) -> GatewayLink {
        let now = Utc::now();
        let link = GatewayLink {
            id: Uuid::new_v4(),
            company_id,
            contract_id,
            billing_id: None,
            due_date,
            amount,
            txid: Some(txid.to_string()),
            copy_paste: Some(format!("00020126BR.GOV.BCB.PIX{txid}")),
            qr_image: None,
            expires_at: Some(now + chrono::Duration::days(1)),
            status: GatewayLinkStatus::Generated,
            paid_at: None,
            payload: Some(json!({ "charge": { "txid": txid } })),
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().unwrap().links.push(link.clone());
        link
    }
}

fn same_key(n: &BillingNotification, new: &NewNotification) -> bool {
    if n.status != DeliveryStatus::Sent || n.forced || new.status != DeliveryStatus::Sent || new.forced {
        return false;
    }
    match new.kind {
        NotificationKind::Pre | NotificationKind::Due | NotificationKind::Late => {
            n.kind == new.kind && n.contract_id == new.contract_id && n.due_date == new.due_date
        }
        NotificationKind::Paid => {
            n.kind == NotificationKind::Paid && new.billing_id.is_some() && n.billing_id == new.billing_id
        }
        NotificationKind::Manual => false,
    }
}

#[async_trait]
impl BillingStore for InMemoryStore {
    async fn list_billable_contracts(&self, company_id: Option<Uuid>) -> Result<Vec<BillableContract>, AppError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .contracts
            .iter()
            .filter(|b| b.contract.active && company_id.is_none_or(|id| b.contract.company_id == id))
            .cloned()
            .collect())
    }

    async fn find_billable_contract(&self, company_id: Uuid, contract_id: Uuid) -> Result<Option<BillableContract>, AppError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .contracts
            .iter()
            .find(|b| b.contract.company_id == company_id && b.contract.id == contract_id)
            .cloned())
    }

    async fn touch_last_billed(&self, contract_id: Uuid, billed_on: NaiveDate) -> Result<(), AppError> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(b) = tables.contracts.iter_mut().find(|b| b.contract.id == contract_id) {
            b.contract.last_billed_date = Some(billed_on);
        }
        Ok(())
    }

    async fn whatsapp_settings(&self, company_id: Uuid) -> Result<Option<WhatsAppSettings>, AppError> {
        Ok(self.tables.lock().unwrap().whatsapp.get(&company_id).cloned())
    }

    async fn gateway_settings(&self, company_id: Uuid) -> Result<Option<GatewaySettings>, AppError> {
        Ok(self.tables.lock().unwrap().gateway.get(&company_id).cloned())
    }

    async fn insert_billing_if_absent(&self, new: &NewBilling) -> Result<Option<Billing>, AppError> {
        let mut tables = self.tables.lock().unwrap();
        if tables
            .billings
            .iter()
            .any(|b| b.contract_id == new.contract_id && b.billing_date == new.billing_date)
        {
            return Ok(None);
        }
        let now = Utc::now();
        let billing = Billing {
            id: Uuid::new_v4(),
            company_id: new.company_id,
            contract_id: new.contract_id,
            billing_date: new.billing_date,
            amount: new.amount,
            status: new.status,
            gateway_txid: None,
            gateway_paid_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.billings.push(billing.clone());
        Ok(Some(billing))
    }

    async fn find_billing(&self, contract_id: Uuid, billing_date: NaiveDate) -> Result<Option<Billing>, AppError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .billings
            .iter()
            .find(|b| b.contract_id == contract_id && b.billing_date == billing_date)
            .cloned())
    }

    async fn find_billing_by_id(&self, company_id: Uuid, billing_id: Uuid) -> Result<Option<Billing>, AppError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .billings
            .iter()
            .find(|b| b.company_id == company_id && b.id == billing_id)
            .cloned())
    }

    async fn mark_billing_paid(&self, billing_id: Uuid, txid: Option<&str>, paid_at: DateTime<Utc>) -> Result<Option<Billing>, AppError> {
        if self.fail_next_mark_paid.swap(false, Ordering::SeqCst) {
            return Err(AppError::DatabaseError(sqlx::Error::PoolTimedOut));
        }
        let mut tables = self.tables.lock().unwrap();
        let Some(billing) = tables.billings.iter_mut().find(|b| b.id == billing_id) else {
            return Ok(None);
        };
        billing.status = BillingStatus::Paid;
        billing.gateway_paid_at = billing.gateway_paid_at.or(Some(paid_at));
        billing.gateway_txid = billing.gateway_txid.clone().or(txid.map(str::to_string));
        billing.updated_at = Utc::now();
        Ok(Some(billing.clone()))
    }

    async fn set_billing_status(&self, billing_id: Uuid, status: BillingStatus) -> Result<Option<Billing>, AppError> {
        let mut tables = self.tables.lock().unwrap();
        let Some(billing) = tables.billings.iter_mut().find(|b| b.id == billing_id) else {
            return Ok(None);
        };
        billing.status = status;
        billing.updated_at = Utc::now();
        Ok(Some(billing.clone()))
    }

    async fn list_billings(&self, company_id: Uuid, year: i32, month: u32) -> Result<Vec<Billing>, AppError> {
        let mut rows: Vec<Billing> = self
            .tables
            .lock()
            .unwrap()
            .billings
            .iter()
            .filter(|b| b.company_id == company_id && b.billing_date.year() == year && b.billing_date.month() == month)
            .cloned()
            .collect();
        rows.sort_by_key(|b| b.billing_date);
        Ok(rows)
    }

    async fn month_status(&self, contract_id: Uuid, year: i32, month: u32) -> Result<Option<ContractMonthStatus>, AppError> {
        Ok(self.month(contract_id, year, month))
    }

    async fn set_month_paid(&self, contract_id: Uuid, company_id: Uuid, year: i32, month: u32) -> Result<ContractMonthStatus, AppError> {
        Ok(upsert_month(&mut self.tables.lock().unwrap(), contract_id, company_id, year, month, BillingStatus::Paid))
    }

    async fn ensure_month_pending(&self, contract_id: Uuid, company_id: Uuid, year: i32, month: u32) -> Result<ContractMonthStatus, AppError> {
        if let Some(existing) = self.month(contract_id, year, month) {
            return Ok(existing);
        }
        Ok(upsert_month(&mut self.tables.lock().unwrap(), contract_id, company_id, year, month, BillingStatus::Pending))
    }

    async fn set_month_status(
        &self,
        contract_id: Uuid,
        company_id: Uuid,
        year: i32,
        month: u32,
        status: BillingStatus,
    ) -> Result<ContractMonthStatus, AppError> {
        let mut tables = self.tables.lock().unwrap();
        let row = upsert_month(&mut tables, contract_id, company_id, year, month, status);
        if status.is_terminal() {
            for billing in tables.billings.iter_mut().filter(|b| {
                b.contract_id == contract_id && b.billing_date.year() == year && b.billing_date.month() == month
            }) {
                billing.status = status;
                billing.updated_at = Utc::now();
            }
        }
        Ok(row)
    }

    async fn list_month_statuses(&self, contract_id: Uuid, year: i32) -> Result<Vec<ContractMonthStatus>, AppError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .months
            .iter()
            .filter(|m| m.contract_id == contract_id && m.year == year)
            .cloned()
            .collect())
    }

    async fn has_sent_notification(&self, contract_id: Uuid, due_date: NaiveDate, kind: NotificationKind) -> Result<bool, AppError> {
        Ok(self.tables.lock().unwrap().notifications.iter().any(|n| {
            n.contract_id == contract_id
                && n.due_date == due_date
                && n.kind == kind
                && n.status == DeliveryStatus::Sent
                && !n.forced
        }))
    }

    async fn has_paid_notification(&self, billing_id: Uuid) -> Result<bool, AppError> {
        Ok(self.tables.lock().unwrap().notifications.iter().any(|n| {
            n.billing_id == Some(billing_id) && n.kind == NotificationKind::Paid && n.status == DeliveryStatus::Sent
        }))
    }

    async fn insert_notification(&self, new: &NewNotification) -> Result<Option<BillingNotification>, AppError> {
        let mut tables = self.tables.lock().unwrap();
        if tables.notifications.iter().any(|n| same_key(n, new)) {
            return Ok(None);
        }
        let row = BillingNotification {
            id: Uuid::new_v4(),
            company_id: new.company_id,
            billing_id: new.billing_id,
            contract_id: new.contract_id,
            client_id: new.client_id,
            kind: new.kind,
            due_date: new.due_date,
            status: new.status,
            forced: new.forced,
            message: new.message.clone(),
            provider_response: new.provider_response.clone(),
            created_at: Utc::now(),
        };
        tables.notifications.push(row.clone());
        Ok(Some(row))
    }

    async fn list_notifications(&self, company_id: Uuid, contract_id: Uuid) -> Result<Vec<BillingNotification>, AppError> {
        let mut rows: Vec<BillingNotification> = self
            .tables
            .lock()
            .unwrap()
            .notifications
            .iter()
            .filter(|n| n.company_id == company_id && n.contract_id == contract_id)
            .cloned()
            .collect();
        rows.reverse();
        Ok(rows)
    }

    async fn find_gateway_link(&self, company_id: Uuid, contract_id: Uuid, due_date: NaiveDate) -> Result<Option<GatewayLink>, AppError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .links
            .iter()
            .find(|l| l.company_id == company_id && l.contract_id == contract_id && l.due_date == due_date)
            .cloned())
    }

    async fn save_gateway_link(&self, new: &NewGatewayLink) -> Result<GatewayLink, AppError> {
        let mut tables = self.tables.lock().unwrap();
        let now = Utc::now();

        if let Some(link) = tables.links.iter_mut().find(|l| {
            l.company_id == new.company_id && l.contract_id == new.contract_id && l.due_date == new.due_date
        }) {
            if link.status != GatewayLinkStatus::Paid {
                link.billing_id = new.billing_id.or(link.billing_id);
                link.amount = new.amount;
                link.txid = Some(new.txid.clone());
                link.copy_paste = Some(new.copy_paste.clone());
                link.qr_image = new.qr_image.clone();
                link.expires_at = Some(new.expires_at);
                link.status = GatewayLinkStatus::Generated;
                link.payload = Some(new.payload.clone());
                link.updated_at = now;
            }
            return Ok(link.clone());
        }

        let link = GatewayLink {
            id: Uuid::new_v4(),
            company_id: new.company_id,
            contract_id: new.contract_id,
            billing_id: new.billing_id,
            due_date: new.due_date,
            amount: new.amount,
            txid: Some(new.txid.clone()),
            copy_paste: Some(new.copy_paste.clone()),
            qr_image: new.qr_image.clone(),
            expires_at: Some(new.expires_at),
            status: GatewayLinkStatus::Generated,
            paid_at: None,
            payload: Some(new.payload.clone()),
            created_at: now,
            updated_at: now,
        };
        tables.links.push(link.clone());
        Ok(link)
    }

    async fn attach_billing_to_link(&self, company_id: Uuid, contract_id: Uuid, due_date: NaiveDate, billing_id: Uuid) -> Result<(), AppError> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(link) = tables.links.iter_mut().find(|l| {
            l.company_id == company_id && l.contract_id == contract_id && l.due_date == due_date && l.billing_id.is_none()
        }) {
            link.billing_id = Some(billing_id);
            link.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn list_pending_gateway_links(&self, limit: i64) -> Result<Vec<GatewayLink>, AppError> {
        let mut rows: Vec<GatewayLink> = self
            .tables
            .lock()
            .unwrap()
            .links
            .iter()
            .filter(|l| l.status != GatewayLinkStatus::Paid && l.txid.is_some() && l.paid_at.is_none())
            .cloned()
            .collect();
        rows.sort_by_key(|l| l.updated_at);
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn mark_gateway_link_processing(&self, link_id: Uuid) -> Result<(), AppError> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(link) = tables.links.iter_mut().find(|l| l.id == link_id && l.status != GatewayLinkStatus::Paid) {
            link.status = GatewayLinkStatus::Processing;
            link.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_gateway_link_paid(&self, link_id: Uuid, paid_at: DateTime<Utc>, detail: &Value) -> Result<(), AppError> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(link) = tables.links.iter_mut().find(|l| l.id == link_id) {
            link.status = GatewayLinkStatus::Paid;
            link.paid_at = link.paid_at.or(Some(paid_at));
            let mut payload = link.payload.take().unwrap_or_else(|| json!({}));
            payload["gateway_detail"] = detail.clone();
            link.payload = Some(payload);
            link.updated_at = Utc::now();
        }
        Ok(())
    }
}

fn upsert_month(
    tables: &mut Tables,
    contract_id: Uuid,
    company_id: Uuid,
    year: i32,
    month: u32,
    status: BillingStatus,
) -> ContractMonthStatus {
    let now = Utc::now();
    if let Some(row) = tables
        .months
        .iter_mut()
        .find(|m| m.contract_id == contract_id && m.year == year && m.month == month as i32)
    {
        row.status = status;
        row.updated_at = now;
        return row.clone();
    }
    let row = ContractMonthStatus {
        contract_id,
        company_id,
        year,
        month: month as i32,
        status,
        updated_at: now,
    };
    tables.months.push(row.clone());
    row
}

// =============================================================================
//  WHATSAPP E PSP FALSOS
// =============================================================================

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub company_id: Uuid,
    pub phone: String,
    pub text: String,
}

#[derive(Default)]
pub struct FakeMessenger {
    sent: Mutex<Vec<SentMessage>>,
    failing: AtomicBool,
}

impl FakeMessenger {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Messenger for FakeMessenger {
    async fn send(&self, company_id: Uuid, phone: &str, text: &str) -> SendOutcome {
        if self.failing.load(Ordering::SeqCst) {
            return SendOutcome::failed(Some(503), "instância desconectada");
        }
        self.sent.lock().unwrap().push(SentMessage {
            company_id,
            phone: phone.to_string(),
            text: text.to_string(),
        });
        SendOutcome::delivered(201, json!({ "key": { "id": Uuid::new_v4().to_string() } }))
    }
}

/// PSP em memória: cobranças nascem `ATIVA`; `settle` simula o pagamento.
#[derive(Default)]
pub struct FakePixApi {
    charges: Mutex<HashMap<String, String>>,
    broken: Mutex<Vec<String>>,
    hold: Mutex<Option<Arc<Notify>>>,
    status_queries: AtomicUsize,
}

impl FakePixApi {
    pub fn settle(&self, txid: &str) {
        self.charges.lock().unwrap().insert(txid.to_string(), "CONCLUIDA".into());
    }

    /// Consulta deste txid passa a falhar.
    pub fn break_txid(&self, txid: &str) {
        self.broken.lock().unwrap().push(txid.to_string());
    }

    pub fn created(&self) -> usize {
        self.charges.lock().unwrap().len()
    }

    /// Consultas de status ficam presas até o `Notify` devolvido ser acionado.
    pub fn hold_status_queries(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.hold.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn status_queries(&self) -> usize {
        self.status_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PixApi for FakePixApi {
    async fn create_charge(&self, _settings: &GatewaySettings, charge: &PixChargeRequest) -> Result<PixCharge, AppError> {
        self.charges.lock().unwrap().insert(charge.txid.clone(), "ATIVA".into());
        Ok(PixCharge {
            txid: charge.txid.clone(),
            copy_paste: format!("00020126580014BR.GOV.BCB.PIX{}", charge.txid),
            raw: json!({ "txid": charge.txid, "status": "ATIVA", "valor": { "original": charge.amount.to_string() } }),
        })
    }

    async fn charge_status(&self, _settings: &GatewaySettings, txid: &str) -> Result<ChargeStatus, AppError> {
        self.status_queries.fetch_add(1, Ordering::SeqCst);
        let gate = self.hold.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.broken.lock().unwrap().iter().any(|t| t == txid) {
            return Err(AppError::GatewayError("PSP respondeu 500".into()));
        }
        let status = self
            .charges
            .lock()
            .unwrap()
            .get(txid)
            .cloned()
            .unwrap_or_else(|| "ATIVA".into());
        let paid_at = (status == "CONCLUIDA").then(Utc::now);
        Ok(ChargeStatus {
            raw: json!({ "txid": txid, "status": status }),
            status,
            paid_at,
        })
    }
}

// =============================================================================
//  FIXTURES
// =============================================================================

pub struct Company {
    pub id: Uuid,
}

pub fn monthly_contract(company_id: Uuid, billing_day: i32, value: &str) -> BillableContract {
    let contract_id = Uuid::new_v4();
    let client_id = Uuid::new_v4();
    BillableContract {
        contract: Contract {
            id: contract_id,
            company_id,
            client_id,
            description: "Mensalidade plano empresarial".into(),
            value: dec(value),
            start_date: d(2024, 1, 1),
            end_date: d(2024, 12, 31),
            cancellation_date: None,
            active: true,
            billing_mode: BillingMode::Monthly,
            billing_day: Some(billing_day),
            billing_interval_months: Some(1),
            billing_interval_days: None,
            last_billed_date: None,
        },
        client: Client {
            id: client_id,
            company_id,
            name: "Padaria Central LTDA".into(),
            responsible_name: Some("Maria Souza".into()),
            phone: Some("(11) 99999-8888".into()),
            email: None,
            cpf: None,
            cnpj: Some("12345678000190".into()),
            active: true,
        },
        company_name: "Contabilidade Exemplo".into(),
        company_pix_key: Some("financeiro@empresa.com.br".into()),
        custom_dates: Vec::new(),
    }
}

pub fn custom_dates_contract(company_id: Uuid, value: &str, dates: &[(NaiveDate, &str)]) -> BillableContract {
    let mut billable = monthly_contract(company_id, 1, value);
    billable.contract.billing_mode = BillingMode::CustomDates;
    billable.contract.billing_day = None;
    billable.contract.billing_interval_months = None;
    billable.custom_dates = dates
        .iter()
        .map(|(due_date, percentage)| CustomBillingDate {
            contract_id: billable.contract.id,
            due_date: *due_date,
            amount: None,
            percentage: Some(dec(percentage)),
        })
        .collect();
    billable
}

// =============================================================================
//  HARNESS
// =============================================================================

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub messenger: Arc<FakeMessenger>,
    pub pix: Arc<FakePixApi>,
    pub state: AppState,
    pub company: Company,
}

impl Harness {
    /// Precisa de runtime tokio (o pool lazy nunca conecta).
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let messenger = Arc::new(FakeMessenger::default());
        let pix = Arc::new(FakePixApi::default());

        let company = Company { id: Uuid::new_v4() };
        store.add_whatsapp(company.id);

        let config = BillingConfig {
            scheduler_enabled: false,
            ..BillingConfig::default()
        };
        let gateway: Arc<dyn PaymentGateway> = Arc::new(PixGateway::new(
            store.clone(),
            pix.clone(),
            config.pix_expiration_secs,
        ));
        let locks: Arc<dyn ContractLock> = Arc::new(InProcessContractLock::new());

        let db_pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/billing_test")
            .expect("URL de teste válida");

        let state = AppState::with_collaborators(
            db_pool,
            JWT_SECRET.to_string(),
            config,
            Collaborators {
                store: store.clone(),
                messenger: messenger.clone(),
                gateway,
                locks,
            },
        );

        Self { store, messenger, pix, state, company }
    }

    pub fn with_contract(&self, billable: BillableContract) -> Uuid {
        let id = billable.contract.id;
        self.store.add_contract(billable);
        id
    }
}
