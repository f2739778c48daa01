// src/services/gateway.rs

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use image::Luma;
use qrcode::QrCode;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::BillingStore,
    models::{
        company::GatewaySettings,
        gateway::{ChargeStatus, GatewayLink, GatewayLinkStatus, NewGatewayLink, PaymentLinkRequest},
    },
};

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// `None` quando a empresa não tem gateway habilitado (não é erro).
    async fn ensure_payment_link(
        &self,
        request: &PaymentLinkRequest,
    ) -> Result<Option<GatewayLink>, AppError>;

    async fn get_charge_status(&self, company_id: Uuid, txid: &str) -> Result<ChargeStatus, AppError>;
}

// --- Protocolo do PSP ---

#[derive(Debug, Clone)]
pub struct PixChargeRequest {
    pub txid: String,
    pub amount: Decimal,
    pub expiration_secs: i64,
    pub description: String,
    pub debtor_name: String,
    pub debtor_document: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PixCharge {
    pub txid: String,
    pub copy_paste: String,
    pub raw: Value,
}

/// API Pix (BACEN) de um PSP: criação e consulta de cobrança imediata.
#[async_trait]
pub trait PixApi: Send + Sync {
    async fn create_charge(
        &self,
        settings: &GatewaySettings,
        charge: &PixChargeRequest,
    ) -> Result<PixCharge, AppError>;

    async fn charge_status(&self, settings: &GatewaySettings, txid: &str) -> Result<ChargeStatus, AppError>;
}

// --- Gateway ---

pub struct PixGateway {
    store: Arc<dyn BillingStore>,
    api: Arc<dyn PixApi>,
    expiration_secs: i64,
}

impl PixGateway {
    pub fn new(store: Arc<dyn BillingStore>, api: Arc<dyn PixApi>, expiration_secs: i64) -> Self {
        Self { store, api, expiration_secs }
    }

    async fn settings(&self, company_id: Uuid) -> Result<Option<GatewaySettings>, AppError> {
        self.store.gateway_settings(company_id).await
    }
}

#[async_trait]
impl PaymentGateway for PixGateway {
    async fn ensure_payment_link(
        &self,
        request: &PaymentLinkRequest,
    ) -> Result<Option<GatewayLink>, AppError> {
        let Some(settings) = self.settings(request.company_id).await? else {
            return Ok(None);
        };

        // 1. Reaproveita o link vigente do mesmo vencimento
        let existing = self
            .store
            .find_gateway_link(request.company_id, request.contract_id, request.due_date)
            .await?;

        if let Some(link) = existing {
            if link.status == GatewayLinkStatus::Paid {
                return Ok(None);
            }
            if link.is_reusable(Utc::now()) && link.amount == request.amount {
                if let (Some(billing_id), None) = (request.billing_id, link.billing_id) {
                    self.store
                        .attach_billing_to_link(request.company_id, request.contract_id, request.due_date, billing_id)
                        .await?;
                }
                return Ok(Some(link));
            }
        }

        // 2. Emite uma nova cobrança no PSP
        let charge = self
            .api
            .create_charge(
                &settings,
                &PixChargeRequest {
                    txid: new_txid(),
                    amount: request.amount,
                    expiration_secs: self.expiration_secs,
                    description: request.description.clone(),
                    debtor_name: request.client_name.clone(),
                    debtor_document: request.client_document.clone(),
                },
            )
            .await?;

        let qr_image = match qr_data_uri(&charge.copy_paste) {
            Ok(uri) => Some(uri),
            Err(e) => {
                tracing::warn!(txid = %charge.txid, error = %e, "Não foi possível gerar o QR Code");
                None
            }
        };

        // 3. Grava (ou regrava, se expirado) o link do vencimento
        let link = self
            .store
            .save_gateway_link(&NewGatewayLink {
                company_id: request.company_id,
                contract_id: request.contract_id,
                billing_id: request.billing_id,
                due_date: request.due_date,
                amount: request.amount,
                txid: charge.txid.clone(),
                copy_paste: charge.copy_paste,
                qr_image,
                expires_at: Utc::now() + chrono::Duration::seconds(self.expiration_secs),
                payload: json!({ "charge": charge.raw }),
            })
            .await?;

        tracing::info!(
            company_id = %request.company_id,
            contract_id = %request.contract_id,
            due_date = %request.due_date,
            txid = %charge.txid,
            "Link Pix gerado"
        );

        Ok(Some(link))
    }

    async fn get_charge_status(&self, company_id: Uuid, txid: &str) -> Result<ChargeStatus, AppError> {
        let settings = self
            .settings(company_id)
            .await?
            .ok_or_else(|| AppError::GatewayError("gateway não configurado para a empresa".into()))?;

        self.api.charge_status(&settings, txid).await
    }
}

/// txid Pix: 26 a 35 caracteres alfanuméricos.
pub fn new_txid() -> String {
    Uuid::new_v4().simple().to_string()
}

/// PNG do QR Code em data URI, pronto para `<img src>`.
pub fn qr_data_uri(payload: &str) -> Result<String, AppError> {
    let code = QrCode::new(payload.as_bytes())
        .map_err(|e| AppError::InternalServerError(anyhow::Error::msg(e.to_string())))?;

    let image_buffer = code.render::<Luma<u8>>().min_dimensions(240, 240).build();

    let mut png = Vec::new();
    image::DynamicImage::ImageLuma8(image_buffer)
        .write_to(&mut png, image::ImageOutputFormat::Png)
        .map_err(|e| AppError::InternalServerError(anyhow::Error::msg(e.to_string())))?;

    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

// --- Cliente HTTP ---

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Cliente da API Pix com OAuth2 client-credentials e cache de token por empresa.
pub struct HttpPixApi {
    client: Client,
    tokens: Mutex<HashMap<Uuid, CachedToken>>,
}

impl HttpPixApi {
    // Renova o token um pouco antes de expirar
    const TOKEN_MARGIN: Duration = Duration::from_secs(30);

    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, tokens: Mutex::new(HashMap::new()) })
    }

    fn cached_token(&self, company_id: Uuid) -> Option<String> {
        let tokens = self.tokens.lock().ok()?;
        tokens
            .get(&company_id)
            .filter(|t| t.expires_at > Instant::now() + Self::TOKEN_MARGIN)
            .map(|t| t.access_token.clone())
    }

    async fn access_token(&self, settings: &GatewaySettings) -> Result<String, AppError> {
        if let Some(token) = self.cached_token(settings.company_id) {
            return Ok(token);
        }

        let response = self
            .client
            .post(format!("{}/oauth/token", base(settings)))
            .basic_auth(&settings.client_id, Some(&settings.client_secret))
            .json(&json!({ "grant_type": "client_credentials" }))
            .send()
            .await?;

        let response = ensure_success(response, "autenticação").await?;
        let token: TokenResponse = response.json().await?;

        let expires_at = Instant::now() + Duration::from_secs(token.expires_in.unwrap_or(3600));
        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.insert(
                settings.company_id,
                CachedToken { access_token: token.access_token.clone(), expires_at },
            );
        }

        Ok(token.access_token)
    }
}

#[async_trait]
impl PixApi for HttpPixApi {
    async fn create_charge(
        &self,
        settings: &GatewaySettings,
        charge: &PixChargeRequest,
    ) -> Result<PixCharge, AppError> {
        let token = self.access_token(settings).await?;

        let mut body = json!({
            "calendario": { "expiracao": charge.expiration_secs },
            "valor": { "original": format!("{:.2}", charge.amount) },
            "chave": settings.pix_key,
            "solicitacaoPagador": truncate(&charge.description, 140),
        });
        if let Some(debtor) = debtor(&charge.debtor_name, charge.debtor_document.as_deref()) {
            body["devedor"] = debtor;
        }

        let response = self
            .client
            .put(format!("{}/v2/cob/{}", base(settings), charge.txid))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let raw: Value = ensure_success(response, "criação de cobrança").await?.json().await?;

        let copy_paste = raw
            .get("pixCopiaECola")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::GatewayError("resposta sem pixCopiaECola".into()))?
            .to_string();

        let txid = raw
            .get("txid")
            .and_then(Value::as_str)
            .unwrap_or(charge.txid.as_str())
            .to_string();

        Ok(PixCharge { txid, copy_paste, raw })
    }

    async fn charge_status(&self, settings: &GatewaySettings, txid: &str) -> Result<ChargeStatus, AppError> {
        let token = self.access_token(settings).await?;

        let response = self
            .client
            .get(format!("{}/v2/cob/{}", base(settings), txid))
            .bearer_auth(token)
            .send()
            .await?;

        let raw: Value = ensure_success(response, "consulta de cobrança").await?.json().await?;
        Ok(parse_charge_status(raw))
    }
}

/// Lê `status` e o horário do primeiro Pix recebido (`pix[0].horario`).
pub fn parse_charge_status(raw: Value) -> ChargeStatus {
    let status = raw
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let paid_at = raw
        .get("pix")
        .and_then(Value::as_array)
        .and_then(|pix| pix.first())
        .and_then(|p| p.get("horario"))
        .and_then(Value::as_str)
        .and_then(|h| DateTime::parse_from_rfc3339(h).ok())
        .map(|h| h.with_timezone(&Utc));

    ChargeStatus { status, paid_at, raw }
}

fn base(settings: &GatewaySettings) -> &str {
    settings.base_url.trim_end_matches('/')
}

fn debtor(name: &str, document: Option<&str>) -> Option<Value> {
    let digits: String = document?.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.len() {
        11 => Some(json!({ "cpf": digits, "nome": name })),
        14 => Some(json!({ "cnpj": digits, "nome": name })),
        _ => None,
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

async fn ensure_success(response: reqwest::Response, step: &str) -> Result<reqwest::Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AppError::GatewayError(format!("{step}: PSP respondeu {status}: {body}")))
}
