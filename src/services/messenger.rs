// src/services/messenger.rs

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::db::BillingStore;

/// Resultado de um envio. Falha de transporte vira `ok: false`, nunca erro:
/// quem chama só precisa gravar o log e seguir.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub ok: bool,
    pub status: Option<u16>,
    pub data: Option<Value>,
    pub error: Option<String>,
}

impl SendOutcome {
    pub fn delivered(status: u16, data: Value) -> Self {
        Self { ok: true, status: Some(status), data: Some(data), error: None }
    }

    pub fn failed(status: Option<u16>, error: impl Into<String>) -> Self {
        Self { ok: false, status, data: None, error: Some(error.into()) }
    }

    /// Snapshot gravado em `billing_notifications.provider_response`.
    pub fn snapshot(&self) -> Value {
        json!({
            "ok": self.ok,
            "status": self.status,
            "data": self.data,
            "error": self.error,
        })
    }
}

#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, company_id: Uuid, phone: &str, text: &str) -> SendOutcome;
}

#[derive(Debug, Serialize)]
struct SendTextRequest<'a> {
    number: String,
    text: &'a str,
}

/// Envio pela API HTTP de WhatsApp configurada em cada empresa
/// (`POST {api_url}/message/sendText/{instance}`).
pub struct WhatsAppMessenger {
    store: Arc<dyn BillingStore>,
    client: Client,
}

impl WhatsAppMessenger {
    pub fn new(store: Arc<dyn BillingStore>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { store, client })
    }
}

#[async_trait]
impl Messenger for WhatsAppMessenger {
    async fn send(&self, company_id: Uuid, phone: &str, text: &str) -> SendOutcome {
        let settings = match self.store.whatsapp_settings(company_id).await {
            Ok(Some(settings)) => settings,
            Ok(None) => return SendOutcome::failed(None, "WhatsApp não configurado para a empresa"),
            Err(e) => return SendOutcome::failed(None, format!("falha ao ler configuração do WhatsApp: {e}")),
        };

        let Some(number) = normalize_phone(phone) else {
            return SendOutcome::failed(None, format!("telefone inválido: {phone}"));
        };

        let url = format!(
            "{}/message/sendText/{}",
            settings.api_url.trim_end_matches('/'),
            settings.instance
        );

        let response = match self
            .client
            .post(&url)
            .header("apikey", &settings.token)
            .json(&SendTextRequest { number: number.clone(), text })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(%company_id, error = %e, "Falha de conexão com a API de WhatsApp");
                return SendOutcome::failed(None, e.to_string());
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let data = serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body));

        if !status.is_success() {
            tracing::warn!(%company_id, status = status.as_u16(), "API de WhatsApp recusou a mensagem");
            return SendOutcome {
                ok: false,
                status: Some(status.as_u16()),
                data: Some(data),
                error: Some(format!("API de WhatsApp respondeu {status}")),
            };
        }

        tracing::debug!(%company_id, to = %number, "Mensagem de WhatsApp enviada");
        SendOutcome::delivered(status.as_u16(), data)
    }
}

/// Só dígitos, com o DDI 55 quando o número vier apenas com DDD.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    match digits.len() {
        10 | 11 => Some(format!("55{digits}")),
        12 | 13 if digits.starts_with("55") => Some(digits),
        _ => None,
    }
}
