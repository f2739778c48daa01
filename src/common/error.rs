// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::billing::BillingStatus;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Data inválida: {0}")]
    InvalidDate(String),

    #[error("Contrato não encontrado")]
    ContractNotFound,

    #[error("Cobrança não encontrada")]
    BillingNotFound,

    // Contrato com combinação de modo/intervalo que o motor não sabe calcular
    #[error("Regra de cobrança inválida: {0}")]
    InvalidBillingRule(String),

    #[error("A data {0} não é um vencimento deste contrato")]
    NotABillingDate(String),

    #[error("Nenhuma data personalizada cadastrada para {0}")]
    CustomDateNotFound(String),

    #[error("O mês já está com status {0}")]
    MonthAlreadySettled(BillingStatus),

    #[error("A cobrança já está com status {0}")]
    BillingAlreadySettled(BillingStatus),

    #[error("Tipo de notificação não permitido: {0}")]
    InvalidNotificationKind(String),

    #[error("Notificação já enviada para este vencimento")]
    AlreadyNotified,

    #[error("Falha no envio da mensagem: {0}")]
    DeliveryFailed(String),

    #[error("Erro no gateway de pagamento: {0}")]
    GatewayError(String),

    #[error("Token inválido")]
    InvalidToken,

    #[error("Acesso negado")]
    Forbidden,

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Erro HTTP: {0}")]
    HttpError(#[from] reqwest::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "Um ou mais campos são inválidos.",
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::InvalidDate(_)
            | AppError::InvalidBillingRule(_)
            | AppError::NotABillingDate(_)
            | AppError::CustomDateNotFound(_)
            | AppError::InvalidNotificationKind(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::ContractNotFound | AppError::BillingNotFound => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            AppError::MonthAlreadySettled(_)
            | AppError::BillingAlreadySettled(_)
            | AppError::AlreadyNotified => (StatusCode::CONFLICT, self.to_string()),
            AppError::DeliveryFailed(_) | AppError::GatewayError(_) => {
                tracing::warn!("Falha em serviço externo: {}", self);
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            AppError::InvalidToken | AppError::JwtError(_) => (
                StatusCode::UNAUTHORIZED,
                "Token de autenticação inválido ou ausente.".to_string(),
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "Você não tem permissão para esta ação.".to_string(),
            ),

            // Banco, HTTP e erros internos viram 500; o detalhe vai só para o log.
            ref e => {
                tracing::error!("Erro Interno do Servidor: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Ocorreu um erro inesperado.".to_string(),
                )
            }
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
