// src/middleware/auth.rs

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use uuid::Uuid;

use crate::{common::error::AppError, config::AppState, models::auth::Claims};

// Usuários master escolhem a empresa por este cabeçalho
const COMPANY_ID_HEADER: &str = "x-company-id";

/// Claims de um bearer token válido. A emissão do token é externa; aqui só
/// se valida assinatura e expiração.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Claims);

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::InvalidToken)?;

        let token_data = decode::<Claims>(
            bearer.token(),
            &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| AppError::InvalidToken)?;

        Ok(AuthenticatedUser(token_data.claims))
    }
}

/// Empresa em nome da qual a requisição opera.
#[derive(Debug, Clone)]
pub struct CompanyContext {
    pub company_id: Uuid,
    pub user: Claims,
}

impl FromRequestParts<AppState> for CompanyContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(claims) = AuthenticatedUser::from_request_parts(parts, state).await?;

        let requested = match parts.headers.get(COMPANY_ID_HEADER) {
            Some(value) => {
                let raw = value.to_str().map_err(|_| AppError::Forbidden)?;
                Some(Uuid::parse_str(raw.trim()).map_err(|_| AppError::Forbidden)?)
            }
            None => None,
        };

        let company_id = match (claims.is_master(), requested, claims.company_id) {
            (true, Some(requested), _) => requested,
            (_, None, Some(own)) => own,
            // Usuário comum só pode repetir a própria empresa no cabeçalho
            (false, Some(requested), Some(own)) if requested == own => own,
            _ => return Err(AppError::Forbidden),
        };

        Ok(CompanyContext { company_id, user: claims })
    }
}

/// Exige o papel `master` (ex.: reconciliação global do gateway).
#[derive(Debug, Clone)]
pub struct MasterUser(pub Claims);

impl FromRequestParts<AppState> for MasterUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(claims) = AuthenticatedUser::from_request_parts(parts, state).await?;
        if !claims.is_master() {
            return Err(AppError::Forbidden);
        }
        Ok(MasterUser(claims))
    }
}
