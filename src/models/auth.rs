// src/models/auth.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ROLE_MASTER: &str = "master";

// Estrutura de dados ("claims") dentro do JWT emitido pelo serviço de login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,                 // Subject (ID do usuário)
    pub company_id: Option<Uuid>,  // Empresa à qual o usuário pertence
    #[serde(default)]
    pub role: String,
    pub exp: usize,                // Expiration time
}

impl Claims {
    pub fn is_master(&self) -> bool {
        self.role == ROLE_MASTER
    }
}
