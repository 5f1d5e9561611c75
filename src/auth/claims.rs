use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (numeric user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Additional custom claims
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Claims {
    /// The owner id every management record is scoped to
    pub fn user_id(&self) -> Result<i64, AppError> {
        self.sub
            .trim()
            .parse()
            .map_err(|_| AppError::Auth(format!("Invalid subject: {}", self.sub)))
    }
}
