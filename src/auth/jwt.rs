use jsonwebtoken::{decode, DecodingKey, Validation};

use crate::config::JwtConfig;
use crate::error::AppError;

use super::Claims;

pub struct JwtValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    pub fn new(config: &JwtConfig) -> Self {
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        let mut validation = Validation::default();
        let mut required = vec!["exp"];

        // Configured claims must be present, not just correct when present
        if let Some(ref issuer) = config.issuer {
            validation.set_issuer(&[issuer]);
            required.push("iss");
        }

        if let Some(ref audience) = config.audience {
            validation.set_audience(&[audience]);
            required.push("aud");
        }

        validation.set_required_spec_claims(&required);

        Self {
            decoding_key,
            validation,
        }
    }

    pub fn validate(&self, token: &str) -> Result<Claims, AppError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AppError::Auth(format!("Invalid token: {}", e)))?;

        Ok(token_data.claims)
    }
}
