use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    model::user::User,
    models::Claims,
};

/// Issues and verifies HS256 session tokens.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    ttl_secs: i64,
}

impl TokenIssuer {
    pub fn new(secret: &str, issuer: &str, ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_string(),
            ttl_secs,
        }
    }

    pub fn issue(&self, user: &User, hierarchy_level: Option<i32>) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            user_id: user.id,
            sub: user.email.clone(),
            role_id: user.role_id,
            hierarchy_level,
            iat: now,
            exp: now + self.ttl_secs,
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::internal(format!("token signing failed: {e}")))
    }

    /// Checks signature, algorithm, issuer and expiry.
    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token rejected");
                AppError::auth("Invalid or expired token")
            })
    }
}
