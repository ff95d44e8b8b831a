use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::domain::{UserId, UserRecord};

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub ttl_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub username: String,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> UserId {
        UserId(self.user_id)
    }
}

/// HS256 session token for `user`, valid for `cfg.ttl_seconds`.
pub fn mint_token(cfg: &TokenConfig, user: &UserRecord) -> Result<String, jsonwebtoken::errors::Error> {
    let exp = Utc::now() + Duration::seconds(cfg.ttl_seconds);
    let claims = Claims {
        user_id: user.id.0,
        username: user.username.clone(),
        exp: exp.timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(cfg.secret.as_bytes()),
    )
}

/// Checks signature and expiry.
pub fn verify_token(cfg: &TokenConfig, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(cfg.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
}

#[cfg(test)]
#[path = "tests/tokens_tests.rs"]
mod tests;
