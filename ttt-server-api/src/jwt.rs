use axum::{RequestPartsExt, extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use ttt_server_domain::{
    ServiceError, ServiceResult,
    app::AppState,
    jwt::JwtService,
    player::PlayerUsername,
    session::SessionContext,
};
use uuid::Uuid;

use crate::MyServiceError;

const DEFAULT_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    exp: usize,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keys {
    fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

fn read_or_generate_secret() -> Vec<u8> {
    match std::env::var("TTT_JWT_SECRET") {
        Ok(secret) if !secret.is_empty() => secret.as_bytes().to_vec(),
        _ => {
            warn!("JWT secret not found, generating a random one; tokens will not survive a restart");
            Uuid::new_v4().as_bytes().to_vec()
        }
    }
}

pub struct JwtServiceImpl {
    keys: Keys,
    ttl: chrono::Duration,
}

impl JwtServiceImpl {
    pub fn new(secret: &[u8], ttl: chrono::Duration) -> Self {
        Self {
            keys: Keys::new(secret),
            ttl,
        }
    }

    pub fn from_env() -> Self {
        let ttl_secs = std::env::var("TTT_TOKEN_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(DEFAULT_TOKEN_TTL_SECS);
        Self::new(&read_or_generate_secret(), chrono::Duration::seconds(ttl_secs))
    }
}

impl JwtService for JwtServiceImpl {
    fn generate_jwt(&self, username: &PlayerUsername) -> ServiceResult<String> {
        let claims = Claims {
            sub: username.clone(),
            exp: (chrono::Utc::now() + self.ttl).timestamp() as usize,
        };
        encode(&Header::default(), &claims, &self.keys.encoding)
            .map_err(|e| ServiceError::Internal(format!("Failed to sign token: {}", e)))
    }

    fn validate_jwt(&self, token: &str) -> ServiceResult<PlayerUsername> {
        Ok(self.decode_claims(token)?.sub)
    }

    fn token_expiry(&self, token: &str) -> ServiceResult<chrono::DateTime<chrono::Utc>> {
        let exp = self.decode_claims(token)?.exp;
        chrono::DateTime::from_timestamp(exp as i64, 0)
            .ok_or_else(|| ServiceError::Internal(format!("Invalid token expiry: {}", exp)))
    }
}

impl JwtServiceImpl {
    fn decode_claims(&self, token: &str) -> ServiceResult<Claims> {
        match decode::<Claims>(token, &self.keys.decoding, &Validation::default()) {
            Ok(data) => Ok(data.claims),
            Err(e) => {
                debug!("Rejected token: {}", e);
                ServiceError::unauthorized("Invalid token")
            }
        }
    }
}

/// The caller's session, resolved from the bearer token.
pub struct Session(pub SessionContext);

impl FromRequestParts<AppState> for Session {
    type Rejection = MyServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        app: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| ServiceError::Unauthorized("Missing bearer token".to_string()))?;
        let username = app.jwt_service.validate_jwt(bearer.token())?;
        if app.session_service.is_token_revoked(bearer.token()) {
            debug!("Rejected revoked token of {}", username);
            return Err(ServiceError::Unauthorized("Token has been revoked".to_string()).into());
        }
        Ok(Session(app.session_service.get_session(&username)))
    }
}
