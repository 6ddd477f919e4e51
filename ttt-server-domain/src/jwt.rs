use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{ServiceResult, player::PlayerUsername};

pub type ArcJwtService = Arc<Box<dyn JwtService + Send + Sync>>;
pub trait JwtService {
    fn generate_jwt(&self, username: &PlayerUsername) -> ServiceResult<String>;
    fn validate_jwt(&self, token: &str) -> ServiceResult<PlayerUsername>;
    fn token_expiry(&self, token: &str) -> ServiceResult<DateTime<Utc>>;
}

#[cfg(test)]
#[derive(Default)]
pub struct MockJwtService;

#[cfg(test)]
impl JwtService for MockJwtService {
    fn generate_jwt(&self, username: &PlayerUsername) -> ServiceResult<String> {
        Ok(format!("token-{}", username))
    }

    fn validate_jwt(&self, token: &str) -> ServiceResult<PlayerUsername> {
        match token.strip_prefix("token-") {
            Some(username) => Ok(username.to_string()),
            None => crate::ServiceError::unauthorized("Invalid token"),
        }
    }

    fn token_expiry(&self, token: &str) -> ServiceResult<DateTime<Utc>> {
        self.validate_jwt(token)?;
        Ok(Utc::now() + chrono::Duration::hours(1))
    }
}
