use std::sync::Arc;

use log::{debug, info};
use sha2::{Digest, Sha256};

use crate::{ServiceError, ServiceResult, jwt::ArcJwtService};

pub type PlayerUsername = String;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Player {
    pub username: PlayerUsername,
    pub name: String,
    pub password_hash: String,
    pub email: String,
}

/// Lowercase hex SHA-256 of the password, unsalted.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub type ArcPlayerRepository = Arc<Box<dyn PlayerRepository + Send + Sync + 'static>>;

#[async_trait::async_trait]
pub trait PlayerRepository {
    async fn get_player(&self, username: &str) -> ServiceResult<Option<Player>>;
    /// Fails with `AlreadyExists` and leaves the stored player untouched if the username is taken.
    async fn create_player(&self, player: &Player) -> ServiceResult<()>;
    async fn get_player_names(&self) -> ServiceResult<Vec<PlayerUsername>>;
}

pub type ArcPlayerService = Arc<Box<dyn PlayerService + Send + Sync + 'static>>;

#[async_trait::async_trait]
pub trait PlayerService {
    async fn register(
        &self,
        username: &PlayerUsername,
        name: &str,
        password: &str,
        email: &str,
    ) -> ServiceResult<()>;
    async fn authenticate(&self, username: &PlayerUsername, password: &str) -> ServiceResult<bool>;
    async fn login(&self, username: &PlayerUsername, password: &str) -> ServiceResult<String>;
    async fn get_player(&self, username: &PlayerUsername) -> ServiceResult<Player>;
}

pub struct PlayerServiceImpl {
    player_repository: ArcPlayerRepository,
    jwt_service: ArcJwtService,
}

impl PlayerServiceImpl {
    pub fn new(player_repository: ArcPlayerRepository, jwt_service: ArcJwtService) -> Self {
        Self {
            player_repository,
            jwt_service,
        }
    }

    fn validate_fields(fields: &[(&str, &str)]) -> ServiceResult<()> {
        for (field, value) in fields {
            if value.trim().is_empty() {
                return ServiceError::bad_request(format!("{} must not be empty", field));
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl PlayerService for PlayerServiceImpl {
    async fn register(
        &self,
        username: &PlayerUsername,
        name: &str,
        password: &str,
        email: &str,
    ) -> ServiceResult<()> {
        Self::validate_fields(&[
            ("username", username.as_str()),
            ("name", name),
            ("password", password),
            ("email", email),
        ])?;
        if self.player_repository.get_player(username).await?.is_some() {
            return ServiceError::already_exists(format!(
                "User {} is already registered",
                username
            ));
        }
        let player = Player {
            username: username.clone(),
            name: name.to_string(),
            password_hash: hash_password(password),
            email: email.to_string(),
        };
        self.player_repository.create_player(&player).await?;
        info!("Registered player {}", username);
        Ok(())
    }

    async fn authenticate(&self, username: &PlayerUsername, password: &str) -> ServiceResult<bool> {
        let Some(player) = self.player_repository.get_player(username).await? else {
            debug!("Authentication for unknown player {}", username);
            return Ok(false);
        };
        Ok(player.password_hash == hash_password(password))
    }

    async fn login(&self, username: &PlayerUsername, password: &str) -> ServiceResult<String> {
        if !self.authenticate(username, password).await? {
            return Err(ServiceError::InvalidCredentials);
        }
        self.jwt_service.generate_jwt(username)
    }

    async fn get_player(&self, username: &PlayerUsername) -> ServiceResult<Player> {
        match self.player_repository.get_player(username).await? {
            Some(player) => Ok(player),
            None => ServiceError::not_found("Player not found"),
        }
    }
}

#[cfg(test)]
#[derive(Clone, Default)]
pub struct MockPlayerRepository {
    players: Arc<std::sync::Mutex<Vec<Player>>>,
}

#[cfg(test)]
#[async_trait::async_trait]
impl PlayerRepository for MockPlayerRepository {
    async fn get_player(&self, username: &str) -> ServiceResult<Option<Player>> {
        let players = self.players.lock().unwrap();
        Ok(players.iter().find(|p| p.username == username).cloned())
    }

    async fn create_player(&self, player: &Player) -> ServiceResult<()> {
        let mut players = self.players.lock().unwrap();
        if players.iter().any(|p| p.username == player.username) {
            return ServiceError::already_exists("Username taken");
        }
        players.push(player.clone());
        Ok(())
    }

    async fn get_player_names(&self) -> ServiceResult<Vec<PlayerUsername>> {
        let players = self.players.lock().unwrap();
        Ok(players.iter().map(|p| p.username.clone()).collect())
    }
}
