use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};
use ttt_server_domain::{
    ServiceError, ServiceResult,
    mirror::ArcDocumentMirror,
    player::{Player, PlayerRepository, PlayerUsername},
};

use crate::{USERS_FILE, document::JsonDocument};

#[derive(Serialize, Deserialize, Default)]
struct UsersDocument {
    #[serde(default)]
    users: BTreeMap<String, UserEntry>,
}

#[derive(Serialize, Deserialize, Clone)]
struct UserEntry {
    name: String,
    password: String,
    #[serde(default)]
    email: String,
}

pub struct JsonPlayerRepository {
    document: JsonDocument<UsersDocument>,
}

impl JsonPlayerRepository {
    pub fn new(data_dir: &Path, mirror: ArcDocumentMirror) -> Self {
        Self {
            document: JsonDocument::new(data_dir, USERS_FILE, mirror),
        }
    }

    fn player_from_entry(username: &str, entry: UserEntry) -> Player {
        Player {
            username: username.to_string(),
            name: entry.name,
            password_hash: entry.password,
            email: entry.email,
        }
    }
}

#[async_trait::async_trait]
impl PlayerRepository for JsonPlayerRepository {
    async fn get_player(&self, username: &str) -> ServiceResult<Option<Player>> {
        let mut document = self.document.load().await?;
        Ok(document
            .users
            .remove(username)
            .map(|entry| Self::player_from_entry(username, entry)))
    }

    async fn create_player(&self, player: &Player) -> ServiceResult<()> {
        let _guard = self.document.lock().await;
        let mut document = self.document.load().await?;
        if document.users.contains_key(&player.username) {
            return ServiceError::already_exists(format!(
                "User {} is already registered",
                player.username
            ));
        }
        document.users.insert(
            player.username.clone(),
            UserEntry {
                name: player.name.clone(),
                password: player.password_hash.clone(),
                email: player.email.clone(),
            },
        );
        self.document.store(&document).await
    }

    async fn get_player_names(&self) -> ServiceResult<Vec<PlayerUsername>> {
        let document = self.document.load().await?;
        Ok(document.users.into_keys().collect())
    }
}

#[cfg(test)]
mod tests {
    use ttt_server_domain::player::hash_password;

    use super::*;
    use crate::test_util::{RecordingMirror, temp_data_dir};

    fn player(username: &str, name: &str, password: &str) -> Player {
        Player {
            username: username.to_string(),
            name: name.to_string(),
            password_hash: hash_password(password),
            email: format!("{}@example.com", username),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_player() {
        let dir = temp_data_dir();
        let mirror = RecordingMirror::default();
        let repository = JsonPlayerRepository::new(&dir, mirror.arc());

        assert!(repository.get_player("alice").await.unwrap().is_none());
        let alice = player("alice", "Alice", "secret");
        repository.create_player(&alice).await.unwrap();
        assert_eq!(repository.get_player("alice").await.unwrap(), Some(alice));
        assert_eq!(mirror.paths(), vec![USERS_FILE.to_string()]);

        let reopened = JsonPlayerRepository::new(&dir, mirror.arc());
        assert_eq!(
            reopened.get_player_names().await.unwrap(),
            vec!["alice".to_string()]
        );
    }

    #[tokio::test]
    async fn test_duplicate_player_keeps_original() {
        let dir = temp_data_dir();
        let repository = JsonPlayerRepository::new(&dir, RecordingMirror::default().arc());
        repository
            .create_player(&player("alice", "Alice", "secret"))
            .await
            .unwrap();
        assert!(matches!(
            repository
                .create_player(&player("alice", "Mallory", "other"))
                .await,
            Err(ServiceError::AlreadyExists(..))
        ));
        let stored = repository.get_player("alice").await.unwrap().unwrap();
        assert_eq!(stored.name, "Alice");
        assert_eq!(stored.password_hash, hash_password("secret"));
    }

    #[tokio::test]
    async fn test_reads_existing_users_document() {
        let dir = temp_data_dir();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(USERS_FILE),
            r#"{
    "users": {
        "joao": {
            "name": "João",
            "password": "2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b",
            "email": "joao@example.com"
        }
    }
}"#,
        )
        .unwrap();
        let repository = JsonPlayerRepository::new(&dir, RecordingMirror::default().arc());
        let joao = repository.get_player("joao").await.unwrap().unwrap();
        assert_eq!(joao.name, "João");
        assert_eq!(joao.password_hash, hash_password("secret"));
    }

    #[tokio::test]
    async fn test_corrupt_document_is_an_error() {
        let dir = temp_data_dir();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(USERS_FILE), "{ not json").unwrap();
        let repository = JsonPlayerRepository::new(&dir, RecordingMirror::default().arc());
        assert!(matches!(
            repository.get_player("alice").await,
            Err(ServiceError::Internal(..))
        ));
    }
}
