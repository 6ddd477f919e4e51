use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::{player::PlayerUsername, room::RoomId};

/// What the server knows about an authenticated user between requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionContext {
    pub username: PlayerUsername,
    pub current_room: Option<RoomId>,
}

impl SessionContext {
    pub fn new(username: PlayerUsername) -> Self {
        Self {
            username,
            current_room: None,
        }
    }
}

pub type ArcSessionService = Arc<Box<dyn SessionService + Send + Sync + 'static>>;

pub trait SessionService {
    fn get_session(&self, username: &PlayerUsername) -> SessionContext;
    fn enter_room(&self, username: &PlayerUsername, room_id: &RoomId);
    /// Clears the current room only if it is `room_id`.
    fn exit_room(&self, username: &PlayerUsername, room_id: &RoomId);
    fn end_session(&self, username: &PlayerUsername);
    /// Rejects `token` from now on until it expires anyway.
    fn revoke_token(&self, token: &str, expires_at: DateTime<Utc>);
    fn is_token_revoked(&self, token: &str) -> bool;
}

#[derive(Default)]
pub struct SessionServiceImpl {
    sessions: DashMap<PlayerUsername, SessionContext>,
    revoked_tokens: DashMap<String, DateTime<Utc>>,
}

impl SessionServiceImpl {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionService for SessionServiceImpl {
    fn get_session(&self, username: &PlayerUsername) -> SessionContext {
        self.sessions
            .get(username)
            .map(|s| s.clone())
            .unwrap_or_else(|| SessionContext::new(username.clone()))
    }

    fn enter_room(&self, username: &PlayerUsername, room_id: &RoomId) {
        self.sessions
            .entry(username.clone())
            .or_insert_with(|| SessionContext::new(username.clone()))
            .current_room = Some(room_id.clone());
    }

    fn exit_room(&self, username: &PlayerUsername, room_id: &RoomId) {
        if let Some(mut session) = self.sessions.get_mut(username) {
            if session.current_room.as_ref() == Some(room_id) {
                session.current_room = None;
            }
        }
    }

    fn end_session(&self, username: &PlayerUsername) {
        self.sessions.remove(username);
    }

    fn revoke_token(&self, token: &str, expires_at: DateTime<Utc>) {
        let now = Utc::now();
        self.revoked_tokens.retain(|_, expiry| *expiry > now);
        if expires_at > now {
            self.revoked_tokens.insert(token.to_string(), expires_at);
        }
    }

    fn is_token_revoked(&self, token: &str) -> bool {
        self.revoked_tokens.contains_key(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_user_has_empty_session() {
        let service = SessionServiceImpl::new();
        let session = service.get_session(&"alice".to_string());
        assert_eq!(session, SessionContext::new("alice".to_string()));
    }

    #[test]
    fn test_enter_and_exit_room() {
        let service = SessionServiceImpl::new();
        let alice = "alice".to_string();
        service.enter_room(&alice, &"1".to_string());
        assert_eq!(
            service.get_session(&alice).current_room,
            Some("1".to_string())
        );

        service.exit_room(&alice, &"2".to_string());
        assert_eq!(
            service.get_session(&alice).current_room,
            Some("1".to_string())
        );

        service.exit_room(&alice, &"1".to_string());
        assert_eq!(service.get_session(&alice).current_room, None);
    }

    #[test]
    fn test_end_session() {
        let service = SessionServiceImpl::new();
        let alice = "alice".to_string();
        service.enter_room(&alice, &"1".to_string());
        service.end_session(&alice);
        assert_eq!(service.get_session(&alice).current_room, None);
    }

    #[test]
    fn test_revoked_tokens_are_pruned_after_expiry() {
        let service = SessionServiceImpl::new();
        service.revoke_token("live", Utc::now() + chrono::Duration::hours(1));
        service.revoke_token("stale", Utc::now() - chrono::Duration::seconds(1));
        assert!(service.is_token_revoked("live"));
        assert!(!service.is_token_revoked("stale"));
        assert!(!service.is_token_revoked("other"));
        assert_eq!(service.revoked_tokens.len(), 1);
    }
}
