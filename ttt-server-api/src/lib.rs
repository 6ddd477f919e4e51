use axum::{
    Router,
    http::{Method, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use log::info;
use tower_http::cors::{Any, CorsLayer};
use ttt_server_domain::{ServiceError, app::AppState};

mod auth;
mod games;
mod jwt;
mod mirror;
mod ranking;
mod rooms;

pub use jwt::{Claims, JwtServiceImpl, Session};

pub fn router(app: AppState) -> Router {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/session", get(auth::get_session))
        .route("/rooms", get(rooms::list_rooms))
        .route("/rooms/{id}", get(rooms::get_room))
        .route("/rooms/{id}/join", post(rooms::join_room))
        .route("/rooms/{id}/view", post(rooms::view_room))
        .route("/rooms/{id}/leave", post(rooms::leave_room))
        .route("/rooms/{id}/move", post(rooms::apply_move))
        .route("/rooms/{id}/reset", post(rooms::reset_board))
        .route("/ranking", get(ranking::get_ranking))
        .route("/ranking/results", post(ranking::record_result))
        .route("/ranking/{name}", get(ranking::get_entry))
        .route("/games", get(games::get_games))
        .route("/games/{id}", get(games::get_game))
        .route("/mirror/status", get(mirror::get_status))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
                .allow_origin(Any),
        )
        .with_state(app)
}

pub async fn run(
    app: AppState,
    shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let host = std::env::var("TTT_HTTP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("TTT_HTTP_PORT")
        .unwrap_or_else(|_| "3004".to_string())
        .parse::<u16>()
        .expect("TTT_HTTP_PORT must be a valid u16");

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;

    info!("API server listening on {}:{}", host, port);
    axum::serve(listener, router(app))
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("HTTP API shut down gracefully");
    Ok(())
}

#[derive(Debug)]
pub struct MyServiceError(ServiceError);

impl IntoResponse for MyServiceError {
    fn into_response(self) -> axum::http::Response<axum::body::Body> {
        let (status, msg) = match self.0 {
            ServiceError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ServiceError::AlreadyExists(msg) => (StatusCode::CONFLICT, msg),
            ServiceError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "Invalid username or password".to_string(),
            ),
            ServiceError::InvalidMove(reason) => (StatusCode::BAD_REQUEST, reason.to_string()),
            ServiceError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ServiceError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ServiceError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ServiceError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        let body = serde_json::json!({ "error": msg });
        (status, axum::Json(body)).into_response()
    }
}

impl From<ServiceError> for MyServiceError {
    fn from(value: ServiceError) -> Self {
        MyServiceError(value)
    }
}

#[derive(serde::Serialize)]
pub struct PaginatedResponse<T> {
    items: Vec<T>,
    total: usize,
    offset: usize,
}

#[cfg(test)]
pub(crate) mod test_util {
    use std::sync::{Arc, Mutex};

    use ttt_server_domain::{
        ServiceError, ServiceResult,
        app::{AppConfig, AppRepositories, AppState, construct_app},
        history::{GameFilter, GameFilterResult, GameId, GameRecord, GameRepository},
        mirror::{MirrorConfig, MirrorOutbox, NoopRemoteMirror},
        player::{Player, PlayerRepository, PlayerUsername},
        ranking::{MatchOutcome, RankingEntry, RankingRepository},
        room::{Room, RoomId, RoomRepository},
    };

    use crate::JwtServiceImpl;

    #[derive(Default)]
    struct MemoryStore {
        players: Mutex<Vec<Player>>,
        rooms: Mutex<Vec<Room>>,
        ranking: Mutex<Vec<(PlayerUsername, RankingEntry)>>,
        games: Mutex<Vec<(GameId, GameRecord)>>,
    }

    #[derive(Clone, Default)]
    struct MemoryRepository(Arc<MemoryStore>);

    #[async_trait::async_trait]
    impl PlayerRepository for MemoryRepository {
        async fn get_player(&self, username: &str) -> ServiceResult<Option<Player>> {
            let players = self.0.players.lock().unwrap();
            Ok(players.iter().find(|p| p.username == username).cloned())
        }

        async fn create_player(&self, player: &Player) -> ServiceResult<()> {
            let mut players = self.0.players.lock().unwrap();
            if players.iter().any(|p| p.username == player.username) {
                return ServiceError::already_exists("Username taken");
            }
            players.push(player.clone());
            Ok(())
        }

        async fn get_player_names(&self) -> ServiceResult<Vec<PlayerUsername>> {
            let players = self.0.players.lock().unwrap();
            Ok(players.iter().map(|p| p.username.clone()).collect())
        }
    }

    #[async_trait::async_trait]
    impl RoomRepository for MemoryRepository {
        async fn get_rooms(&self) -> ServiceResult<Vec<Room>> {
            Ok(self.0.rooms.lock().unwrap().clone())
        }

        async fn get_room(&self, id: &RoomId) -> ServiceResult<Option<Room>> {
            let rooms = self.0.rooms.lock().unwrap();
            Ok(rooms.iter().find(|r| &r.id == id).cloned())
        }

        async fn create_room(&self, room: &Room) -> ServiceResult<()> {
            self.0.rooms.lock().unwrap().push(room.clone());
            Ok(())
        }

        async fn update_room(&self, room: &Room) -> ServiceResult<u64> {
            let mut rooms = self.0.rooms.lock().unwrap();
            let Some(stored) = rooms.iter_mut().find(|r| r.id == room.id) else {
                return ServiceError::not_found("Room not found");
            };
            if stored.revision != room.revision {
                return ServiceError::conflict("Stale room");
            }
            *stored = room.clone();
            stored.revision += 1;
            Ok(stored.revision)
        }
    }

    #[async_trait::async_trait]
    impl RankingRepository for MemoryRepository {
        async fn get_entries(&self) -> ServiceResult<Vec<(PlayerUsername, RankingEntry)>> {
            Ok(self.0.ranking.lock().unwrap().clone())
        }

        async fn record_outcomes(
            &self,
            outcomes: &[(PlayerUsername, MatchOutcome)],
        ) -> ServiceResult<()> {
            let mut ranking = self.0.ranking.lock().unwrap();
            for (player, outcome) in outcomes {
                match ranking.iter_mut().find(|(name, _)| name == player) {
                    Some((_, entry)) => entry.apply(*outcome),
                    None => {
                        let mut entry = RankingEntry::default();
                        entry.apply(*outcome);
                        ranking.push((player.clone(), entry));
                    }
                }
            }
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl GameRepository for MemoryRepository {
        async fn create_game(&self, game: &GameRecord) -> ServiceResult<GameId> {
            let id = uuid::Uuid::new_v4();
            self.0.games.lock().unwrap().push((id, game.clone()));
            Ok(id)
        }

        async fn get_game_record(&self, id: GameId) -> ServiceResult<Option<GameRecord>> {
            let games = self.0.games.lock().unwrap();
            Ok(games.iter().find(|(gid, _)| *gid == id).map(|(_, g)| g.clone()))
        }

        async fn get_games(&self, filter: GameFilter) -> ServiceResult<GameFilterResult> {
            Ok(filter.apply(self.0.games.lock().unwrap().clone()))
        }
    }

    /// App state over in-memory repositories with rooms "1" and "2".
    pub async fn test_app() -> AppState {
        let repository = MemoryRepository::default();
        for id in ["1", "2"] {
            repository
                .create_room(&Room::new(id.to_string(), format!("Room {}", id)))
                .await
                .unwrap();
        }
        let (outbox, _) =
            MirrorOutbox::new(Arc::new(Box::new(NoopRemoteMirror)), MirrorConfig::default());
        construct_app(
            AppRepositories {
                player_repository: Arc::new(Box::new(repository.clone())),
                room_repository: Arc::new(Box::new(repository.clone())),
                ranking_repository: Arc::new(Box::new(repository.clone())),
                game_repository: Arc::new(Box::new(repository)),
            },
            Arc::new(Box::new(JwtServiceImpl::new(
                b"test-secret",
                chrono::Duration::hours(1),
            ))),
            Arc::new(Box::new(outbox)),
            AppConfig::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use ttt_core::InvalidMoveReason;

    use super::*;

    fn status_of(error: ServiceError) -> StatusCode {
        MyServiceError(error).into_response().status()
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            status_of(ServiceError::AlreadyExists("x".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ServiceError::InvalidCredentials),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(ServiceError::InvalidMove(InvalidMoveReason::CellOccupied)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ServiceError::NotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ServiceError::Conflict("x".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ServiceError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
