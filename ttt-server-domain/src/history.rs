use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;
use ttt_core::{TttBoard, TttMatchResult};
use uuid::Uuid;

use crate::{ServiceError, ServiceResult, player::PlayerUsername, room::RoomId};

pub type GameId = Uuid;

/// A finished match as it is archived.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameRecord {
    pub room_id: RoomId,
    pub players: [PlayerUsername; 2],
    pub board: TttBoard,
    pub result: TttMatchResult,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct GameFilter {
    pub player: Option<PlayerUsername>,
    pub room_id: Option<RoomId>,
    pub pagination: GamePagination,
}

#[derive(Debug, Clone, Default)]
pub struct GamePagination {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

pub struct GameFilterResult {
    pub total_count: usize,
    pub games: Vec<(GameId, GameRecord)>,
}

impl GameFilter {
    pub fn matches(&self, record: &GameRecord) -> bool {
        if let Some(player) = &self.player {
            if !record.players.contains(player) {
                return false;
            }
        }
        if let Some(room_id) = &self.room_id {
            if &record.room_id != room_id {
                return false;
            }
        }
        true
    }

    /// Filters archived games, newest first, then applies pagination.
    pub fn apply(&self, games: Vec<(GameId, GameRecord)>) -> GameFilterResult {
        let mut games: Vec<_> = games
            .into_iter()
            .filter(|(_, record)| self.matches(record))
            .collect();
        games.sort_by(|a, b| b.1.finished_at.cmp(&a.1.finished_at));
        let total_count = games.len();
        let offset = self.pagination.offset.unwrap_or(0);
        let limit = self.pagination.limit.unwrap_or(usize::MAX);
        GameFilterResult {
            total_count,
            games: games.into_iter().skip(offset).take(limit).collect(),
        }
    }
}

pub type ArcGameRepository = Arc<Box<dyn GameRepository + Send + Sync + 'static>>;

#[async_trait::async_trait]
pub trait GameRepository {
    async fn create_game(&self, game: &GameRecord) -> ServiceResult<GameId>;
    async fn get_game_record(&self, id: GameId) -> ServiceResult<Option<GameRecord>>;
    async fn get_games(&self, filter: GameFilter) -> ServiceResult<GameFilterResult>;
}

#[async_trait::async_trait]
pub trait GameHistoryService {
    async fn archive_game(&self, game: GameRecord) -> ServiceResult<GameId>;
    async fn get_game_record(&self, id: GameId) -> ServiceResult<GameRecord>;
    async fn get_games(&self, filter: GameFilter) -> ServiceResult<GameFilterResult>;
}

pub type ArcGameHistoryService = Arc<Box<dyn GameHistoryService + Send + Sync>>;

pub struct GameHistoryServiceImpl {
    game_repository: ArcGameRepository,
}

impl GameHistoryServiceImpl {
    pub fn new(game_repository: ArcGameRepository) -> Self {
        Self { game_repository }
    }
}

#[async_trait::async_trait]
impl GameHistoryService for GameHistoryServiceImpl {
    async fn archive_game(&self, game: GameRecord) -> ServiceResult<GameId> {
        let id = self.game_repository.create_game(&game).await?;
        info!("Archived game {} from room {}", id, game.room_id);
        Ok(id)
    }

    async fn get_game_record(&self, id: GameId) -> ServiceResult<GameRecord> {
        match self.game_repository.get_game_record(id).await? {
            Some(record) => Ok(record),
            None => ServiceError::not_found("Game not found"),
        }
    }

    async fn get_games(&self, filter: GameFilter) -> ServiceResult<GameFilterResult> {
        self.game_repository.get_games(filter).await
    }
}

#[cfg(test)]
#[derive(Clone, Default)]
pub struct MockGameRepository {
    games: Arc<std::sync::Mutex<Vec<(GameId, GameRecord)>>>,
}

#[cfg(test)]
#[async_trait::async_trait]
impl GameRepository for MockGameRepository {
    async fn create_game(&self, game: &GameRecord) -> ServiceResult<GameId> {
        let id = Uuid::new_v4();
        self.games.lock().unwrap().push((id, game.clone()));
        Ok(id)
    }

    async fn get_game_record(&self, id: GameId) -> ServiceResult<Option<GameRecord>> {
        let games = self.games.lock().unwrap();
        Ok(games.iter().find(|(gid, _)| *gid == id).map(|(_, r)| r.clone()))
    }

    async fn get_games(&self, filter: GameFilter) -> ServiceResult<GameFilterResult> {
        Ok(filter.apply(self.games.lock().unwrap().clone()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use ttt_core::TttMark;

    use super::*;

    fn record(room: &str, x: &str, o: &str, minute: u32) -> GameRecord {
        GameRecord {
            room_id: room.to_string(),
            players: [x.to_string(), o.to_string()],
            board: TttBoard::new(),
            result: TttMatchResult::Win(TttMark::X),
            finished_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap(),
        }
    }

    fn history_service() -> GameHistoryServiceImpl {
        GameHistoryServiceImpl::new(Arc::new(Box::new(MockGameRepository::default())))
    }

    #[tokio::test]
    async fn test_archive_and_get() {
        let service = history_service();
        let game = record("1", "alice", "bob", 0);
        let id = service.archive_game(game.clone()).await.unwrap();
        assert_eq!(service.get_game_record(id).await.unwrap(), game);
        assert!(matches!(
            service.get_game_record(Uuid::new_v4()).await,
            Err(ServiceError::NotFound(..))
        ));
    }

    #[tokio::test]
    async fn test_filter_by_player_newest_first() {
        let service = history_service();
        service
            .archive_game(record("1", "alice", "bob", 0))
            .await
            .unwrap();
        service
            .archive_game(record("2", "carol", "dave", 1))
            .await
            .unwrap();
        service
            .archive_game(record("3", "bob", "carol", 2))
            .await
            .unwrap();

        let result = service
            .get_games(GameFilter {
                player: Some("bob".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(result.total_count, 2);
        let rooms: Vec<&str> = result.games.iter().map(|(_, r)| r.room_id.as_str()).collect();
        assert_eq!(rooms, vec!["3", "1"]);
    }

    #[test]
    fn test_pagination() {
        let games: Vec<(GameId, GameRecord)> = (0..5)
            .map(|i| (Uuid::new_v4(), record("1", "alice", "bob", i)))
            .collect();
        let filter = GameFilter {
            pagination: GamePagination {
                offset: Some(1),
                limit: Some(2),
            },
            ..Default::default()
        };
        let result = filter.apply(games);
        assert_eq!(result.total_count, 5);
        let minutes: Vec<u32> = result
            .games
            .iter()
            .map(|(_, r)| chrono::Timelike::minute(&r.finished_at))
            .collect();
        assert_eq!(minutes, vec![3, 2]);
    }
}
