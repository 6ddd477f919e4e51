use std::path::Path;

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Map;
use ttt_core::{BOARD_CELLS, TttBoard, TttMark, TttMatchResult};
use ttt_server_domain::{
    ServiceError, ServiceResult,
    history::{GameFilter, GameFilterResult, GameId, GameRecord, GameRepository},
    mirror::ArcDocumentMirror,
};
use uuid::Uuid;

use crate::{GAMES_FILE, document::JsonDocument};

#[derive(Serialize, Deserialize, Default)]
struct GamesDocument {
    #[serde(default)]
    games: Map<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize)]
struct GameEntry {
    #[serde(default)]
    room_id: String,
    players: Vec<String>,
    board: Vec<String>,
    winner: Option<String>,
    #[serde(default)]
    finished_at: Option<String>,
}

impl GameEntry {
    fn from_record(record: &GameRecord) -> Self {
        GameEntry {
            room_id: record.room_id.clone(),
            players: record.players.to_vec(),
            board: record
                .board
                .cells()
                .iter()
                .map(|cell| cell.map_or(" ".to_string(), |mark| mark.to_string()))
                .collect(),
            winner: Some(match record.result {
                TttMatchResult::Win(mark) => mark.to_string(),
                TttMatchResult::Draw => "draw".to_string(),
            }),
            finished_at: Some(record.finished_at.to_rfc3339()),
        }
    }

    /// `None` for entries that never finished, which older files may contain.
    fn into_record(self) -> Option<GameRecord> {
        let result = match self.winner.as_deref()? {
            "X" => TttMatchResult::Win(TttMark::X),
            "O" => TttMatchResult::Win(TttMark::O),
            "draw" | "Empate" => TttMatchResult::Draw,
            _ => return None,
        };
        let [x_player, o_player]: [String; 2] = self.players.try_into().ok()?;
        if self.board.len() != BOARD_CELLS {
            return None;
        }
        let mut cells = [None; BOARD_CELLS];
        for (cell, value) in cells.iter_mut().zip(self.board.iter()) {
            *cell = match value.trim() {
                "" => None,
                "X" => Some(TttMark::X),
                "O" => Some(TttMark::O),
                _ => return None,
            };
        }
        let finished_at = match self.finished_at {
            Some(value) => DateTime::parse_from_rfc3339(&value)
                .ok()?
                .with_timezone(&Utc),
            None => DateTime::<Utc>::default(),
        };
        Some(GameRecord {
            room_id: self.room_id,
            players: [x_player, o_player],
            board: TttBoard::from_cells(cells),
            result,
            finished_at,
        })
    }
}

fn parse_games(document: GamesDocument) -> Vec<(GameId, GameRecord)> {
    document
        .games
        .into_iter()
        .filter_map(|(id, value)| {
            let Ok(game_id) = Uuid::parse_str(&id) else {
                warn!("Skipping game with invalid id {}", id);
                return None;
            };
            let record = serde_json::from_value::<GameEntry>(value)
                .ok()
                .and_then(GameEntry::into_record);
            if record.is_none() {
                warn!("Skipping unfinished or invalid game {}", id);
            }
            record.map(|record| (game_id, record))
        })
        .collect()
}

pub struct JsonGameRepository {
    document: JsonDocument<GamesDocument>,
}

impl JsonGameRepository {
    pub fn new(data_dir: &Path, mirror: ArcDocumentMirror) -> Self {
        Self {
            document: JsonDocument::new(data_dir, GAMES_FILE, mirror),
        }
    }
}

#[async_trait::async_trait]
impl GameRepository for JsonGameRepository {
    async fn create_game(&self, game: &GameRecord) -> ServiceResult<GameId> {
        let _guard = self.document.lock().await;
        let mut document = self.document.load().await?;
        let id = Uuid::new_v4();
        let entry = serde_json::to_value(GameEntry::from_record(game))
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        document.games.insert(id.to_string(), entry);
        self.document.store(&document).await?;
        Ok(id)
    }

    async fn get_game_record(&self, id: GameId) -> ServiceResult<Option<GameRecord>> {
        let document = self.document.load().await?;
        Ok(parse_games(document)
            .into_iter()
            .find(|(game_id, _)| *game_id == id)
            .map(|(_, record)| record))
    }

    async fn get_games(&self, filter: GameFilter) -> ServiceResult<GameFilterResult> {
        let document = self.document.load().await?;
        Ok(filter.apply(parse_games(document)))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::test_util::{RecordingMirror, temp_data_dir};

    fn record(x: &str, o: &str) -> GameRecord {
        let mut board = TttBoard::new();
        for (cell, mark) in [(0, TttMark::X), (3, TttMark::O), (1, TttMark::X)] {
            board.do_place(cell, mark).unwrap();
        }
        GameRecord {
            room_id: "1".to_string(),
            players: [x.to_string(), o.to_string()],
            board,
            result: TttMatchResult::Win(TttMark::X),
            finished_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_game() {
        let dir = temp_data_dir();
        let mirror = RecordingMirror::default();
        let repository = JsonGameRepository::new(&dir, mirror.arc());
        let game = record("alice", "bob");
        let id = repository.create_game(&game).await.unwrap();

        let reopened = JsonGameRepository::new(&dir, mirror.arc());
        assert_eq!(reopened.get_game_record(id).await.unwrap(), Some(game));
        assert_eq!(reopened.get_game_record(Uuid::new_v4()).await.unwrap(), None);
        assert_eq!(mirror.paths(), vec![GAMES_FILE]);
    }

    #[tokio::test]
    async fn test_filter_games() {
        let dir = temp_data_dir();
        let repository = JsonGameRepository::new(&dir, RecordingMirror::default().arc());
        repository.create_game(&record("alice", "bob")).await.unwrap();
        repository.create_game(&record("carol", "dave")).await.unwrap();

        let result = repository
            .get_games(GameFilter {
                player: Some("dave".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(result.total_count, 1);
        assert_eq!(result.games[0].1.players[0], "carol");
    }

    #[tokio::test]
    async fn test_unfinished_legacy_games_are_skipped() {
        let dir = temp_data_dir();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(GAMES_FILE),
            r#"{
    "games": {
        "5f0c6a8e-2b7d-4c55-9a43-0d6f3c1f9b11": {
            "board": [" ", " ", " ", " ", " ", " ", " ", " ", " "],
            "current_player": "X",
            "players": ["joao", "maria"],
            "winner": null
        },
        "0b9f7c1e-8a51-4b8e-b0a2-3c9d6e2f4a77": {
            "board": ["X", "X", "X", "O", "O", " ", " ", " ", " "],
            "current_player": "O",
            "players": ["joao", "maria"],
            "winner": "X"
        }
    }
}"#,
        )
        .unwrap();
        let repository = JsonGameRepository::new(&dir, RecordingMirror::default().arc());
        let result = repository.get_games(GameFilter::default()).await.unwrap();
        assert_eq!(result.total_count, 1);
        let (_, game) = &result.games[0];
        assert_eq!(game.result, TttMatchResult::Win(TttMark::X));
        assert_eq!(game.room_id, "");
        assert_eq!(game.finished_at, DateTime::<Utc>::default());
    }
}
