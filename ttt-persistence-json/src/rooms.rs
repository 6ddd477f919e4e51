use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use ttt_core::{BOARD_CELLS, TttBoard, TttMark, TttMatch, TttMatchResult};
use ttt_server_domain::{
    ServiceError, ServiceResult,
    mirror::ArcDocumentMirror,
    room::{AccessLogEntry, Room, RoomId, RoomRepository, RoomRole},
};

use crate::{ROOMS_FILE, document::JsonDocument};

const LEGACY_EMPTY_SLOT: &str = "Aguardando jogador...";
const LEGACY_DRAW: &str = "Empate";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Serialize, Deserialize, Default)]
struct RoomsDocument {
    #[serde(default)]
    rooms: Vec<RoomEntry>,
}

#[derive(Serialize, Deserialize, Clone)]
struct RoomEntry {
    #[serde(deserialize_with = "room_id_from_string_or_number")]
    room_id: String,
    name: String,
    #[serde(default)]
    players: Vec<Option<String>>,
    #[serde(default)]
    viewers: Vec<String>,
    #[serde(default)]
    board: Vec<String>,
    #[serde(default = "first_mark")]
    current_player: String,
    #[serde(default)]
    winner: Option<String>,
    #[serde(default)]
    access_log: Vec<AccessLogRecord>,
    #[serde(default)]
    revision: u64,
    #[serde(default)]
    result_recorded: bool,
}

#[derive(Serialize, Deserialize, Clone)]
struct AccessLogRecord {
    username: String,
    status: String,
    access_time: String,
    exit_time: Option<String>,
}

fn first_mark() -> String {
    TttMark::X.to_string()
}

fn room_id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(id) => id,
        RawId::Number(id) => id.to_string(),
    })
}

fn corrupt<T>(room_id: &str, what: &str) -> ServiceResult<T> {
    ServiceError::internal(format!("Room {} has an invalid {}", room_id, what))
}

fn parse_mark(value: &str) -> Option<Option<TttMark>> {
    match value.trim() {
        "" => Some(None),
        "X" => Some(Some(TttMark::X)),
        "O" => Some(Some(TttMark::O)),
        _ => None,
    }
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).ok()
}

fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

impl RoomEntry {
    fn into_room(self) -> ServiceResult<Room> {
        let id = self.room_id;

        let players: Vec<Option<String>> = self
            .players
            .into_iter()
            .map(|slot| slot.filter(|name| name != LEGACY_EMPTY_SLOT && !name.is_empty()))
            .collect();
        let players: [Option<String>; 2] = match players.len() {
            0 => [None, None],
            2 => [players[0].clone(), players[1].clone()],
            _ => return corrupt(&id, "player list"),
        };

        let mut cells = [None; BOARD_CELLS];
        if !self.board.is_empty() {
            if self.board.len() != BOARD_CELLS {
                return corrupt(&id, "board");
            }
            for (cell, value) in cells.iter_mut().zip(self.board.iter()) {
                match parse_mark(value) {
                    Some(mark) => *cell = mark,
                    None => return corrupt(&id, "board"),
                }
            }
        }

        let Some(Some(current_player)) = parse_mark(&self.current_player) else {
            return corrupt(&id, "current player");
        };

        let result = match self.winner.as_deref() {
            None => None,
            Some("X") => Some(TttMatchResult::Win(TttMark::X)),
            Some("O") => Some(TttMatchResult::Win(TttMark::O)),
            Some("draw") | Some(LEGACY_DRAW) => Some(TttMatchResult::Draw),
            Some(_) => return corrupt(&id, "winner"),
        };

        let mut access_log = Vec::with_capacity(self.access_log.len());
        for record in self.access_log {
            let role = match record.status.as_str() {
                "Player" | "Jogador" => RoomRole::Player,
                "Viewer" | "Visualizador" => RoomRole::Viewer,
                _ => return corrupt(&id, "access log status"),
            };
            let Some(access_time) = parse_timestamp(&record.access_time) else {
                return corrupt(&id, "access time");
            };
            let exit_time = match record.exit_time {
                Some(exit_time) => match parse_timestamp(&exit_time) {
                    Some(time) => Some(time),
                    None => return corrupt(&id, "exit time"),
                },
                None => None,
            };
            access_log.push(AccessLogEntry {
                username: record.username,
                role,
                access_time,
                exit_time,
            });
        }

        Ok(Room {
            id,
            name: self.name,
            game: TttMatch::from_parts(
                players,
                TttBoard::from_cells(cells),
                current_player,
                result,
            ),
            viewers: self.viewers,
            access_log,
            revision: self.revision,
            result_recorded: self.result_recorded,
        })
    }

    fn from_room(room: &Room) -> Self {
        RoomEntry {
            room_id: room.id.clone(),
            name: room.name.clone(),
            players: room.game.players().to_vec(),
            viewers: room.viewers.clone(),
            board: room
                .game
                .board()
                .cells()
                .iter()
                .map(|cell| match cell {
                    Some(mark) => mark.to_string(),
                    None => " ".to_string(),
                })
                .collect(),
            current_player: room.game.current_player().to_string(),
            winner: room.game.result().map(|result| match result {
                TttMatchResult::Win(mark) => mark.to_string(),
                TttMatchResult::Draw => "draw".to_string(),
            }),
            access_log: room
                .access_log
                .iter()
                .map(|entry| AccessLogRecord {
                    username: entry.username.clone(),
                    status: entry.role.to_string(),
                    access_time: format_timestamp(&entry.access_time),
                    exit_time: entry.exit_time.as_ref().map(format_timestamp),
                })
                .collect(),
            revision: room.revision,
            result_recorded: room.result_recorded,
        }
    }
}

pub struct JsonRoomRepository {
    document: JsonDocument<RoomsDocument>,
}

impl JsonRoomRepository {
    pub fn new(data_dir: &Path, mirror: ArcDocumentMirror) -> Self {
        Self {
            document: JsonDocument::new(data_dir, ROOMS_FILE, mirror),
        }
    }
}

#[async_trait::async_trait]
impl RoomRepository for JsonRoomRepository {
    async fn get_rooms(&self) -> ServiceResult<Vec<Room>> {
        let document = self.document.load().await?;
        document
            .rooms
            .into_iter()
            .map(RoomEntry::into_room)
            .collect()
    }

    async fn get_room(&self, id: &RoomId) -> ServiceResult<Option<Room>> {
        let document = self.document.load().await?;
        document
            .rooms
            .into_iter()
            .find(|entry| &entry.room_id == id)
            .map(RoomEntry::into_room)
            .transpose()
    }

    async fn create_room(&self, room: &Room) -> ServiceResult<()> {
        let _guard = self.document.lock().await;
        let mut document = self.document.load().await?;
        if document.rooms.iter().any(|entry| entry.room_id == room.id) {
            return ServiceError::already_exists(format!("Room {} already exists", room.id));
        }
        document.rooms.push(RoomEntry::from_room(room));
        self.document.store(&document).await
    }

    async fn update_room(&self, room: &Room) -> ServiceResult<u64> {
        let _guard = self.document.lock().await;
        let mut document = self.document.load().await?;
        let Some(stored) = document
            .rooms
            .iter_mut()
            .find(|entry| entry.room_id == room.id)
        else {
            return ServiceError::not_found(format!("Room {} not found", room.id));
        };
        if stored.revision != room.revision {
            return ServiceError::conflict(format!(
                "Room {} was modified concurrently (revision {} != {})",
                room.id, stored.revision, room.revision
            ));
        }
        let revision = room.revision + 1;
        *stored = RoomEntry::from_room(room);
        stored.revision = revision;
        self.document.store(&document).await?;
        Ok(revision)
    }
}
