use std::{fmt::Display, sync::Arc};

use chrono::{Local, NaiveDateTime, Utc};
use dashmap::DashMap;
use log::{debug, error, info};
use tokio::sync::Mutex;
use ttt_core::{TttMatch, TttMatchResult};

use crate::{
    ServiceError, ServiceResult,
    history::{ArcGameHistoryService, GameRecord},
    player::PlayerUsername,
    ranking::ArcRankingService,
    session::ArcSessionService,
};

pub type RoomId = String;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoomRole {
    Player,
    Viewer,
}

impl Display for RoomRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoomRole::Player => write!(f, "Player"),
            RoomRole::Viewer => write!(f, "Viewer"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessLogEntry {
    pub username: PlayerUsername,
    pub role: RoomRole,
    pub access_time: NaiveDateTime,
    pub exit_time: Option<NaiveDateTime>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub game: TttMatch,
    pub viewers: Vec<PlayerUsername>,
    pub access_log: Vec<AccessLogEntry>,
    /// Bumped by the store on every successful write.
    pub revision: u64,
    pub result_recorded: bool,
}

impl Room {
    pub fn new(id: RoomId, name: String) -> Self {
        Room {
            id,
            name,
            game: TttMatch::new(),
            viewers: Vec::new(),
            access_log: Vec::new(),
            revision: 0,
            result_recorded: false,
        }
    }

    pub fn role_of(&self, username: &str) -> Option<RoomRole> {
        if self.game.mark_of(username).is_some() {
            Some(RoomRole::Player)
        } else if self.viewers.iter().any(|v| v == username) {
            Some(RoomRole::Viewer)
        } else {
            None
        }
    }

    pub fn can_play(&self) -> bool {
        self.game.has_free_seat()
    }

    /// Seats the user if a slot is free, otherwise adds them as a viewer.
    /// Returns `None` if the user is already in the room.
    pub fn join(&mut self, username: &PlayerUsername, now: NaiveDateTime) -> Option<RoomRole> {
        if self.role_of(username).is_some() {
            return None;
        }
        let role = match self.game.take_seat(username.clone()) {
            Some(_) => RoomRole::Player,
            None => {
                self.viewers.push(username.clone());
                RoomRole::Viewer
            }
        };
        self.log_access(username, role, now);
        Some(role)
    }

    /// Adds the user as a viewer without taking a free slot.
    /// Returns `false` if the user is already in the room.
    pub fn view(&mut self, username: &PlayerUsername, now: NaiveDateTime) -> bool {
        if self.role_of(username).is_some() {
            return false;
        }
        self.viewers.push(username.clone());
        self.log_access(username, RoomRole::Viewer, now);
        true
    }

    fn log_access(&mut self, username: &PlayerUsername, role: RoomRole, now: NaiveDateTime) {
        self.access_log.push(AccessLogEntry {
            username: username.clone(),
            role,
            access_time: now,
            exit_time: None,
        });
    }

    /// Frees the user's slot or viewer place. Board and turn stay as they are.
    pub fn leave(&mut self, username: &str, now: NaiveDateTime) -> Option<RoomRole> {
        let role = self.role_of(username)?;
        match role {
            RoomRole::Player => {
                self.game.release_seat(username);
            }
            RoomRole::Viewer => self.viewers.retain(|v| v != username),
        }
        if let Some(entry) = self
            .access_log
            .iter_mut()
            .rev()
            .find(|e| e.username == username && e.exit_time.is_none())
        {
            entry.exit_time = Some(now);
        }
        Some(role)
    }

    pub fn can_reset(&self) -> bool {
        self.game.is_finished() || self.game.board().is_empty()
    }

    pub fn reset(&mut self) {
        self.game.reset();
        self.result_recorded = false;
    }
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

pub type ArcRoomRepository = Arc<Box<dyn RoomRepository + Send + Sync + 'static>>;

#[async_trait::async_trait]
pub trait RoomRepository {
    async fn get_rooms(&self) -> ServiceResult<Vec<Room>>;
    async fn get_room(&self, id: &RoomId) -> ServiceResult<Option<Room>>;
    async fn create_room(&self, room: &Room) -> ServiceResult<()>;
    /// Stores the room if the stored revision still equals `room.revision`,
    /// otherwise fails with `Conflict`. Returns the new revision.
    async fn update_room(&self, room: &Room) -> ServiceResult<u64>;
}

pub type ArcRoomService = Arc<Box<dyn RoomService + Send + Sync + 'static>>;

#[async_trait::async_trait]
pub trait RoomService {
    async fn list_rooms(&self) -> ServiceResult<Vec<Room>>;
    async fn get_room(&self, id: &RoomId) -> ServiceResult<Room>;
    async fn create_room(&self, id: &RoomId, name: &str) -> ServiceResult<Room>;
    async fn join_room(
        &self,
        id: &RoomId,
        username: &PlayerUsername,
    ) -> ServiceResult<Option<RoomRole>>;
    async fn view_room(&self, id: &RoomId, username: &PlayerUsername) -> ServiceResult<bool>;
    async fn leave_room(&self, id: &RoomId, username: &PlayerUsername) -> ServiceResult<bool>;
    async fn apply_move(
        &self,
        id: &RoomId,
        username: &PlayerUsername,
        cell: usize,
    ) -> ServiceResult<Room>;
    async fn reset_board(&self, id: &RoomId, username: &PlayerUsername) -> ServiceResult<Room>;
}

pub struct RoomServiceImpl {
    room_repository: ArcRoomRepository,
    game_history_service: ArcGameHistoryService,
    ranking_service: ArcRankingService,
    session_service: ArcSessionService,
    auto_record_results: bool,
    room_locks: DashMap<RoomId, Arc<Mutex<()>>>,
}

impl RoomServiceImpl {
    pub fn new(
        room_repository: ArcRoomRepository,
        game_history_service: ArcGameHistoryService,
        ranking_service: ArcRankingService,
        session_service: ArcSessionService,
        auto_record_results: bool,
    ) -> Self {
        Self {
            room_repository,
            game_history_service,
            ranking_service,
            session_service,
            auto_record_results,
            room_locks: DashMap::new(),
        }
    }

    fn room_lock(&self, id: &RoomId) -> Arc<Mutex<()>> {
        self.room_locks.entry(id.clone()).or_default().value().clone()
    }

    async fn load_room(&self, id: &RoomId) -> ServiceResult<Room> {
        match self.room_repository.get_room(id).await? {
            Some(room) => Ok(room),
            None => ServiceError::not_found(format!("Room {} not found", id)),
        }
    }

    /// Runs `f` on a fresh copy of the room under the room's lock and writes
    /// the room back if `f` changed it.
    async fn mutate<T, F>(&self, id: &RoomId, f: F) -> ServiceResult<(Room, T)>
    where
        F: FnOnce(&mut Room) -> ServiceResult<T> + Send,
        T: Send,
    {
        let lock = self.room_lock(id);
        let _guard = lock.lock().await;
        let original = self.load_room(id).await?;
        let mut room = original.clone();
        let value = f(&mut room)?;
        if room != original {
            room.revision = self.room_repository.update_room(&room).await?;
        }
        Ok((room, value))
    }

    async fn on_match_finished(
        &self,
        room: &Room,
        result: TttMatchResult,
        record_ranking: bool,
    ) {
        let [Some(x_player), Some(o_player)] = room.game.players().clone() else {
            error!("Room {} finished without two players", room.id);
            return;
        };
        let players = [x_player, o_player];
        info!(
            "Match in room {} finished: {} ({} vs {})",
            room.id, result, players[0], players[1]
        );

        let record = GameRecord {
            room_id: room.id.clone(),
            players: players.clone(),
            board: room.game.board().clone(),
            result,
            finished_at: Utc::now(),
        };
        if let Err(e) = self.game_history_service.archive_game(record).await {
            error!("Failed to archive game from room {}: {}", room.id, e);
        }

        if record_ranking {
            if let Err(e) = self
                .ranking_service
                .record_match_result(result, &players)
                .await
            {
                error!("Failed to record ranking for room {}: {}", room.id, e);
            }
        }
    }
}

#[async_trait::async_trait]
impl RoomService for RoomServiceImpl {
    async fn list_rooms(&self) -> ServiceResult<Vec<Room>> {
        self.room_repository.get_rooms().await
    }

    async fn get_room(&self, id: &RoomId) -> ServiceResult<Room> {
        self.load_room(id).await
    }

    async fn create_room(&self, id: &RoomId, name: &str) -> ServiceResult<Room> {
        if id.trim().is_empty() || name.trim().is_empty() {
            return ServiceError::bad_request("Room id and name must not be empty");
        }
        let room = Room::new(id.clone(), name.to_string());
        self.room_repository.create_room(&room).await?;
        info!("Created room {} ({})", id, name);
        Ok(room)
    }

    async fn join_room(
        &self,
        id: &RoomId,
        username: &PlayerUsername,
    ) -> ServiceResult<Option<RoomRole>> {
        let (_, role) = self
            .mutate(id, |room| Ok(room.join(username, local_now())))
            .await?;
        match role {
            Some(role) => {
                self.session_service.enter_room(username, id);
                info!("{} joined room {} as {}", username, id, role);
            }
            None => debug!("{} is already in room {}", username, id),
        }
        Ok(role)
    }

    async fn view_room(&self, id: &RoomId, username: &PlayerUsername) -> ServiceResult<bool> {
        let (_, added) = self
            .mutate(id, |room| Ok(room.view(username, local_now())))
            .await?;
        if added {
            self.session_service.enter_room(username, id);
            info!("{} is viewing room {}", username, id);
        } else {
            debug!("{} is already in room {}", username, id);
        }
        Ok(added)
    }

    async fn leave_room(&self, id: &RoomId, username: &PlayerUsername) -> ServiceResult<bool> {
        let (_, role) = self
            .mutate(id, |room| Ok(room.leave(username, local_now())))
            .await?;
        self.session_service.exit_room(username, id);
        match role {
            Some(role) => {
                info!("{} left room {} ({})", username, id, role);
                Ok(true)
            }
            None => {
                debug!("{} tried to leave room {} without being in it", username, id);
                Ok(false)
            }
        }
    }

    async fn apply_move(
        &self,
        id: &RoomId,
        username: &PlayerUsername,
        cell: usize,
    ) -> ServiceResult<Room> {
        let auto_record = self.auto_record_results;
        let lock = self.room_lock(id);
        let _guard = lock.lock().await;

        let mut room = self.load_room(id).await?;
        let record = match room.game.apply_move(username, cell) {
            Ok(record) => record,
            Err(reason) => {
                debug!("Rejected move by {} in room {}: {}", username, id, reason);
                return Err(reason.into());
            }
        };
        let record_ranking = record.result.is_some() && auto_record && !room.result_recorded;
        if record_ranking {
            room.result_recorded = true;
        }
        room.revision = self.room_repository.update_room(&room).await?;

        if let Some(result) = record.result {
            self.on_match_finished(&room, result, record_ranking).await;
        }
        Ok(room)
    }

    async fn reset_board(&self, id: &RoomId, username: &PlayerUsername) -> ServiceResult<Room> {
        let (room, _) = self
            .mutate(id, |room| {
                if room.role_of(username) != Some(RoomRole::Player) {
                    return ServiceError::bad_request("Only players can reset the board");
                }
                if !room.can_reset() {
                    return ServiceError::bad_request("The match is still in progress");
                }
                room.reset();
                Ok(())
            })
            .await?;
        info!("{} reset the board in room {}", username, id);
        Ok(room)
    }
}

#[cfg(test)]
#[derive(Clone, Default)]
pub struct MockRoomRepository {
    rooms: Arc<std::sync::Mutex<Vec<Room>>>,
}

#[cfg(test)]
#[async_trait::async_trait]
impl RoomRepository for MockRoomRepository {
    async fn get_rooms(&self) -> ServiceResult<Vec<Room>> {
        Ok(self.rooms.lock().unwrap().clone())
    }

    async fn get_room(&self, id: &RoomId) -> ServiceResult<Option<Room>> {
        let rooms = self.rooms.lock().unwrap();
        Ok(rooms.iter().find(|r| &r.id == id).cloned())
    }

    async fn create_room(&self, room: &Room) -> ServiceResult<()> {
        let mut rooms = self.rooms.lock().unwrap();
        if rooms.iter().any(|r| r.id == room.id) {
            return ServiceError::already_exists("Room already exists");
        }
        rooms.push(room.clone());
        Ok(())
    }

    async fn update_room(&self, room: &Room) -> ServiceResult<u64> {
        let mut rooms = self.rooms.lock().unwrap();
        let Some(stored) = rooms.iter_mut().find(|r| r.id == room.id) else {
            return ServiceError::not_found("Room not found");
        };
        if stored.revision != room.revision {
            return ServiceError::conflict("Room was modified concurrently");
        }
        *stored = room.clone();
        stored.revision += 1;
        Ok(stored.revision)
    }
}
