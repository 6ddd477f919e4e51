use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use ttt_core::{TttMark, TttMatchResult, TttMatchState};
use ttt_server_domain::{
    app::AppState,
    player::PlayerUsername,
    room::{Room, RoomId},
};

use crate::{MyServiceError, jwt::Session};

const ACCESS_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) fn mark_label(mark: Option<TttMark>) -> String {
    mark.map_or(" ".to_string(), |m| m.to_string())
}

pub(crate) fn result_label(result: TttMatchResult) -> String {
    match result {
        TttMatchResult::Win(mark) => mark.to_string(),
        TttMatchResult::Draw => "draw".to_string(),
    }
}

fn state_label(state: TttMatchState) -> &'static str {
    match state {
        TttMatchState::Waiting => "waiting",
        TttMatchState::InProgress => "in_progress",
        TttMatchState::Finished(_) => "finished",
    }
}

#[derive(Serialize)]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub name: String,
    pub players: [Option<PlayerUsername>; 2],
    pub viewers: usize,
    pub state: &'static str,
    pub can_play: bool,
    pub can_view: bool,
}

impl From<&Room> for RoomSummary {
    fn from(room: &Room) -> Self {
        RoomSummary {
            room_id: room.id.clone(),
            name: room.name.clone(),
            players: room.game.players().clone(),
            viewers: room.viewers.len(),
            state: state_label(room.game.state()),
            can_play: room.can_play(),
            can_view: true,
        }
    }
}

#[derive(Serialize)]
pub struct AccessLogView {
    pub username: PlayerUsername,
    pub role: String,
    pub access_time: String,
    pub exit_time: Option<String>,
}

#[derive(Serialize)]
pub struct RoomView {
    pub room_id: RoomId,
    pub name: String,
    pub players: [Option<PlayerUsername>; 2],
    pub viewers: Vec<PlayerUsername>,
    pub board: Vec<String>,
    pub current_player: String,
    pub state: &'static str,
    pub winner: Option<String>,
    pub access_log: Vec<AccessLogView>,
    pub revision: u64,
}

impl From<&Room> for RoomView {
    fn from(room: &Room) -> Self {
        RoomView {
            room_id: room.id.clone(),
            name: room.name.clone(),
            players: room.game.players().clone(),
            viewers: room.viewers.clone(),
            board: room
                .game
                .board()
                .cells()
                .iter()
                .map(|cell| mark_label(*cell))
                .collect(),
            current_player: room.game.current_player().to_string(),
            state: state_label(room.game.state()),
            winner: room.game.result().map(result_label),
            access_log: room
                .access_log
                .iter()
                .map(|entry| AccessLogView {
                    username: entry.username.clone(),
                    role: entry.role.to_string(),
                    access_time: entry.access_time.format(ACCESS_TIME_FORMAT).to_string(),
                    exit_time: entry
                        .exit_time
                        .map(|t| t.format(ACCESS_TIME_FORMAT).to_string()),
                })
                .collect(),
            revision: room.revision,
        }
    }
}

#[derive(Serialize)]
pub struct JoinResponse {
    pub joined: bool,
    pub role: Option<String>,
}

#[derive(Serialize)]
pub struct ViewResponse {
    pub viewing: bool,
}

#[derive(Serialize)]
pub struct LeaveResponse {
    pub left: bool,
}

#[derive(Deserialize)]
pub struct MoveRequest {
    pub cell: usize,
}

pub async fn list_rooms(
    State(app): State<AppState>,
) -> Result<Json<Vec<RoomSummary>>, MyServiceError> {
    let rooms = app.room_service.list_rooms().await?;
    Ok(Json(rooms.iter().map(RoomSummary::from).collect()))
}

pub async fn get_room(
    Path(id): Path<RoomId>,
    State(app): State<AppState>,
) -> Result<Json<RoomView>, MyServiceError> {
    let room = app.room_service.get_room(&id).await?;
    Ok(Json(RoomView::from(&room)))
}

pub async fn join_room(
    Path(id): Path<RoomId>,
    Session(session): Session,
    State(app): State<AppState>,
) -> Result<Json<JoinResponse>, MyServiceError> {
    let role = app.room_service.join_room(&id, &session.username).await?;
    Ok(Json(JoinResponse {
        joined: role.is_some(),
        role: role.map(|r| r.to_string()),
    }))
}

pub async fn view_room(
    Path(id): Path<RoomId>,
    Session(session): Session,
    State(app): State<AppState>,
) -> Result<Json<ViewResponse>, MyServiceError> {
    let viewing = app.room_service.view_room(&id, &session.username).await?;
    Ok(Json(ViewResponse { viewing }))
}

pub async fn leave_room(
    Path(id): Path<RoomId>,
    Session(session): Session,
    State(app): State<AppState>,
) -> Result<Json<LeaveResponse>, MyServiceError> {
    let left = app.room_service.leave_room(&id, &session.username).await?;
    Ok(Json(LeaveResponse { left }))
}

pub async fn apply_move(
    Path(id): Path<RoomId>,
    Session(session): Session,
    State(app): State<AppState>,
    Json(request): Json<MoveRequest>,
) -> Result<Json<RoomView>, MyServiceError> {
    let room = app
        .room_service
        .apply_move(&id, &session.username, request.cell)
        .await?;
    Ok(Json(RoomView::from(&room)))
}

pub async fn reset_board(
    Path(id): Path<RoomId>,
    Session(session): Session,
    State(app): State<AppState>,
) -> Result<Json<RoomView>, MyServiceError> {
    let room = app.room_service.reset_board(&id, &session.username).await?;
    Ok(Json(RoomView::from(&room)))
}

#[cfg(test)]
mod tests {
    use ttt_core::InvalidMoveReason;
    use ttt_server_domain::{ServiceError, session::SessionContext};

    use super::*;
    use crate::test_util::test_app;

    fn session(username: &str) -> Session {
        Session(SessionContext::new(username.to_string()))
    }

    fn room_path() -> Path<RoomId> {
        Path("1".to_string())
    }

    #[tokio::test]
    async fn test_room_list_gating() {
        let app = test_app().await;
        for name in ["alice", "bob"] {
            join_room(room_path(), session(name), State(app.clone()))
                .await
                .unwrap();
        }
        let Json(rooms) = list_rooms(State(app.clone())).await.unwrap();
        assert_eq!(rooms.len(), 2);
        assert!(!rooms[0].can_play);
        assert!(rooms[0].can_view);
        assert_eq!(rooms[0].state, "in_progress");
        assert!(rooms[1].can_play);
        assert_eq!(rooms[1].state, "waiting");
    }

    #[tokio::test]
    async fn test_join_twice() {
        let app = test_app().await;
        let Json(first) = join_room(room_path(), session("alice"), State(app.clone()))
            .await
            .unwrap();
        assert!(first.joined);
        assert_eq!(first.role.as_deref(), Some("Player"));
        let Json(second) = join_room(room_path(), session("alice"), State(app.clone()))
            .await
            .unwrap();
        assert!(!second.joined);
        assert_eq!(second.role, None);
    }

    #[tokio::test]
    async fn test_view_room_with_free_seat() {
        let app = test_app().await;
        join_room(room_path(), session("alice"), State(app.clone()))
            .await
            .unwrap();
        let Json(viewed) = view_room(room_path(), session("carol"), State(app.clone()))
            .await
            .unwrap();
        assert!(viewed.viewing);

        let Json(view) = get_room(room_path(), State(app.clone())).await.unwrap();
        assert_eq!(view.players, [Some("alice".to_string()), None]);
        assert_eq!(view.viewers, vec!["carol".to_string()]);
        assert_eq!(view.access_log[1].role, "Viewer");

        let Json(rooms) = list_rooms(State(app.clone())).await.unwrap();
        assert!(rooms[0].can_play);
        assert_eq!(rooms[0].viewers, 1);
    }

    #[tokio::test]
    async fn test_play_a_match() {
        let app = test_app().await;
        for name in ["alice", "bob"] {
            join_room(room_path(), session(name), State(app.clone()))
                .await
                .unwrap();
        }
        let moves = [("alice", 0), ("bob", 3), ("alice", 1), ("bob", 4)];
        for (name, cell) in moves {
            apply_move(
                room_path(),
                session(name),
                State(app.clone()),
                Json(MoveRequest { cell }),
            )
            .await
            .unwrap();
        }

        let occupied = apply_move(
            room_path(),
            session("alice"),
            State(app.clone()),
            Json(MoveRequest { cell: 4 }),
        )
        .await;
        assert!(matches!(
            occupied,
            Err(MyServiceError(ServiceError::InvalidMove(
                InvalidMoveReason::CellOccupied
            )))
        ));

        let Json(view) = apply_move(
            room_path(),
            session("alice"),
            State(app.clone()),
            Json(MoveRequest { cell: 2 }),
        )
        .await
        .unwrap();
        assert_eq!(view.state, "finished");
        assert_eq!(view.winner.as_deref(), Some("X"));
        assert_eq!(
            view.board,
            vec!["X", "X", "X", "O", "O", " ", " ", " ", " "]
        );

        let Json(view) = reset_board(room_path(), session("bob"), State(app.clone()))
            .await
            .unwrap();
        assert_eq!(view.state, "in_progress");
        assert_eq!(view.winner, None);
    }

    #[tokio::test]
    async fn test_leave_and_unknown_room() {
        let app = test_app().await;
        join_room(room_path(), session("alice"), State(app.clone()))
            .await
            .unwrap();
        let Json(left) = leave_room(room_path(), session("alice"), State(app.clone()))
            .await
            .unwrap();
        assert!(left.left);

        let Json(view) = get_room(room_path(), State(app.clone())).await.unwrap();
        assert_eq!(view.players, [None, None]);
        assert_eq!(view.access_log.len(), 1);
        assert!(view.access_log[0].exit_time.is_some());

        assert!(matches!(
            get_room(Path("99".to_string()), State(app.clone())).await,
            Err(MyServiceError(ServiceError::NotFound(..)))
        ));
    }
}
