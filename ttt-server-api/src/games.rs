use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use ttt_server_domain::{
    ServiceError,
    app::AppState,
    history::{GameFilter, GameId, GamePagination, GameRecord},
    player::PlayerUsername,
    room::RoomId,
};

use crate::{
    MyServiceError, PaginatedResponse,
    rooms::{mark_label, result_label},
};

const DEFAULT_LIMIT: usize = 50;

#[derive(Deserialize, Default)]
pub struct GamesQuery {
    pub player: Option<PlayerUsername>,
    pub room: Option<RoomId>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct GameResponse {
    game_id: String,
    room_id: RoomId,
    players: [PlayerUsername; 2],
    board: Vec<String>,
    winner: String,
    finished_at: String,
}

impl GameResponse {
    fn new(id: GameId, record: GameRecord) -> Self {
        Self {
            game_id: id.to_string(),
            room_id: record.room_id,
            players: record.players,
            board: record
                .board
                .cells()
                .iter()
                .map(|cell| mark_label(*cell))
                .collect(),
            winner: result_label(record.result),
            finished_at: record.finished_at.to_rfc3339(),
        }
    }
}

pub async fn get_games(
    State(app): State<AppState>,
    Query(query): Query<GamesQuery>,
) -> Result<Json<PaginatedResponse<GameResponse>>, MyServiceError> {
    let offset = query.offset.unwrap_or(0);
    let limit = query.limit.filter(|&l| l > 0).unwrap_or(DEFAULT_LIMIT);
    let filter = GameFilter {
        player: query.player,
        room_id: query.room,
        pagination: GamePagination {
            offset: Some(offset),
            limit: Some(limit),
        },
    };
    let result = app.game_history_service.get_games(filter).await?;
    Ok(Json(PaginatedResponse {
        items: result
            .games
            .into_iter()
            .map(|(id, record)| GameResponse::new(id, record))
            .collect(),
        total: result.total_count,
        offset,
    }))
}

pub async fn get_game(
    Path(id): Path<String>,
    State(app): State<AppState>,
) -> Result<Json<GameResponse>, MyServiceError> {
    let id = GameId::parse_str(&id)
        .map_err(|_| ServiceError::BadRequest(format!("Invalid game id: {}", id)))?;
    let record = app.game_history_service.get_game_record(id).await?;
    Ok(Json(GameResponse::new(id, record)))
}
