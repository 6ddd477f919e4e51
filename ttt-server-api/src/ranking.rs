use axum::{
    Json,
    extract::{Path, State},
};
use log::info;
use serde::{Deserialize, Serialize};
use ttt_server_domain::{
    ServiceError,
    app::AppState,
    player::PlayerUsername,
    ranking::{MatchOutcome, RankingEntry, Standing},
};

use crate::{MyServiceError, jwt::Session};

#[derive(Serialize)]
pub struct RankingEntryResponse {
    position: Option<usize>,
    player: PlayerUsername,
    points: u32,
    wins: u32,
    draws: u32,
    losses: u32,
}

impl RankingEntryResponse {
    fn new(position: Option<usize>, player: PlayerUsername, entry: RankingEntry) -> Self {
        Self {
            position,
            player,
            points: entry.points,
            wins: entry.wins,
            draws: entry.draws,
            losses: entry.losses,
        }
    }
}

impl From<Standing> for RankingEntryResponse {
    fn from(standing: Standing) -> Self {
        Self::new(Some(standing.position), standing.player, standing.entry)
    }
}

#[derive(Deserialize)]
pub struct RecordResultRequest {
    pub player: PlayerUsername,
    pub outcome: String,
}

pub async fn get_ranking(
    State(app): State<AppState>,
) -> Result<Json<Vec<RankingEntryResponse>>, MyServiceError> {
    let ranking = app.ranking_service.get_ranking().await?;
    Ok(Json(
        ranking.into_iter().map(RankingEntryResponse::from).collect(),
    ))
}

pub async fn get_entry(
    Path(name): Path<PlayerUsername>,
    State(app): State<AppState>,
) -> Result<Json<RankingEntryResponse>, MyServiceError> {
    let ranking = app.ranking_service.get_ranking().await?;
    match ranking.into_iter().find(|s| s.player == name) {
        Some(standing) => Ok(Json(standing.into())),
        None => Err(ServiceError::NotFound(format!("{} has no ranking entry", name)).into()),
    }
}

pub async fn record_result(
    Session(session): Session,
    State(app): State<AppState>,
    Json(request): Json<RecordResultRequest>,
) -> Result<Json<RankingEntryResponse>, MyServiceError> {
    let outcome: MatchOutcome = request.outcome.parse()?;
    app.ranking_service
        .record_result(&request.player, outcome)
        .await?;
    info!(
        "{} recorded {:?} for {}",
        session.username, outcome, request.player
    );
    let entry = app.ranking_service.get_entry(&request.player).await?;
    Ok(Json(RankingEntryResponse::new(None, request.player, entry)))
}
