use std::sync::Arc;

use crate::{
    history::{ArcGameHistoryService, ArcGameRepository, GameHistoryServiceImpl},
    jwt::ArcJwtService,
    mirror::ArcDocumentMirror,
    player::{ArcPlayerRepository, ArcPlayerService, PlayerServiceImpl},
    ranking::{ArcRankingRepository, ArcRankingService, RankingServiceImpl},
    room::{ArcRoomRepository, ArcRoomService, RoomServiceImpl},
    session::{ArcSessionService, SessionServiceImpl},
};

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Record ranking results automatically when a match finishes.
    pub auto_record_results: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            auto_record_results: true,
        }
    }
}

pub struct AppRepositories {
    pub player_repository: ArcPlayerRepository,
    pub room_repository: ArcRoomRepository,
    pub ranking_repository: ArcRankingRepository,
    pub game_repository: ArcGameRepository,
}

#[derive(Clone)]
pub struct AppState {
    pub player_service: ArcPlayerService,
    pub room_service: ArcRoomService,
    pub ranking_service: ArcRankingService,
    pub game_history_service: ArcGameHistoryService,
    pub session_service: ArcSessionService,
    pub jwt_service: ArcJwtService,
    pub document_mirror: ArcDocumentMirror,
}

pub fn construct_app(
    repositories: AppRepositories,
    jwt_service: ArcJwtService,
    document_mirror: ArcDocumentMirror,
    config: AppConfig,
) -> AppState {
    let player_service: ArcPlayerService = Arc::new(Box::new(PlayerServiceImpl::new(
        repositories.player_repository,
        jwt_service.clone(),
    )));

    let ranking_service: ArcRankingService = Arc::new(Box::new(RankingServiceImpl::new(
        repositories.ranking_repository,
    )));

    let game_history_service: ArcGameHistoryService = Arc::new(Box::new(
        GameHistoryServiceImpl::new(repositories.game_repository),
    ));

    let session_service: ArcSessionService = Arc::new(Box::new(SessionServiceImpl::new()));

    let room_service: ArcRoomService = Arc::new(Box::new(RoomServiceImpl::new(
        repositories.room_repository,
        game_history_service.clone(),
        ranking_service.clone(),
        session_service.clone(),
        config.auto_record_results,
    )));

    AppState {
        player_service,
        room_service,
        ranking_service,
        game_history_service,
        session_service,
        jwt_service,
        document_mirror,
    }
}
