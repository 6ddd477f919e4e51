use std::{path::Path, sync::Arc};

use ttt_server_domain::{app::AppRepositories, mirror::ArcDocumentMirror};

mod document;
pub mod games;
pub mod players;
pub mod ranking;
pub mod rooms;

pub use document::JsonDocument;
pub use games::JsonGameRepository;
pub use players::JsonPlayerRepository;
pub use ranking::JsonRankingRepository;
pub use rooms::JsonRoomRepository;

pub const USERS_FILE: &str = "users.json";
pub const ROOMS_FILE: &str = "rooms.json";
pub const RANKING_FILE: &str = "ranking.json";
pub const GAMES_FILE: &str = "games.json";

/// Opens the four documents under `data_dir`.
pub fn create_repositories(data_dir: &Path, mirror: ArcDocumentMirror) -> AppRepositories {
    AppRepositories {
        player_repository: Arc::new(Box::new(JsonPlayerRepository::new(
            data_dir,
            mirror.clone(),
        ))),
        room_repository: Arc::new(Box::new(JsonRoomRepository::new(data_dir, mirror.clone()))),
        ranking_repository: Arc::new(Box::new(JsonRankingRepository::new(
            data_dir,
            mirror.clone(),
        ))),
        game_repository: Arc::new(Box::new(JsonGameRepository::new(data_dir, mirror))),
    }
}
