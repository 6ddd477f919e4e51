use std::{path::PathBuf, sync::Arc};

use ttt_persistence_json::JsonRoomRepository;
use ttt_server_domain::{
    mirror::{MirrorConfig, MirrorOutbox, NoopRemoteMirror},
    room::{Room, RoomRepository},
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let names: Vec<String> = std::env::args().skip(1).collect();
    if names.is_empty() {
        eprintln!("Usage: create_rooms <name>...");
        std::process::exit(1);
    }

    let data_dir = PathBuf::from(std::env::var("TTT_DATA_DIR").unwrap_or("data".to_string()));
    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir).expect("Failed to create data directory");
        println!("Created data directory at {}", data_dir.display());
    }

    let (outbox, _) = MirrorOutbox::new(
        Arc::new(Box::new(NoopRemoteMirror)),
        MirrorConfig::default(),
    );
    let repository = JsonRoomRepository::new(&data_dir, Arc::new(Box::new(outbox)));

    let existing = repository
        .get_rooms()
        .await
        .expect("Failed to read existing rooms");
    let mut next_id = existing
        .iter()
        .filter_map(|room| room.id.parse::<u64>().ok())
        .max()
        .unwrap_or(0)
        + 1;

    for name in names {
        let room = Room::new(next_id.to_string(), name);
        repository
            .create_room(&room)
            .await
            .expect("Failed to create room");
        println!("Created room [{}] with id {}", room.name, room.id);
        next_id += 1;
    }
}
