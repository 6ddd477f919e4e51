use std::{path::PathBuf, sync::Arc};

use ttt_persistence_json::JsonPlayerRepository;
use ttt_server_domain::{
    mirror::{MirrorConfig, MirrorOutbox, NoopRemoteMirror},
    player::{Player, PlayerRepository, hash_password},
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 5 {
        eprintln!("Usage: add_user <username> <name> <password> <email>");
        std::process::exit(1);
    }

    let data_dir = PathBuf::from(std::env::var("TTT_DATA_DIR").unwrap_or("data".to_string()));

    let (outbox, _) = MirrorOutbox::new(
        Arc::new(Box::new(NoopRemoteMirror)),
        MirrorConfig::default(),
    );
    let repository = JsonPlayerRepository::new(&data_dir, Arc::new(Box::new(outbox)));

    let player = Player {
        username: args[1].clone(),
        name: args[2].clone(),
        password_hash: hash_password(&args[3]),
        email: args[4].clone(),
    };

    if let Err(e) = repository.create_player(&player).await {
        eprintln!("Failed to create user [{}]: {}", player.username, e);
        std::process::exit(1);
    }

    println!(
        "Created user [{}] in {}",
        player.username,
        data_dir.join(ttt_persistence_json::USERS_FILE).display()
    );
}
