use std::{path::PathBuf, sync::Arc, time::Duration};

use log::{error, info};
use tokio_util::sync::CancellationToken;
use ttt_mirror_github::{GithubConfig, GithubRemoteMirror};
use ttt_persistence_json::create_repositories;
use ttt_server_api::JwtServiceImpl;
use ttt_server_domain::{
    app::{AppConfig, construct_app},
    jwt::ArcJwtService,
    mirror::{ArcDocumentMirror, ArcRemoteMirror, MirrorConfig, MirrorOutbox, NoopRemoteMirror},
};

mod logs;

const MIRROR_RETRY_DELAY: Duration = Duration::from_secs(5);

fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => default,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received. Preparing graceful exit...");
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    logs::init_logger();

    let data_dir = PathBuf::from(std::env::var("TTT_DATA_DIR").unwrap_or("data".to_string()));
    let auto_record_results = env_flag("TTT_AUTO_RECORD_RESULTS", true);
    let max_attempts = std::env::var("TTT_MIRROR_MAX_ATTEMPTS")
        .unwrap_or_else(|_| "5".to_string())
        .parse::<u32>()
        .expect("TTT_MIRROR_MAX_ATTEMPTS must be a valid u32");

    let github_config = GithubConfig::from_env();
    let mirror_config = MirrorConfig {
        enabled: github_config.is_some(),
        max_attempts,
        retry_delay: MIRROR_RETRY_DELAY,
    };
    let remote_mirror: ArcRemoteMirror = match github_config {
        Some(config) => {
            info!("Mirroring documents to {} ({})", config.repo, config.branch);
            Arc::new(Box::new(GithubRemoteMirror::new(config)))
        }
        None => {
            info!("No remote mirror configured");
            Arc::new(Box::new(NoopRemoteMirror))
        }
    };
    let (outbox, mirror_worker) = MirrorOutbox::new(remote_mirror, mirror_config);
    let document_mirror: ArcDocumentMirror = Arc::new(Box::new(outbox));

    let repositories = create_repositories(&data_dir, document_mirror.clone());
    let jwt_service: ArcJwtService = Arc::new(Box::new(JwtServiceImpl::from_env()));

    let app = construct_app(
        repositories,
        jwt_service,
        document_mirror,
        AppConfig {
            auto_record_results,
        },
    );

    info!(
        "Starting application (data dir {}, auto record results: {})",
        data_dir.display(),
        auto_record_results
    );

    let cancel_token = CancellationToken::new();
    let mirror_task = tokio::spawn(mirror_worker.run(cancel_token.clone()));

    if let Err(e) = ttt_server_api::run(app, shutdown_signal()).await {
        error!("HTTP API failed: {}", e);
    }

    cancel_token.cancel();
    if let Err(e) = mirror_task.await {
        error!("Mirror worker panicked: {}", e);
    }

    info!("Application shut down");
}
