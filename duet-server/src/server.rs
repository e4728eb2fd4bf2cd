use crate::config::ServerConfig;
use crate::room::RoomManager;
use crate::signaling::{SignalingService, ws_handler};
use anyhow::{Context, Result};
use axum::Router;
use axum::routing::get;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::info;

pub fn router(service: SignalingService) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(|| async { "ok" }))
        .with_state(service)
}

/// Starts the membership actor and returns the service that feeds it.
pub fn spawn_signaling(queue_capacity: NonZeroUsize) -> SignalingService {
    let (room_cmd_tx, room_cmd_rx) = mpsc::channel(queue_capacity.get());
    let service = SignalingService::new(room_cmd_tx);
    let manager = RoomManager::new(room_cmd_rx, Arc::new(service.clone()));
    tokio::spawn(manager.run());
    service
}

pub async fn serve(config: ServerConfig) -> Result<()> {
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    serve_on(listener, config).await
}

pub async fn serve_on(listener: TcpListener, config: ServerConfig) -> Result<()> {
    let service = spawn_signaling(config.queue_capacity);
    info!("Relay listening on {}", listener.local_addr()?);

    axum::serve(listener, router(service))
        .await
        .context("Relay server stopped")
}
