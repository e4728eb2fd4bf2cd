use crate::room::RoomCommand;
use crate::signaling::SignalingService;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use duet_core::{MemberId, SignalMessage};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(service): State<SignalingService>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, MemberId::new(), service))
}

async fn handle_socket(socket: WebSocket, member: MemberId, service: SignalingService) {
    info!("New WebSocket connection: {}", member);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    service.add_member(member, tx);

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let service = service.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => {
                        let cmd = SignalMessage::decode(text.as_str())
                            .and_then(|signal| RoomCommand::from_signal(member, signal));
                        match cmd {
                            Ok(cmd) => {
                                if let Err(e) = service.room_cmd_tx.send(cmd).await {
                                    error!("Room manager died: {}", e);
                                    break;
                                }
                            }
                            Err(violation) => warn!("Discarding frame from {}: {}", member, violation),
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    service.remove_member(&member);
    let _ = service
        .room_cmd_tx
        .send(RoomCommand::Disconnect { member })
        .await;
    info!("WebSocket disconnected: {}", member);
}
