use async_trait::async_trait;
use duet_core::{ProtocolViolation, RelayChannel, RelayError, RelayEvent, SignalMessage};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// Relay channel over a WebSocket to `duet-relay`.
///
/// Outbound messages go through an unbounded queue drained by a writer
/// task, so `send` never waits on the socket and order is preserved.
#[derive(Clone)]
pub struct WsRelay {
    outbound: mpsc::UnboundedSender<Message>,
}

impl WsRelay {
    /// Connects and returns the channel with its ordered inbound stream.
    /// The stream ends with `RelayEvent::Disconnected`.
    pub async fn connect(
        url: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<RelayEvent>), RelayError> {
        info!("Connecting to relay {}", url);
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| RelayError::Connect(e.to_string()))?;
        let (mut sink, mut stream) = ws_stream.split();

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = sink.send(msg).await {
                    warn!("Relay write failed: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
            debug!("Relay writer finished");
        });

        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => match SignalMessage::decode(&text) {
                        Ok(msg) if msg.is_relay_originated() => {
                            if inbound_tx.send(RelayEvent::Message(msg)).is_err() {
                                break;
                            }
                        }
                        Ok(msg) => warn!(
                            "{}",
                            ProtocolViolation::WrongDirection { event: msg.event() }
                        ),
                        Err(violation) => warn!("Discarding relay frame: {}", violation),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Relay read failed: {}", e);
                        break;
                    }
                }
            }
            info!("Relay connection closed");
            let _ = inbound_tx.send(RelayEvent::Disconnected);
        });

        Ok((Self { outbound }, inbound_rx))
    }

    /// Closes the socket; the inbound stream then yields `Disconnected`.
    pub fn close(&self) {
        let _ = self.outbound.send(Message::Close(None));
    }
}

#[async_trait]
impl RelayChannel for WsRelay {
    async fn send(&self, msg: SignalMessage) -> Result<(), RelayError> {
        let json = msg.encode().map_err(|e| RelayError::Encode(e.to_string()))?;
        self.outbound
            .send(Message::text(json))
            .map_err(|_| RelayError::Closed)
    }
}
