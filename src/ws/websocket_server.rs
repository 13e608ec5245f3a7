use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

use crate::events::{Command, InboundEvent};
use crate::pomodoro::PomodoroConfig;
use crate::render::RenderFrame;

#[derive(Debug, Serialize)]
pub struct WebSocketResponse {
    pub success: bool,
    pub message: Option<String>,
}

/// Outbound message: either an acknowledgement or a frame to draw.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Outbound<'a> {
    Ack(&'a WebSocketResponse),
    Frame(&'a RenderFrame),
}

pub type CommandSender = mpsc::UnboundedSender<Command>;
pub type CommandReceiver = mpsc::UnboundedReceiver<Command>;

pub fn create_command_channel() -> (CommandSender, CommandReceiver) {
    mpsc::unbounded_channel()
}

/// Everything a connection needs; cheap to clone per client.
#[derive(Clone)]
pub struct ServerContext {
    pub config: Arc<PomodoroConfig>,
    pub commands: CommandSender,
    pub frames: broadcast::Sender<RenderFrame>,
}

pub async fn start_websocket_server(
    addr: SocketAddr,
    context: ServerContext,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    info!("WebSocket server listening on: {}", addr);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        info!("New WebSocket connection from: {}", peer_addr);
        tokio::spawn(handle_connection(stream, peer_addr, context.clone()));
    }

    Ok(())
}

async fn handle_connection(stream: TcpStream, peer_addr: SocketAddr, context: ServerContext) {
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed with {}: {}", peer_addr, e);
            return;
        }
    };

    debug!("WebSocket handshake completed with {}", peer_addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let mut frames = context.frames.subscribe();

    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Ok(frame) => {
                    if let Some(json) = encode(&Outbound::Frame(&frame)) {
                        if let Err(e) = ws_sender.send(Message::Text(json)).await {
                            warn!("Failed to send frame to {}: {}", peer_addr, e);
                            break;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Client {} lagged, skipped {} frames", peer_addr, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            msg = ws_receiver.next() => {
                let Some(msg) = msg else { break };
                match msg {
                    Ok(Message::Text(text)) => {
                        let response = dispatch(&text, &context);
                        if let Some(json) = encode(&Outbound::Ack(&response)) {
                            if let Err(e) = ws_sender.send(Message::Text(json)).await {
                                warn!("Failed to send WebSocket response: {}", e);
                                break;
                            }
                        }
                    }
                    Ok(Message::Close(_)) => {
                        info!("WebSocket connection closed by {}", peer_addr);
                        break;
                    }
                    Ok(Message::Ping(data)) => {
                        if let Err(e) = ws_sender.send(Message::Pong(data)).await {
                            warn!("Failed to send pong: {}", e);
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("WebSocket error from {}: {}", peer_addr, e);
                        break;
                    }
                }
            }
        }
    }

    info!("WebSocket connection with {} terminated", peer_addr);
}

/// Parse one inbound event and forward its command to the widget.
fn dispatch(text: &str, context: &ServerContext) -> WebSocketResponse {
    let event = match serde_json::from_str::<InboundEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            debug!("Failed to parse message: {}", e);
            return WebSocketResponse {
                success: false,
                message: Some(format!("Parse error: {}", e)),
            };
        }
    };

    let Some(command) = event.command(&context.config) else {
        return WebSocketResponse {
            success: true,
            message: Some("Ignored".to_string()),
        };
    };

    debug!(?command, "[WebSocket] Received command");
    if let Err(e) = context.commands.send(command) {
        warn!("Failed to forward command: {}", e);
        return WebSocketResponse {
            success: false,
            message: Some("Timer is not running".to_string()),
        };
    }

    WebSocketResponse {
        success: true,
        message: Some(format!("{:?}", command)),
    }
}

fn encode(message: &Outbound<'_>) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(json) => Some(json),
        Err(e) => {
            warn!("Failed to encode outbound message: {}", e);
            None
        }
    }
}
