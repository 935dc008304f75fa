use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use clap::Parser;
use futures::{SinkExt, StreamExt};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use cardtable_protocol::ServerToClient;

mod coordinator;
mod error;
mod registry;
mod room;

use coordinator::{Connection, Coordinator};
use room::RoomDefaults;

#[derive(Parser, Debug)]
#[command(
    name = "cardtable-server",
    about = "Session and room coordinator for turn-based card games"
)]
struct Args {
    /// Address to accept WebSocket connections on.
    #[arg(long, default_value = "0.0.0.0:9001")]
    listen: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let coordinator = Arc::new(Coordinator::new(RoomDefaults::default()));

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(coordinator.clone());

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    info!(addr = %args.listen, "listening on ws://{}/ws", args.listen);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    coordinator.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(coordinator): State<Arc<Coordinator>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, coordinator))
}

/// Pump one socket: a writer task drains the outbound channel, the read loop
/// feeds frames to the coordinator, and teardown of any kind funnels into
/// exactly one disconnect cleanup.
async fn handle_socket(socket: WebSocket, coordinator: Arc<Coordinator>) {
    let (mut sender, mut receiver) = socket.split();
    let (tx_out, mut rx_out) = tokio::sync::mpsc::unbounded_channel::<ServerToClient>();

    tokio::spawn(async move {
        while let Some(msg) = rx_out.recv().await {
            if sender.send(Message::Text(msg.to_string())).await.is_err() {
                break;
            }
        }
    });

    let conn = Connection::open(tx_out.clone());
    debug!(conn = %conn.id, "connection opened");

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => {
                if let Some(ack) = coordinator.handle_message(&conn, &text) {
                    let _ = tx_out.send(ServerToClient::Ack(ack));
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    coordinator.handle_disconnect(conn.id);
    debug!(conn = %conn.id, "connection closed");
}
