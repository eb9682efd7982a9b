//! # WebSocket Transport
//!
//! The axum edge of the server: `/ws` upgrades into a client connection,
//! `/healthz` answers load balancers. Each socket is split in two: a writer
//! task drains an unbounded outbound queue onto the wire, and the reader
//! loop feeds inbound frames into the [`ConnectionManager`], where they sit
//! until the next control-loop tick.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use cajal_networking::{
    ConnectionManager, NetworkError, NetworkResult, NetworkSocket, NetworkSocketRef, Packet,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::debug;

// ============================================================================
// Socket Adapter
// ============================================================================

/// Outbound half of one client. `send` never blocks: frames go onto an
/// unbounded queue and the writer task pushes them out.
struct WsClientSocket {
    outbound: mpsc::UnboundedSender<Packet>,
}

impl NetworkSocket for WsClientSocket {
    fn send(&self, packet: Packet) -> NetworkResult<()> {
        self.outbound
            .send(packet)
            .map_err(|_| NetworkError::ConnectionClosed)
    }
}

// ============================================================================
// Router
// ============================================================================

#[derive(Clone)]
struct WsState {
    manager: Arc<ConnectionManager>,
    max_message_bytes: usize,
}

pub fn router(manager: Arc<ConnectionManager>, max_message_bytes: usize) -> Router {
    let state = WsState {
        manager,
        max_message_bytes,
    };
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(|| async { "OK" }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WsState>) -> impl IntoResponse {
    // oversized frames error the stream, which closes the connection
    ws.max_message_size(state.max_message_bytes)
        .on_upgrade(move |socket| serve_socket(socket, state.manager))
}

// ============================================================================
// Per-Socket Loop
// ============================================================================

async fn serve_socket(socket: WebSocket, manager: Arc<ConnectionManager>) {
    let (mut sink, mut stream) = socket.split();
    let (outbound, mut pending) = mpsc::unbounded_channel::<Packet>();
    let client: NetworkSocketRef = Arc::new(WsClientSocket { outbound });
    let handle = manager.add(client);

    let writer = tokio::spawn(async move {
        while let Some(packet) = pending.recv().await {
            let message = match packet {
                Packet::Text(text) => Message::Text(text.into()),
                Packet::Binary(data) => Message::Binary(data),
            };
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => manager.receive(&handle, Packet::text(text.as_str())),
            Ok(Message::Binary(data)) => manager.receive(&handle, Packet::Binary(data)),
            Ok(Message::Close(_)) => break,
            // axum answers pings on its own
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Err(e) => {
                debug!(error = %e, "websocket read failed");
                break;
            }
        }
    }

    manager.remove(&handle);
    writer.abort();
}

// ============================================================================
// Serve
// ============================================================================

pub async fn serve(listener: tokio::net::TcpListener, app: Router) -> std::io::Result<()> {
    axum::serve(listener, app).await
}
