//! # Requests
//!
//! One decoded request bound to the connection it arrived on. This is the
//! object handed to entrypoints: it answers "who asked", serializes replies,
//! and bounds the blast radius of a dead client: replying to a connection
//! that closed mid-request is logged, never an error that aborts the handler.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{EntrypointError, NetworkError};
use crate::manager::ConnectionManager;
use crate::messages::{self, MessageFactory, RequestMessage};
use crate::socket::ConnectionHandle;

// ============================================================================
// Connection References
// ============================================================================

/// A client connection as seen by request handlers.
///
/// Sending through a reference swallows transport failures: a closed peer is
/// a normal occurrence, not a handler error.
#[derive(Clone)]
pub struct ConnectionRef {
    manager: Arc<ConnectionManager>,
    handle: ConnectionHandle,
}

impl ConnectionRef {
    pub fn new(manager: Arc<ConnectionManager>, handle: ConnectionHandle) -> Self {
        Self { manager, handle }
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    /// Serialize and send one message to this connection.
    pub fn send<T: Serialize>(&self, message: &T) {
        let packet = match messages::to_packet(message) {
            Ok(packet) => packet,
            Err(e) => {
                warn!(error = %e, "dropping outbound message");
                return;
            }
        };
        match self.manager.send(&self.handle, packet) {
            Ok(()) => {}
            Err(NetworkError::ConnectionClosed) => {
                debug!(handle = ?self.handle, "reply dropped, connection closed");
            }
            Err(e) => warn!(handle = ?self.handle, error = %e, "send failed"),
        }
    }

    /// Serialize and send one message to every connection.
    pub fn broadcast<T: Serialize>(&self, message: &T) {
        match messages::to_packet(message) {
            Ok(packet) => self.manager.broadcast(packet),
            Err(e) => warn!(error = %e, "dropping broadcast message"),
        }
    }

    /// Serialize and send one message to every connection except this one.
    pub fn broadcast_to_others<T: Serialize>(&self, message: &T) {
        match messages::to_packet(message) {
            Ok(packet) => self.manager.broadcast_except(&self.handle, packet),
            Err(e) => warn!(error = %e, "dropping broadcast message"),
        }
    }
}

// ============================================================================
// Requests
// ============================================================================

/// One request on its way through an entrypoint.
///
/// Cloning is cheap; long-running operations keep a clone around to emit
/// progress updates or a delayed reply.
#[derive(Clone)]
pub struct NetworkRequest {
    connection: ConnectionRef,
    message: RequestMessage,
}

impl NetworkRequest {
    pub fn new(connection: ConnectionRef, message: RequestMessage) -> Self {
        Self { connection, message }
    }

    pub fn connection(&self) -> &ConnectionRef {
        &self.connection
    }

    pub fn message(&self) -> &RequestMessage {
        &self.message
    }

    pub fn method(&self) -> &str {
        &self.message.method
    }

    pub fn params(&self) -> &Value {
        &self.message.params
    }

    pub fn id(&self) -> &Value {
        &self.message.id
    }

    /// True iff the client expects a reply frame.
    pub fn should_be_replied(&self) -> bool {
        self.message.should_be_replied()
    }

    /// Send the success reply. Fire-and-forget requests get none.
    pub fn reply(&self, result: Value) {
        if !self.should_be_replied() {
            debug!(method = self.method(), "request carries no id, skipping reply");
            return;
        }
        let reply = MessageFactory::reply(&self.message, result);
        self.connection.send(&reply);
    }

    /// Send the error reply; for fire-and-forget requests the error is
    /// logged instead so it is still observable somewhere.
    pub fn error(&self, error: &EntrypointError) {
        if !self.should_be_replied() {
            warn!(
                method = self.method(),
                code = error.code,
                message = %error.message,
                "request failed without a reply channel"
            );
            return;
        }
        let message = MessageFactory::error(&self.message, error);
        self.connection.send(&message);
    }

    /// Report partial completion of a long-running request. Progress is a
    /// scene-wide observable: it goes to every connection, not only the
    /// requesting one.
    pub fn progress(&self, operation: &str, amount: f64) {
        let update = MessageFactory::progress(&self.message, operation, amount);
        self.connection.broadcast(&update);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NetworkResult;
    use crate::messages::JSON_RPC_VERSION;
    use crate::socket::{NetworkSocket, NetworkSocketRef, Packet};
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct RecordingSocket {
        sent: Mutex<Vec<Packet>>,
    }

    impl RecordingSocket {
        fn frames(&self) -> Vec<Value> {
            self.sent
                .lock()
                .iter()
                .map(|p| serde_json::from_str(p.as_text().unwrap()).unwrap())
                .collect()
        }
    }

    impl NetworkSocket for RecordingSocket {
        fn send(&self, packet: Packet) -> NetworkResult<()> {
            self.sent.lock().push(packet);
            Ok(())
        }
    }

    struct Setup {
        manager: Arc<ConnectionManager>,
        socket: Arc<RecordingSocket>,
        handle: ConnectionHandle,
    }

    fn setup() -> Setup {
        let manager = Arc::new(ConnectionManager::new());
        let socket = Arc::new(RecordingSocket::default());
        let handle = manager.add(socket.clone() as NetworkSocketRef);
        Setup {
            manager,
            socket,
            handle,
        }
    }

    fn make_request(setup: &Setup, id: Value) -> NetworkRequest {
        let message = RequestMessage {
            jsonrpc: JSON_RPC_VERSION.to_string(),
            id,
            method: "add-model".to_string(),
            params: json!({}),
        };
        NetworkRequest::new(
            ConnectionRef::new(setup.manager.clone(), setup.handle.clone()),
            message,
        )
    }

    #[test]
    fn test_reply_echoes_id_and_method() {
        let setup = setup();
        make_request(&setup, json!(3)).reply(json!({"id": 42}));

        let frames = setup.socket.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["id"], json!(3));
        assert_eq!(frames[0]["method"], json!("add-model"));
        assert_eq!(frames[0]["result"], json!({"id": 42}));
    }

    #[test]
    fn test_fire_and_forget_requests_get_no_frames() {
        let setup = setup();
        let request = make_request(&setup, Value::Null);
        request.reply(json!("ignored"));
        request.error(&EntrypointError::internal("also ignored"));
        assert!(setup.socket.frames().is_empty());
    }

    #[test]
    fn test_error_reply_carries_code() {
        let setup = setup();
        make_request(&setup, json!("r9")).error(&EntrypointError::invalid_params("no such model"));

        let frames = setup.socket.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["id"], json!("r9"));
        assert_eq!(frames[0]["error"]["code"], json!(messages::INVALID_PARAMS));
        assert_eq!(frames[0]["error"]["message"], json!("no such model"));
    }

    #[test]
    fn test_progress_reaches_every_connection() {
        let setup = setup();
        let other_socket = Arc::new(RecordingSocket::default());
        setup.manager.add(other_socket.clone() as NetworkSocketRef);

        make_request(&setup, json!(5)).progress("importing", 0.25);

        for socket in [&setup.socket, &other_socket] {
            let frames = socket.frames();
            assert_eq!(frames.len(), 1);
            assert_eq!(frames[0]["method"], json!("progress"));
            assert_eq!(frames[0]["params"]["id"], json!(5));
            assert_eq!(frames[0]["params"]["amount"], json!(0.25));
        }
    }

    #[test]
    fn test_replying_to_a_gone_connection_is_silent() {
        let setup = setup();
        let request = make_request(&setup, json!(1));

        // purge the connection before the reply goes out
        setup.manager.remove(&setup.handle);
        struct Sink;
        impl crate::manager::ConnectionListener for Sink {
            fn on_request(&mut self, _: &ConnectionHandle, _: Packet) {}
        }
        setup.manager.update(&mut Sink);

        request.reply(json!("late"));
        assert!(setup.socket.frames().is_empty());
    }
}
