//! # Connection Manager
//!
//! The registry of live client connections and the single place inbound
//! traffic is buffered and dispatched.
//!
//! ## Dispatch protocol
//!
//! Socket reader threads call [`ConnectionManager::receive`] at any time; the
//! controlling thread calls [`ConnectionManager::update`] once per tick.
//! `update` extracts everything due (announcements and buffered packets)
//! while holding the lock, then replays it through the listener after the
//! lock is released, so slow request handlers never sit on the transport
//! lock.
//!
//! Ordering guarantees, per connection: the connect announcement precedes its
//! first request; a disconnect announcement follows every packet that was
//! buffered before removal (nothing is lost when a client sends a final
//! request and closes immediately). Across connections, map iteration order
//! applies, which is unspecified.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::error::{NetworkError, NetworkResult};
use crate::socket::{ConnectionHandle, NetworkSocketRef, Packet};

// ============================================================================
// Listener
// ============================================================================

/// Receiver of one tick's connection traffic, driven by
/// [`ConnectionManager::update`].
pub trait ConnectionListener {
    fn on_connect(&mut self, handle: &ConnectionHandle) {
        let _ = handle;
    }

    fn on_disconnect(&mut self, handle: &ConnectionHandle) {
        let _ = handle;
    }

    fn on_request(&mut self, handle: &ConnectionHandle, packet: Packet);
}

/// One dispatchable occurrence, extracted under the lock and replayed
/// outside it.
enum Event {
    Connected(ConnectionHandle),
    Request(ConnectionHandle, Packet),
    Disconnected(ConnectionHandle),
}

// ============================================================================
// Manager
// ============================================================================

#[derive(Default)]
pub struct ConnectionManager {
    connections: Mutex<HashMap<ConnectionHandle, Connection>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly accepted socket. The connect announcement fires on
    /// the next tick.
    pub fn add(&self, socket: NetworkSocketRef) -> ConnectionHandle {
        let connection = Connection::new(socket);
        let handle = connection.handle();
        self.connections.lock().insert(handle.clone(), connection);
        handle
    }

    /// Flag a connection for removal. Callable from any thread; the next
    /// tick drains its buffer, announces the disconnect and purges it.
    pub fn remove(&self, handle: &ConnectionHandle) {
        if let Some(connection) = self.connections.lock().get_mut(handle) {
            connection.mark_removed();
        }
    }

    /// Buffer an inbound packet. The only inbound mutation path; packets for
    /// unknown (already purged) handles are dropped, not errors.
    pub fn receive(&self, handle: &ConnectionHandle, packet: Packet) {
        match self.connections.lock().get_mut(handle) {
            Some(connection) => connection.push(packet),
            None => debug!(?handle, "dropping packet for unknown connection"),
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// One dispatch tick; call from the controlling thread only.
    pub fn update(&self, listener: &mut dyn ConnectionListener) {
        let events = {
            let mut connections = self.connections.lock();
            let mut events = Vec::new();
            let mut purge = Vec::new();

            for (handle, connection) in connections.iter_mut() {
                if connection.is_removed() {
                    for packet in connection.drain() {
                        events.push(Event::Request(handle.clone(), packet));
                    }
                    events.push(Event::Disconnected(handle.clone()));
                    purge.push(handle.clone());
                    continue;
                }
                if connection.is_added() {
                    connection.mark_announced();
                    events.push(Event::Connected(handle.clone()));
                }
                for packet in connection.drain() {
                    events.push(Event::Request(handle.clone(), packet));
                }
            }

            for handle in &purge {
                connections.remove(handle);
            }
            events
        };

        for event in events {
            match event {
                Event::Connected(handle) => listener.on_connect(&handle),
                Event::Request(handle, packet) => listener.on_request(&handle, packet),
                Event::Disconnected(handle) => listener.on_disconnect(&handle),
            }
        }
    }

    // ------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------

    /// Send to one connection; unknown handles count as closed.
    pub fn send(&self, handle: &ConnectionHandle, packet: Packet) -> NetworkResult<()> {
        let connections = self.connections.lock();
        let connection = connections
            .get(handle)
            .ok_or(NetworkError::ConnectionClosed)?;
        connection.socket().send(packet)
    }

    /// Send to every live connection. A dead socket is skipped with a
    /// warning; it never aborts delivery to the rest.
    pub fn broadcast(&self, packet: Packet) {
        self.broadcast_filtered(&packet, |_| true);
    }

    /// Send to every live connection except `source`.
    pub fn broadcast_except(&self, source: &ConnectionHandle, packet: Packet) {
        self.broadcast_filtered(&packet, |handle| handle != source);
    }

    fn broadcast_filtered(&self, packet: &Packet, keep: impl Fn(&ConnectionHandle) -> bool) {
        let connections = self.connections.lock();
        for (handle, connection) in connections.iter() {
            if connection.is_removed() || !keep(handle) {
                continue;
            }
            if let Err(e) = connection.socket().send(packet.clone()) {
                warn!(?handle, error = %e, "broadcast skipped a dead socket");
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::NetworkSocket;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingSocket {
        sent: Mutex<Vec<Packet>>,
        dead: AtomicBool,
    }

    impl RecordingSocket {
        fn sent(&self) -> Vec<Packet> {
            self.sent.lock().clone()
        }
    }

    impl NetworkSocket for RecordingSocket {
        fn send(&self, packet: Packet) -> NetworkResult<()> {
            if self.dead.load(Ordering::SeqCst) {
                return Err(NetworkError::ConnectionClosed);
            }
            self.sent.lock().push(packet);
            Ok(())
        }
    }

    #[derive(Debug, PartialEq)]
    enum TestEvent {
        Connected(ConnectionHandle),
        Request(ConnectionHandle, Packet),
        Disconnected(ConnectionHandle),
    }

    #[derive(Default)]
    struct RecordingListener {
        events: Vec<TestEvent>,
    }

    impl ConnectionListener for RecordingListener {
        fn on_connect(&mut self, handle: &ConnectionHandle) {
            self.events.push(TestEvent::Connected(handle.clone()));
        }

        fn on_disconnect(&mut self, handle: &ConnectionHandle) {
            self.events.push(TestEvent::Disconnected(handle.clone()));
        }

        fn on_request(&mut self, handle: &ConnectionHandle, packet: Packet) {
            self.events.push(TestEvent::Request(handle.clone(), packet));
        }
    }

    fn add_socket(manager: &ConnectionManager) -> (Arc<RecordingSocket>, ConnectionHandle) {
        let socket = Arc::new(RecordingSocket::default());
        let handle = manager.add(socket.clone());
        (socket, handle)
    }

    #[test]
    fn test_requests_buffer_until_the_next_tick() {
        let manager = ConnectionManager::new();
        let (_, handle) = add_socket(&manager);
        manager.receive(&handle, Packet::text("one"));
        manager.receive(&handle, Packet::text("two"));

        let mut listener = RecordingListener::default();
        assert!(listener.events.is_empty());

        manager.update(&mut listener);
        assert_eq!(
            listener.events,
            vec![
                TestEvent::Connected(handle.clone()),
                TestEvent::Request(handle.clone(), Packet::text("one")),
                TestEvent::Request(handle.clone(), Packet::text("two")),
            ]
        );

        // nothing left for the next tick
        let mut listener = RecordingListener::default();
        manager.update(&mut listener);
        assert!(listener.events.is_empty());
    }

    #[test]
    fn test_disconnect_is_announced_after_the_buffered_requests() {
        let manager = ConnectionManager::new();
        let (_, handle) = add_socket(&manager);
        manager.update(&mut RecordingListener::default());

        manager.receive(&handle, Packet::text("a"));
        manager.receive(&handle, Packet::text("b"));
        manager.receive(&handle, Packet::text("c"));
        manager.remove(&handle);

        let mut listener = RecordingListener::default();
        manager.update(&mut listener);
        assert_eq!(
            listener.events,
            vec![
                TestEvent::Request(handle.clone(), Packet::text("a")),
                TestEvent::Request(handle.clone(), Packet::text("b")),
                TestEvent::Request(handle.clone(), Packet::text("c")),
                TestEvent::Disconnected(handle.clone()),
            ]
        );
        assert_eq!(manager.connection_count(), 0);
    }

    #[test]
    fn test_connection_removed_before_first_tick_never_connects() {
        let manager = ConnectionManager::new();
        let (_, handle) = add_socket(&manager);
        manager.receive(&handle, Packet::text("only"));
        manager.remove(&handle);

        let mut listener = RecordingListener::default();
        manager.update(&mut listener);
        assert_eq!(
            listener.events,
            vec![
                TestEvent::Request(handle.clone(), Packet::text("only")),
                TestEvent::Disconnected(handle),
            ]
        );
    }

    #[test]
    fn test_broadcast_excludes_the_source() {
        let manager = ConnectionManager::new();
        let (socket_a, _) = add_socket(&manager);
        let (socket_b, handle_b) = add_socket(&manager);
        let (socket_c, _) = add_socket(&manager);

        manager.broadcast_except(&handle_b, Packet::text("update"));
        assert_eq!(socket_a.sent(), vec![Packet::text("update")]);
        assert!(socket_b.sent().is_empty());
        assert_eq!(socket_c.sent(), vec![Packet::text("update")]);
    }

    #[test]
    fn test_broadcast_survives_a_dead_socket() {
        let manager = ConnectionManager::new();
        let (dead, _) = add_socket(&manager);
        let (alive, _) = add_socket(&manager);
        dead.dead.store(true, Ordering::SeqCst);

        manager.broadcast(Packet::text("tick"));
        assert!(dead.sent().is_empty());
        assert_eq!(alive.sent(), vec![Packet::text("tick")]);
    }

    #[test]
    fn test_receive_for_unknown_handle_is_dropped() {
        let manager = ConnectionManager::new();
        let socket: NetworkSocketRef = Arc::new(RecordingSocket::default());
        let stranger = ConnectionHandle::new(&socket);

        manager.receive(&stranger, Packet::text("lost"));

        let mut listener = RecordingListener::default();
        manager.update(&mut listener);
        assert!(listener.events.is_empty());
    }

    #[test]
    fn test_send_to_unknown_handle_fails_as_closed() {
        let manager = ConnectionManager::new();
        let socket: NetworkSocketRef = Arc::new(RecordingSocket::default());
        let stranger = ConnectionHandle::new(&socket);

        let err = manager.send(&stranger, Packet::text("hello")).unwrap_err();
        assert!(matches!(err, NetworkError::ConnectionClosed));
    }
}
