//! # Sockets
//!
//! The transport seam. A [`NetworkSocket`] is the outbound half of one
//! client's WebSocket, implemented by the server's transport layer; inbound
//! frames reach the connection manager through
//! [`ConnectionManager::receive`](crate::manager::ConnectionManager::receive).
//!
//! A [`ConnectionHandle`] is a copyable capability naming one client. Its
//! equality and hash are the identity of the socket allocation, which stays a
//! stable, unique key even after the socket closes.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use bytes::Bytes;

use crate::error::NetworkResult;

// ============================================================================
// Packets
// ============================================================================

/// One WebSocket frame payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Text(String),
    Binary(Bytes),
}

impl Packet {
    pub fn text(text: impl Into<String>) -> Self {
        Packet::Text(text.into())
    }

    pub fn binary(data: impl Into<Bytes>) -> Self {
        Packet::Binary(data.into())
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Packet::Binary(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Packet::Text(text) => Some(text),
            Packet::Binary(_) => None,
        }
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Packet::Text(_) => None,
            Packet::Binary(data) => Some(data),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Packet::Text(text) => text.len(),
            Packet::Binary(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Sockets
// ============================================================================

/// Outbound frame delivery for one client.
///
/// `send` must be callable from any thread and must not block on the network;
/// implementations queue the frame and fail with
/// [`NetworkError::ConnectionClosed`](crate::error::NetworkError::ConnectionClosed)
/// once the peer is gone.
pub trait NetworkSocket: Send + Sync {
    fn send(&self, packet: Packet) -> NetworkResult<()>;
}

pub type NetworkSocketRef = Arc<dyn NetworkSocket>;

// ============================================================================
// Handles
// ============================================================================

/// A stable per-client key.
///
/// Holds the socket weakly: the handle never keeps a closed socket alive, yet
/// keeps identifying it, so maps keyed by handle survive the disconnect
/// window between "socket dropped" and "connection purged".
#[derive(Clone)]
pub struct ConnectionHandle {
    socket: Weak<dyn NetworkSocket>,
}

impl ConnectionHandle {
    pub fn new(socket: &NetworkSocketRef) -> Self {
        Self {
            socket: Arc::downgrade(socket),
        }
    }

    /// The socket, while it is still alive.
    pub fn upgrade(&self) -> Option<NetworkSocketRef> {
        self.socket.upgrade()
    }

    // identity of the allocation, without the vtable half
    fn key(&self) -> usize {
        self.socket.as_ptr() as *const () as usize
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ConnectionHandle {}

impl Hash for ConnectionHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionHandle({:#x})", self.key())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct NullSocket;

    impl NetworkSocket for NullSocket {
        fn send(&self, _packet: Packet) -> NetworkResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_handles_to_same_socket_are_equal() {
        let socket: NetworkSocketRef = Arc::new(NullSocket);
        let a = ConnectionHandle::new(&socket);
        let b = ConnectionHandle::new(&socket);
        assert_eq!(a, b);

        let other: NetworkSocketRef = Arc::new(NullSocket);
        assert_ne!(a, ConnectionHandle::new(&other));
    }

    #[test]
    fn test_handle_stays_a_key_after_the_socket_drops() {
        let socket: NetworkSocketRef = Arc::new(NullSocket);
        let handle = ConnectionHandle::new(&socket);

        let mut seen = HashSet::new();
        seen.insert(handle.clone());
        drop(socket);

        assert!(handle.upgrade().is_none());
        assert!(seen.contains(&handle));
    }

    #[test]
    fn test_packet_accessors() {
        let text = Packet::text("hello");
        assert_eq!(text.as_text(), Some("hello"));
        assert!(text.as_binary().is_none());
        assert!(!text.is_binary());

        let binary = Packet::binary(vec![1u8, 2, 3]);
        assert_eq!(binary.as_binary(), Some(&[1u8, 2, 3][..]));
        assert!(binary.is_binary());
        assert_eq!(binary.len(), 3);

        assert!(Packet::text("").is_empty());
    }
}
