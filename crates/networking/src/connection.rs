//! # Connections
//!
//! Per-client state as tracked by the
//! [`ConnectionManager`](crate::manager::ConnectionManager): the socket, the
//! announcement flags and the buffer of inbound packets awaiting the next
//! dispatch tick.

use crate::socket::{ConnectionHandle, NetworkSocketRef, Packet};

/// One client's transport state.
///
/// Lifecycle: starts `added` (present but not yet announced), is announced on
/// the next manager tick, and once `removed` is set it is never cleared; the
/// connection is purged at the following tick, after its remaining buffered
/// packets have been dispatched.
pub struct Connection {
    socket: NetworkSocketRef,
    added: bool,
    removed: bool,
    buffer: Vec<Packet>,
}

impl Connection {
    pub fn new(socket: NetworkSocketRef) -> Self {
        Self {
            socket,
            added: true,
            removed: false,
            buffer: Vec::new(),
        }
    }

    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle::new(&self.socket)
    }

    pub fn socket(&self) -> &NetworkSocketRef {
        &self.socket
    }

    /// Still waiting for its connect announcement.
    pub fn is_added(&self) -> bool {
        self.added
    }

    pub fn mark_announced(&mut self) {
        self.added = false;
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// One-way transition; the next tick drains and purges this connection.
    pub fn mark_removed(&mut self) {
        self.removed = true;
    }

    /// Buffer an inbound packet until the next tick.
    pub fn push(&mut self, packet: Packet) {
        self.buffer.push(packet);
    }

    /// Take every buffered packet, oldest first.
    pub fn drain(&mut self) -> Vec<Packet> {
        std::mem::take(&mut self.buffer)
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}
