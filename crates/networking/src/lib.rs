//! # Cajal Networking
//!
//! Client connections and the JSON-RPC protocol layer of the Cajal
//! visualization engine.
//!
//! ## Modules
//!
//! - `socket`: the transport seam ([`socket::NetworkSocket`]) and the stable
//!   per-client identity key ([`socket::ConnectionHandle`])
//! - `connection`: one client with its buffer of not-yet-dispatched packets
//! - `manager`: the registry that buffers inbound traffic and replays it,
//!   with connect/disconnect callbacks, once per tick
//! - `messages`: JSON-RPC message shapes, error codes and the factory that
//!   builds replies from requests
//! - `request`: one request correlated with its originating connection,
//!   handed to entrypoints for reply/error/progress emission
//! - `json_schema`: payload descriptions and the recursive validator run
//!   before params reach application logic
//! - `property_json`: the boundary where wire JSON meets
//!   [`cajal_common::PropertyMap`]s
//! - `error`: transport and protocol error types
//!
//! ## Threading
//!
//! Socket I/O threads push frames in through
//! [`manager::ConnectionManager::receive`] at any time; exactly one control
//! thread calls [`manager::ConnectionManager::update`] per tick and runs all
//! handlers. Handlers therefore never race each other, and a client
//! disconnecting mid-burst still gets its buffered requests dispatched
//! before the disconnect is announced.

pub mod connection;
pub mod error;
pub mod json_schema;
pub mod manager;
pub mod messages;
pub mod property_json;
pub mod request;
pub mod socket;

// Re-export the transport layer
pub use connection::Connection;
pub use manager::{ConnectionListener, ConnectionManager};
pub use socket::{ConnectionHandle, NetworkSocket, NetworkSocketRef, Packet};

// Re-export the protocol layer
pub use json_schema::{JsonSchema, JsonType};
pub use messages::{MessageFactory, NotificationMessage, RequestMessage};
pub use request::{ConnectionRef, NetworkRequest};

// Re-export error types
pub use error::{EntrypointError, EntrypointResult, NetworkError, NetworkResult};
