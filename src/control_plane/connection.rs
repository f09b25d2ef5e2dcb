//! Per-stream connection handle and its outbound stream half.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;
use tracing::{error, warn};

use crate::api::messages::{ElectionId, Role, StreamMessageResponse};

const COMPONENT: &str = "sdn_connection";

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one stream connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Write side of a connection's bidirectional stream.
///
/// `write` must not block; a failed write is a per-connection condition the
/// caller tolerates, never a reason to fail arbitration for everyone else.
pub trait StreamSink: Send + Sync {
    /// Pushes one response toward the peer. Returns false when the peer
    /// is gone or not draining its stream.
    fn write(&self, response: StreamMessageResponse) -> bool;
}

/// [`StreamSink`] backed by a bounded tokio channel, in the same shape the
/// egress side of a transport hands out queue senders.
pub struct ChannelSink {
    sender: Sender<StreamMessageResponse>,
}

impl ChannelSink {
    pub fn new(sender: Sender<StreamMessageResponse>) -> Self {
        Self { sender }
    }
}

impl StreamSink for ChannelSink {
    fn write(&self, response: StreamMessageResponse) -> bool {
        match self.sender.try_send(response) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(component = COMPONENT, "outbound stream queue full; dropping response");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// Mutable per-stream record: assigned role, assigned election id, and the
/// outbound half used for pushing asynchronous notifications.
///
/// Created when a stream begins and dropped when it ends; never persisted.
/// Only the owning stream task touches it, always through
/// [`crate::SdnControllerManager`] calls that serialize against the shared
/// arbitration state.
pub struct SdnConnection {
    id: ConnectionId,
    role: Role,
    election_id: Option<ElectionId>,
    initialized: bool,
    outbound: Arc<dyn StreamSink>,
}

impl SdnConnection {
    pub fn new(outbound: Arc<dyn StreamSink>) -> Self {
        Self {
            id: ConnectionId::next(),
            role: Role::Root,
            election_id: None,
            initialized: false,
            outbound,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn election_id(&self) -> Option<ElectionId> {
        self.election_id
    }

    /// False until the first successful arbitration exchange completes.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub(crate) fn set_role(&mut self, role: Role) {
        self.role = role;
    }

    pub(crate) fn set_election_id(&mut self, election_id: Option<ElectionId>) {
        self.election_id = election_id;
    }

    pub(crate) fn initialize(&mut self) {
        self.initialized = true;
    }

    pub(crate) fn outbound(&self) -> Arc<dyn StreamSink> {
        self.outbound.clone()
    }

    /// Writes one response to this connection's stream, logging (and
    /// otherwise swallowing) delivery failure.
    pub fn send_stream_message_response(&self, response: StreamMessageResponse) {
        if !self.outbound.write(response) {
            error!(
                component = COMPONENT,
                role = %self.role,
                "could not send stream message response to connection"
            );
        }
    }
}
