//! Protocol value types exchanged across the P4Runtime surface.
//!
//! Wire marshaling lives outside this crate; these are the already-decoded
//! shapes the dispatch shell and the arbitration core operate on. Payloads
//! whose interpretation belongs to the device backend (forwarding updates,
//! read entities, packet bytes, pipeline blobs) stay opaque.

use std::fmt::{Display, Formatter};

use crate::status::Status;

/// 128-bit election identifier. The wire carries it as two u64 halves.
///
/// Higher values win arbitration; a connection without one is ineligible
/// to become primary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElectionId(pub u128);

impl ElectionId {
    pub fn from_high_low(high: u64, low: u64) -> Self {
        Self(((high as u128) << 64) | low as u128)
    }

    pub fn high(&self) -> u64 {
        (self.0 >> 64) as u64
    }

    pub fn low(&self) -> u64 {
        self.0 as u64
    }
}

impl From<u128> for ElectionId {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl Display for ElectionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{ high: {} low: {} }}", self.high(), self.low())
    }
}

/// Administrative role under which a connection arbitrates.
///
/// An absent or empty role name on the wire denotes the root role; the
/// conversion happens here, once, so `""` and "unset" can never be keyed
/// apart downstream.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Role {
    #[default]
    Root,
    Named(String),
}

impl Role {
    /// Canonicalizes an optional wire role name.
    pub fn normalize(name: Option<&str>) -> Self {
        match name {
            None | Some("") => Self::Root,
            Some(name) => Self::Named(name.to_string()),
        }
    }

    /// The wire-facing name, absent for the root role.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Root => None,
            Self::Named(name) => Some(name),
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Root => write!(f, "<default>"),
            Self::Named(name) => write!(f, "'{name}'"),
        }
    }
}

/// Arbitration message received from a controller over its stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArbitrationUpdate {
    pub device_id: u64,
    pub role: Option<String>,
    pub election_id: Option<ElectionId>,
}

/// Arbitration standing pushed back to a controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArbitrationStatus {
    pub device_id: u64,
    pub role: Option<String>,
    /// Highest election id ever accepted as primary for the role.
    pub primary_election_id: Option<ElectionId>,
    /// `Ok`, `AlreadyExists` or `NotFound` standing triple.
    pub status: Status,
}

/// Packet a controller asks the device to emit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketOut {
    pub payload: Vec<u8>,
}

/// Packet the device surfaced for delivery to the primary controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketIn {
    pub payload: Vec<u8>,
}

/// Error surfaced asynchronously on a stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamError {
    pub canonical_code: crate::status::Code,
    pub message: String,
    /// Echo of the packet-out that failed, when one did.
    pub packet_out: Option<PacketOut>,
}

/// Inbound message on a controller's bidirectional stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamMessageRequest {
    Arbitration(ArbitrationUpdate),
    Packet(PacketOut),
    /// Digest acks and other data-plane traffic the backend interprets.
    Other,
}

/// Outbound message on a controller's bidirectional stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamMessageResponse {
    Arbitration(ArbitrationStatus),
    Packet(PacketIn),
    Error(StreamError),
}

/// Opaque forwarding-state mutation carried by a write request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForwardingUpdate(pub Vec<u8>);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteRequest {
    pub device_id: u64,
    pub role: Option<String>,
    pub election_id: Option<ElectionId>,
    pub updates: Vec<ForwardingUpdate>,
}

/// Opaque entity filter carried by a read request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityFilter(pub Vec<u8>);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadRequest {
    pub device_id: u64,
    pub entities: Vec<EntityFilter>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadResponse {
    pub entities: Vec<EntityFilter>,
}

/// Pipeline configuration blob set on and read back from a device.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ForwardingPipelineConfig {
    pub p4info: Vec<u8>,
    pub device_config: Vec<u8>,
    pub cookie: Option<u64>,
}

/// Commit semantics requested alongside a pipeline configuration push.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigAction {
    Verify,
    VerifyAndSave,
    VerifyAndCommit,
    Commit,
    ReconcileAndCommit,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetForwardingPipelineConfigRequest {
    pub device_id: u64,
    pub role: Option<String>,
    pub election_id: Option<ElectionId>,
    pub action: ConfigAction,
    pub config: Option<ForwardingPipelineConfig>,
}

/// Which parts of the stored pipeline configuration a reader wants back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigResponseType {
    All,
    CookieOnly,
    P4infoAndCookie,
    DeviceConfigAndCookie,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GetForwardingPipelineConfigRequest {
    pub device_id: u64,
    pub response_type: ConfigResponseType,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GetForwardingPipelineConfigResponse {
    pub config: ForwardingPipelineConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapabilitiesResponse {
    pub p4runtime_api_version: String,
}

/// Credentials every mutating request carries for primary authorization.
///
/// The seam that lets `SdnControllerManager::allow_request` accept any
/// request shape without knowing it.
pub trait MutatingRequest {
    fn role_name(&self) -> Option<&str>;
    fn election_id(&self) -> Option<ElectionId>;
}

impl MutatingRequest for WriteRequest {
    fn role_name(&self) -> Option<&str> {
        self.role.as_deref()
    }

    fn election_id(&self) -> Option<ElectionId> {
        self.election_id
    }
}

impl MutatingRequest for SetForwardingPipelineConfigRequest {
    fn role_name(&self) -> Option<&str> {
        self.role.as_deref()
    }

    fn election_id(&self) -> Option<ElectionId> {
        self.election_id
    }
}
