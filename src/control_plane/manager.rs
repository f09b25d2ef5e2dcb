//! Controller arbitration and primary-authorization core.
//!
//! One [`SdnControllerManager`] serves one forwarding device. It tracks all
//! live controller connections, elects a primary per role by highest
//! election id, answers authorization checks for mutating requests, and
//! pushes arbitration standing onto affected connections' streams.
//!
//! All shared state sits behind one mutex. Critical sections are short and
//! CPU-only: notifications are *computed* under the lock and *written* to
//! the outbound stream halves only after it is released, so a peer that is
//! not draining its stream can never stall arbitration for others.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info, warn};

use crate::api::messages::{
    ArbitrationStatus, ArbitrationUpdate, ElectionId, MutatingRequest, Role, StreamMessageResponse,
};
use crate::control_plane::connection::{ConnectionId, SdnConnection, StreamSink};
use crate::status::{Code, Status};

const COMPONENT: &str = "sdn_controller_manager";

fn pretty_election_id(election_id: Option<ElectionId>) -> String {
    election_id.map_or_else(|| "<backup>".to_string(), |id| id.to_string())
}

/// Snapshot of one active connection the manager can reach for broadcasts.
struct ConnectionRecord {
    id: ConnectionId,
    role: Role,
    election_id: Option<ElectionId>,
    outbound: Arc<dyn StreamSink>,
}

#[derive(Default)]
struct ManagerState {
    /// Adopted from the first arbitration request; later requests must match.
    device_id: Option<u64>,
    /// Live initialized connections, in arrival order.
    connections: Vec<ConnectionRecord>,
    /// Highest election id ever accepted as primary, per role. Entries
    /// outlive their connection so a reconnecting primary can reclaim its
    /// standing; values never decrease.
    primary_by_role: HashMap<Role, ElectionId>,
}

impl ManagerState {
    /// Builds the arbitration standing for a connection of `role` holding
    /// `election_id`. Standing is judged against the *recorded* primary id
    /// alone; a primary that disconnected keeps its recorded authority
    /// until a higher id displaces it.
    fn arbitration_status(
        &self,
        role: &Role,
        election_id: Option<ElectionId>,
    ) -> ArbitrationStatus {
        let primary_election_id = self.primary_by_role.get(role).copied();
        let status = match primary_election_id {
            None => Status::fail_with_code(
                Code::NotFound,
                "you are a backup connection, and NO primary connection exists.",
            ),
            Some(primary) if Some(primary) == election_id => {
                Status::ok_with_message("you are the primary connection.")
            }
            Some(_) => Status::fail_with_code(
                Code::AlreadyExists,
                "you are a backup connection, and a primary connection exists.",
            ),
        };
        ArbitrationStatus {
            device_id: self.device_id.unwrap_or_default(),
            role: role.name().map(str::to_string),
            primary_election_id,
            status,
        }
    }

    /// Collects (sink, response) pairs for every active connection of `role`.
    fn responses_for_role(
        &self,
        role: &Role,
    ) -> Vec<(Arc<dyn StreamSink>, StreamMessageResponse)> {
        self.connections
            .iter()
            .filter(|record| record.role == *role)
            .map(|record| {
                (
                    record.outbound.clone(),
                    StreamMessageResponse::Arbitration(
                        self.arbitration_status(&record.role, record.election_id),
                    ),
                )
            })
            .collect()
    }
}

/// Concurrency-safe arbitration state for one served device.
pub struct SdnControllerManager {
    state: Mutex<ManagerState>,
}

impl Default for SdnControllerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SdnControllerManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ManagerState::default()),
        }
    }

    /// Processes one arbitration message from `connection`.
    ///
    /// Validation failures (`FailedPrecondition` on a device-id mismatch,
    /// `InvalidArgument` on an election-id collision within the role) leave
    /// all state untouched. On success the connection is committed to the
    /// active set and either every connection of the role (on a primary
    /// change) or just the caller receives a fresh arbitration standing.
    pub fn handle_arbitration_update(
        &self,
        update: &ArbitrationUpdate,
        connection: &mut SdnConnection,
    ) -> Result<(), Status> {
        let pending = {
            let mut state = self.state.lock().expect("arbitration state lock poisoned");

            match state.device_id {
                None => {
                    info!(
                        component = COMPONENT,
                        device_id = update.device_id,
                        "adopting device id from first arbitration request"
                    );
                    state.device_id = Some(update.device_id);
                }
                Some(device_id) if device_id != update.device_id => {
                    return Err(Status::fail_with_code(
                        Code::FailedPrecondition,
                        format!(
                            "Arbitration request has the wrong device ID '{}'. \
							 Cannot establish connection to this device '{device_id}'.",
                            update.device_id
                        ),
                    ));
                }
                Some(_) => {}
            }

            let role = Role::normalize(update.role.as_deref());
            let election_id = update.election_id;

            // Re-sent arbitration with unchanged values: re-send the current
            // standing to this connection only and leave global state alone.
            if connection.is_initialized()
                && *connection.role() == role
                && connection.election_id() == election_id
            {
                vec![(
                    connection.outbound(),
                    StreamMessageResponse::Arbitration(
                        state.arbitration_status(&role, election_id),
                    ),
                )]
            } else {
                // An election id must be unique among the active connections
                // of its role (backups without one are unrestricted).
                if let Some(id) = election_id {
                    let collision = state.connections.iter().any(|record| {
                        record.id != connection.id()
                            && record.role == role
                            && record.election_id == Some(id)
                    });
                    if collision {
                        return Err(Status::fail_with_code(
                            Code::InvalidArgument,
                            "Election ID is already used by another connection \
							 with the same role.",
                        ));
                    }
                }

                if connection.is_initialized() {
                    info!(
                        component = COMPONENT,
                        role = %role,
                        election_id = %pretty_election_id(election_id),
                        "updating SDN connection"
                    );
                } else {
                    info!(
                        component = COMPONENT,
                        role = %role,
                        election_id = %pretty_election_id(election_id),
                        "new SDN connection"
                    );
                }

                connection.set_role(role.clone());
                connection.set_election_id(election_id);
                connection.initialize();
                match state
                    .connections
                    .iter_mut()
                    .find(|record| record.id == connection.id())
                {
                    Some(record) => {
                        record.role = role.clone();
                        record.election_id = election_id;
                    }
                    None => state.connections.push(ConnectionRecord {
                        id: connection.id(),
                        role: role.clone(),
                        election_id,
                        outbound: connection.outbound(),
                    }),
                }

                if update_primary_connection_state(&mut state, &role, election_id) {
                    state.responses_for_role(&role)
                } else {
                    vec![(
                        connection.outbound(),
                        StreamMessageResponse::Arbitration(
                            state.arbitration_status(&role, election_id),
                        ),
                    )]
                }
            }
        };

        dispatch_responses(pending);
        Ok(())
    }

    /// Removes `connection` from the active set. If it held the recorded
    /// primary election id for its role, every remaining connection of that
    /// role is told the primary standing changed.
    pub fn disconnect(&self, connection: &SdnConnection) {
        // A connection that never completed arbitration was never tracked.
        if !connection.is_initialized() {
            return;
        }

        let pending = {
            let mut state = self.state.lock().expect("arbitration state lock poisoned");

            info!(
                component = COMPONENT,
                role = %connection.role(),
                election_id = %pretty_election_id(connection.election_id()),
                "dropping SDN connection"
            );
            state
                .connections
                .retain(|record| record.id != connection.id());

            let was_primary = connection.election_id().is_some()
                && connection.election_id().as_ref()
                    == state.primary_by_role.get(connection.role());
            if was_primary {
                state.responses_for_role(connection.role())
            } else {
                Vec::new()
            }
        };

        dispatch_responses(pending);
    }

    /// Authorization check for a mutating request: only the holder of the
    /// recorded primary election id for the role may proceed.
    ///
    /// Reads only the recorded primary table, so a primary that has since
    /// disconnected stays authorized until arbitration moves the table;
    /// `disconnect` re-broadcasts promptly so controllers re-arbitrate.
    pub fn allow_request(
        &self,
        role: &Role,
        election_id: Option<ElectionId>,
    ) -> Result<(), Status> {
        let state = self.state.lock().expect("arbitration state lock poisoned");

        let Some(election_id) = election_id else {
            return Err(Status::fail_with_code(
                Code::PermissionDenied,
                "Request does not have an election ID.",
            ));
        };

        match state.primary_by_role.get(role) {
            None => Err(Status::fail_with_code(
                Code::PermissionDenied,
                "Only the primary connection can issue requests, but no primary \
				 connection has been established.",
            )),
            Some(primary) if *primary != election_id => Err(Status::fail_with_code(
                Code::PermissionDenied,
                "Only the primary connection can issue requests.",
            )),
            Some(_) => Ok(()),
        }
    }

    /// [`Self::allow_request`] for anything carrying wire-shaped credentials.
    pub fn allow_mutating_request<R: MutatingRequest>(&self, request: &R) -> Result<(), Status> {
        self.allow_request(&Role::normalize(request.role_name()), request.election_id())
    }

    /// Delivers `response` to the primary connection of `role`, if one is
    /// recorded and active. Returns false without a primary to deliver to.
    pub fn send_stream_message_to_primary(
        &self,
        role: &Role,
        response: StreamMessageResponse,
    ) -> bool {
        let outbound = {
            let state = self.state.lock().expect("arbitration state lock poisoned");

            let Some(primary) = state.primary_by_role.get(role).copied() else {
                return false;
            };

            let primary_connection = state
                .connections
                .iter()
                .find(|record| record.role == *role && record.election_id == Some(primary));
            match primary_connection {
                Some(record) => record.outbound.clone(),
                None => {
                    error!(
                        component = COMPONENT,
                        role = %role,
                        election_id = %primary,
                        "found an election ID for the primary connection, but no \
						 active connection holds it"
                    );
                    return false;
                }
            }
        };

        if !outbound.write(response) {
            warn!(
                component = COMPONENT,
                role = %role,
                "could not deliver stream message to the primary connection"
            );
        }
        true
    }
}

/// Re-derives the primary for `role` after a successful arbitration commit.
/// Returns true when the primary standing changed (including a reconnecting
/// or reconfirming primary) and all connections of the role must be told.
fn update_primary_connection_state(
    state: &mut ManagerState,
    role: &Role,
    election_id: Option<ElectionId>,
) -> bool {
    debug!(component = COMPONENT, role = %role, "checking for new primary connection");

    // Highest election id among the role's active connections.
    let max_election_id = state
        .connections
        .iter()
        .filter(|record| record.role == *role)
        .filter_map(|record| record.election_id)
        .max();

    // Highest id ever recorded as primary; need not belong to an active
    // connection anymore.
    let recorded = state.primary_by_role.get(role).copied();

    // A present incoming id equal to the active maximum means the old
    // primary is reconnecting or reconfirming itself.
    let primary_is_reconnecting = election_id.is_some() && election_id == max_election_id;

    if max_election_id != recorded || primary_is_reconnecting {
        match max_election_id {
            Some(max) if recorded.is_none() || Some(max) > recorded => {
                info!(
                    component = COMPONENT,
                    role = %role,
                    election_id = %max,
                    "new primary connection for role"
                );
                state.primary_by_role.insert(role.clone(), max);
            }
            Some(max) if Some(max) == recorded => {
                info!(
                    component = COMPONENT,
                    role = %role,
                    election_id = %max,
                    "old primary connection is becoming the current primary again"
                );
            }
            _ => {
                // The recorded id, if any, is retained: it never decreases.
                info!(
                    component = COMPONENT,
                    role = %role,
                    "no longer have an active primary connection for role"
                );
            }
        }
        return true;
    }

    debug!(component = COMPONENT, role = %role, "primary connection has not changed");
    false
}

/// Writes computed notifications after the state lock is released. A failed
/// write is logged and tolerated; it never fails the triggering operation.
fn dispatch_responses(pending: Vec<(Arc<dyn StreamSink>, StreamMessageResponse)>) {
    for (outbound, response) in pending {
        if !outbound.write(response) {
            error!(
                component = COMPONENT,
                "could not send arbitration update response to connection"
            );
        }
    }
}
