//! Bidirectional stream-channel loop, one task per connected controller.
//!
//! The loop pins the stream to the device id of its first arbitration
//! message, routes arbitration to the controller manager and data-plane
//! traffic to the device backend, and always deregisters the connection
//! exactly once when it ends, whatever branch ended it.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::messages::{
    PacketOut, StreamError, StreamMessageRequest, StreamMessageResponse,
};
use crate::api::provider::SwitchProvider;
use crate::api::server::P4rtServer;
use crate::control_plane::connection::{ChannelSink, SdnConnection};
use crate::control_plane::manager::SdnControllerManager;
use crate::status::{Code, Status};

const COMPONENT: &str = "stream_channel";

/// Serves one controller stream until the inbound half closes or a fatal
/// protocol error occurs. The returned status is what the transport should
/// report when closing the stream.
pub async fn run_stream_channel(
    server: &P4rtServer,
    mut inbound: mpsc::Receiver<StreamMessageRequest>,
    outbound: mpsc::Sender<StreamMessageResponse>,
) -> Result<(), Status> {
    let manager = server.controller_manager();
    let provider = server.switch_provider();
    let mut connection = SdnConnection::new(Arc::new(ChannelSink::new(outbound)));

    let result = serve_stream(&manager, provider.as_ref(), &mut inbound, &mut connection).await;

    // Sole cleanup path for every way the loop can end.
    manager.disconnect(&connection);
    result
}

async fn serve_stream(
    manager: &SdnControllerManager,
    provider: &dyn SwitchProvider,
    inbound: &mut mpsc::Receiver<StreamMessageRequest>,
    connection: &mut SdnConnection,
) -> Result<(), Status> {
    // Device id from the first arbitration message; later messages on this
    // stream must agree.
    let mut node_id: Option<u64> = None;

    while let Some(request) = inbound.recv().await {
        match request {
            StreamMessageRequest::Arbitration(update) => {
                info!(
                    component = COMPONENT,
                    device_id = update.device_id,
                    "received arbitration request"
                );
                if update.device_id == 0 {
                    return Err(Status::fail_with_code(
                        Code::InvalidArgument,
                        "Invalid node (aka device) ID.",
                    ));
                }
                match node_id {
                    None => node_id = Some(update.device_id),
                    Some(pinned) if pinned != update.device_id => {
                        return Err(Status::fail_with_code(
                            Code::InvalidArgument,
                            format!(
                                "Node (aka device) ID for this stream has changed. \
								 Was {pinned}, now is {}.",
                                update.device_id
                            ),
                        ));
                    }
                    Some(_) => {}
                }
                if let Err(status) = manager.handle_arbitration_update(&update, connection) {
                    warn!(
                        component = COMPONENT,
                        status = %status,
                        "failed arbitration request"
                    );
                    return Err(status);
                }
            }
            StreamMessageRequest::Packet(packet) => {
                handle_packet_out(manager, provider, connection, node_id, packet).await;
            }
            StreamMessageRequest::Other => {
                if is_primary(manager, connection) {
                    debug!(
                        component = COMPONENT,
                        "ignoring stream message the backend does not handle"
                    );
                } else {
                    connection.send_stream_message_response(permission_denied_response(None));
                }
            }
        }
    }

    Ok(())
}

/// Packet-outs are accepted only from the primary. A backend failure is
/// surfaced asynchronously to the primary's stream rather than tearing the
/// channel down.
async fn handle_packet_out(
    manager: &SdnControllerManager,
    provider: &dyn SwitchProvider,
    connection: &SdnConnection,
    node_id: Option<u64>,
    packet: PacketOut,
) {
    if !is_primary(manager, connection) {
        connection.send_stream_message_response(permission_denied_response(Some(packet)));
        return;
    }

    let device_id = node_id.unwrap_or_default();
    if let Err(status) = provider.send_packet_out(device_id, packet.clone()).await {
        warn!(
            component = COMPONENT,
            device_id,
            status = %status,
            "device backend rejected a packet out"
        );
        manager.send_stream_message_to_primary(
            connection.role(),
            StreamMessageResponse::Error(StreamError {
                canonical_code: status.code,
                message: format!("Failed to send packet out: {}", status.message),
                packet_out: Some(packet),
            }),
        );
    }
}

fn is_primary(manager: &SdnControllerManager, connection: &SdnConnection) -> bool {
    manager
        .allow_request(connection.role(), connection.election_id())
        .is_ok()
}

fn permission_denied_response(packet: Option<PacketOut>) -> StreamMessageResponse {
    StreamMessageResponse::Error(StreamError {
        canonical_code: Code::PermissionDenied,
        message: "Cannot process request. Only the primary connection can send PacketOuts."
            .to_string(),
        packet_out: packet,
    })
}
