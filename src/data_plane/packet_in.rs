//! Packet-in forwarding task.
//!
//! The device backend punts packets on an mpsc channel; one forwarder task
//! per device drains it and hands each packet to the primary controller of
//! the root role. A packet with no primary to receive it is dropped with a
//! log line, matching the at-most-once delivery the stream offers anyway.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::messages::{PacketIn, Role, StreamMessageResponse};
use crate::control_plane::manager::SdnControllerManager;

const COMPONENT: &str = "packet_in_forwarder";

/// Spawns the forwarder for one device. The task ends when the sending
/// half of `packets` is dropped.
pub fn spawn_packet_in_forwarder(
    manager: Arc<SdnControllerManager>,
    mut packets: mpsc::Receiver<PacketIn>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(packet) = packets.recv().await {
            let delivered = manager
                .send_stream_message_to_primary(&Role::Root, StreamMessageResponse::Packet(packet));
            if !delivered {
                warn!(
                    component = COMPONENT,
                    "dropping packet in, no primary controller connection to deliver it to"
                );
            }
        }
        debug!(component = COMPONENT, "packet in channel closed, forwarder exiting");
    })
}
