/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! # p4rt-server
//!
//! Transport-agnostic P4Runtime server core for one forwarding device:
//! controller arbitration, primary authorization, and request dispatch to a
//! pluggable device backend.
//!
//! Controllers connect over bidirectional streams, claim a role and an
//! election id, and the highest election id per role wins the primary seat.
//! Only the primary may mutate device state; everyone else is a backup that
//! is told, on every primary change, where it stands. The recorded primary
//! election id per role only ever grows, so a restarted primary can reclaim
//! its seat and a stale one can never slip back in with a lower id.
//!
//! The crate exposes:
//! - [`SdnControllerManager`] with `handle_arbitration_update`, `disconnect`,
//!   `allow_request`, and `send_stream_message_to_primary`,
//! - [`P4rtServer`], the per-device request front end over a
//!   [`SwitchProvider`] backend,
//! - [`run_stream_channel`] and [`spawn_packet_in_forwarder`], the tasks a
//!   transport binding wires to its streams.
//!
//! ```
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//! use p4rt_server::{
//!     run_stream_channel, P4rtServer, StreamMessageRequest, StreamMessageResponse,
//!     SwitchProvider,
//! };
//!
//! # async fn serve(provider: Arc<dyn SwitchProvider>) {
//! let server = P4rtServer::new(provider);
//! let (request_tx, request_rx) = mpsc::channel::<StreamMessageRequest>(32);
//! let (response_tx, _response_rx) = mpsc::channel::<StreamMessageResponse>(32);
//! // The transport feeds request_tx and drains response_rx.
//! let _ = run_stream_channel(&server, request_rx, response_tx).await;
//! # }
//! ```

pub mod api;
pub mod control_plane;
pub mod data_plane;
mod status;

pub use api::messages::{
    ArbitrationStatus, ArbitrationUpdate, CapabilitiesResponse, ConfigAction, ConfigResponseType,
    ElectionId, EntityFilter, ForwardingPipelineConfig, ForwardingUpdate,
    GetForwardingPipelineConfigRequest, GetForwardingPipelineConfigResponse, MutatingRequest,
    PacketIn, PacketOut, ReadRequest, ReadResponse, Role, SetForwardingPipelineConfigRequest,
    StreamError, StreamMessageRequest, StreamMessageResponse, WriteRequest,
};
pub use api::provider::SwitchProvider;
pub use api::server::{P4rtServer, P4RUNTIME_API_VERSION};
pub use control_plane::connection::{ChannelSink, SdnConnection, StreamSink};
pub use control_plane::manager::SdnControllerManager;
pub use data_plane::packet_in::spawn_packet_in_forwarder;
pub use data_plane::stream_channel::run_stream_channel;
pub use status::{Code, Status};
