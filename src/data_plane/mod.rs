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

//! Data-plane layer.
//!
//! Per-stream message pumps: the bidirectional stream-channel loop that
//! feeds arbitration and packet-out traffic into the control plane, and the
//! packet-in forwarder that pushes device punts to the primary controller.

pub mod packet_in;
pub mod stream_channel;
