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

//! Control-plane layer.
//!
//! Owns the per-connection arbitration state and the device-wide controller
//! manager. This layer decides who the primary controller is for each role,
//! rejects election-id collisions and device-id mismatches before any state
//! changes, and guarantees that a recorded primary election id never
//! decreases.

pub mod connection;
pub mod manager;
