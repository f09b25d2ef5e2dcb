//! Device-backend capability trait consumed by the dispatch shell.
//!
//! The server never interprets forwarding state or pipeline blobs itself;
//! after a request clears arbitration it is handed to an implementation of
//! [`SwitchProvider`] supplied at construction.

use async_trait::async_trait;

use crate::api::messages::{
    ForwardingPipelineConfig, PacketOut, ReadRequest, ReadResponse, WriteRequest,
};
use crate::status::Status;

#[async_trait]
pub trait SwitchProvider: Send + Sync {
    /// Applies the forwarding-state mutations of an authorized write.
    async fn write_forwarding_entries(&self, request: &WriteRequest) -> Result<(), Status>;

    /// Reads forwarding state selected by the request's entity filters.
    async fn read_forwarding_entries(&self, request: &ReadRequest) -> Result<ReadResponse, Status>;

    /// Emits a packet on the device's data plane.
    async fn send_packet_out(&self, device_id: u64, packet: PacketOut) -> Result<(), Status>;

    async fn verify_pipeline_config(
        &self,
        device_id: u64,
        config: &ForwardingPipelineConfig,
    ) -> Result<(), Status>;

    async fn save_pipeline_config(
        &self,
        device_id: u64,
        config: &ForwardingPipelineConfig,
    ) -> Result<(), Status>;

    async fn commit_pipeline_config(&self, device_id: u64) -> Result<(), Status>;

    async fn reconcile_and_commit_pipeline_config(
        &self,
        device_id: u64,
        config: &ForwardingPipelineConfig,
    ) -> Result<(), Status>;

    /// Returns the last saved pipeline configuration for the device.
    async fn get_pipeline_config(&self, device_id: u64)
        -> Result<ForwardingPipelineConfig, Status>;
}
