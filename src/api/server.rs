//! Request front end for one forwarding device.
//!
//! [`P4rtServer`] owns the arbitration manager and the device backend.
//! Every mutating request is checked against the recorded primary before it
//! can reach the backend; reads and capability probes pass straight
//! through. The transport binding (gRPC or otherwise) lives outside this
//! crate and calls these methods per received request.

use std::sync::Arc;

use tracing::info;

use crate::api::messages::{
    CapabilitiesResponse, ConfigAction, ConfigResponseType, ForwardingPipelineConfig,
    GetForwardingPipelineConfigRequest, GetForwardingPipelineConfigResponse, ReadRequest,
    ReadResponse, SetForwardingPipelineConfigRequest, WriteRequest,
};
use crate::api::provider::SwitchProvider;
use crate::control_plane::manager::SdnControllerManager;
use crate::status::{Code, Status};

const COMPONENT: &str = "p4rt_server";

/// Version reported to controllers probing [`P4rtServer::capabilities`].
pub const P4RUNTIME_API_VERSION: &str = "1.3.0";

pub struct P4rtServer {
    controller_manager: Arc<SdnControllerManager>,
    switch_provider: Arc<dyn SwitchProvider>,
}

impl P4rtServer {
    pub fn new(switch_provider: Arc<dyn SwitchProvider>) -> Self {
        Self {
            controller_manager: Arc::new(SdnControllerManager::new()),
            switch_provider,
        }
    }

    /// Arbitration manager shared with the stream-channel and packet-in
    /// tasks serving this device.
    pub fn controller_manager(&self) -> Arc<SdnControllerManager> {
        self.controller_manager.clone()
    }

    pub fn switch_provider(&self) -> Arc<dyn SwitchProvider> {
        self.switch_provider.clone()
    }

    /// Applies forwarding-state mutations on behalf of the primary.
    pub async fn write(&self, request: &WriteRequest) -> Result<(), Status> {
        self.controller_manager.allow_mutating_request(request)?;
        if request.updates.is_empty() {
            return Ok(());
        }
        if request.device_id == 0 {
            return Err(Status::fail_with_code(
                Code::InvalidArgument,
                "device_id can not be 0 or null.",
            ));
        }
        self.switch_provider.write_forwarding_entries(request).await
    }

    /// Reads forwarding state. Reads are open to any connection; only
    /// mutations require primary standing.
    pub async fn read(&self, request: &ReadRequest) -> Result<ReadResponse, Status> {
        if request.entities.is_empty() {
            return Ok(ReadResponse::default());
        }
        if request.device_id == 0 {
            return Err(Status::fail_with_code(
                Code::InvalidArgument,
                "Device ID cannot be 0.",
            ));
        }
        self.switch_provider.read_forwarding_entries(request).await
    }

    /// Pushes a pipeline configuration with the requested commit semantics.
    pub async fn set_forwarding_pipeline_config(
        &self,
        request: &SetForwardingPipelineConfigRequest,
    ) -> Result<(), Status> {
        info!(
            component = COMPONENT,
            device_id = request.device_id,
            election_id = %request
                .election_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "<none>".to_string()),
            "received a forwarding pipeline config push"
        );
        if request.device_id == 0 {
            return Err(Status::fail_with_code(
                Code::InvalidArgument,
                "Invalid device ID.",
            ));
        }
        self.controller_manager.allow_mutating_request(request)?;

        let device_id = request.device_id;
        match request.action {
            ConfigAction::Verify => {
                let config = required_config(request)?;
                self.switch_provider
                    .verify_pipeline_config(device_id, config)
                    .await
            }
            ConfigAction::VerifyAndSave => {
                let config = required_config(request)?;
                self.switch_provider
                    .verify_pipeline_config(device_id, config)
                    .await?;
                self.switch_provider
                    .save_pipeline_config(device_id, config)
                    .await
            }
            ConfigAction::VerifyAndCommit => {
                let config = required_config(request)?;
                self.switch_provider
                    .verify_pipeline_config(device_id, config)
                    .await?;
                self.switch_provider.commit_pipeline_config(device_id).await
            }
            ConfigAction::Commit => self.switch_provider.commit_pipeline_config(device_id).await,
            ConfigAction::ReconcileAndCommit => {
                let config = required_config(request)?;
                self.switch_provider
                    .reconcile_and_commit_pipeline_config(device_id, config)
                    .await
            }
        }
    }

    /// Returns the stored pipeline configuration, trimmed to the parts the
    /// caller asked for.
    pub async fn get_forwarding_pipeline_config(
        &self,
        request: &GetForwardingPipelineConfigRequest,
    ) -> Result<GetForwardingPipelineConfigResponse, Status> {
        let stored = self
            .switch_provider
            .get_pipeline_config(request.device_id)
            .await?;
        let config = match request.response_type {
            ConfigResponseType::All => stored,
            ConfigResponseType::CookieOnly => ForwardingPipelineConfig {
                cookie: stored.cookie,
                ..ForwardingPipelineConfig::default()
            },
            ConfigResponseType::P4infoAndCookie => ForwardingPipelineConfig {
                p4info: stored.p4info,
                cookie: stored.cookie,
                ..ForwardingPipelineConfig::default()
            },
            ConfigResponseType::DeviceConfigAndCookie => ForwardingPipelineConfig {
                device_config: stored.device_config,
                cookie: stored.cookie,
                ..ForwardingPipelineConfig::default()
            },
        };
        Ok(GetForwardingPipelineConfigResponse { config })
    }

    pub fn capabilities(&self) -> CapabilitiesResponse {
        CapabilitiesResponse {
            p4runtime_api_version: P4RUNTIME_API_VERSION.to_string(),
        }
    }
}

fn required_config(
    request: &SetForwardingPipelineConfigRequest,
) -> Result<&ForwardingPipelineConfig, Status> {
    request.config.as_ref().ok_or_else(|| {
        Status::fail_with_code(
            Code::InvalidArgument,
            "Request is missing the forwarding pipeline config.",
        )
    })
}
