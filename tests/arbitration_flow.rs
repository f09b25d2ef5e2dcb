//! End-to-end arbitration over live stream-channel tasks: election,
//! failover notification, and write authorization against the crate's
//! public surface only.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use p4rt_server::{
    run_stream_channel, spawn_packet_in_forwarder, ArbitrationStatus, ArbitrationUpdate, Code,
    ElectionId, ForwardingPipelineConfig, ForwardingUpdate, P4rtServer, PacketIn, PacketOut,
    ReadRequest, ReadResponse, Status, StreamMessageRequest, StreamMessageResponse,
    SwitchProvider, WriteRequest,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[derive(Default)]
struct FakeSwitch {
    writes: Mutex<Vec<WriteRequest>>,
    packets_out: Mutex<Vec<(u64, PacketOut)>>,
}

#[async_trait]
impl SwitchProvider for FakeSwitch {
    async fn write_forwarding_entries(&self, request: &WriteRequest) -> Result<(), Status> {
        self.writes.lock().expect("writes lock").push(request.clone());
        Ok(())
    }

    async fn read_forwarding_entries(
        &self,
        _request: &ReadRequest,
    ) -> Result<ReadResponse, Status> {
        Ok(ReadResponse::default())
    }

    async fn send_packet_out(&self, device_id: u64, packet: PacketOut) -> Result<(), Status> {
        self.packets_out
            .lock()
            .expect("packets lock")
            .push((device_id, packet));
        Ok(())
    }

    async fn verify_pipeline_config(
        &self,
        _device_id: u64,
        _config: &ForwardingPipelineConfig,
    ) -> Result<(), Status> {
        Ok(())
    }

    async fn save_pipeline_config(
        &self,
        _device_id: u64,
        _config: &ForwardingPipelineConfig,
    ) -> Result<(), Status> {
        Ok(())
    }

    async fn commit_pipeline_config(&self, _device_id: u64) -> Result<(), Status> {
        Ok(())
    }

    async fn reconcile_and_commit_pipeline_config(
        &self,
        _device_id: u64,
        _config: &ForwardingPipelineConfig,
    ) -> Result<(), Status> {
        Ok(())
    }

    async fn get_pipeline_config(
        &self,
        _device_id: u64,
    ) -> Result<ForwardingPipelineConfig, Status> {
        Ok(ForwardingPipelineConfig::default())
    }
}

/// One controller stream served by its own task, with handles to drive it.
struct Controller {
    requests: mpsc::Sender<StreamMessageRequest>,
    responses: mpsc::Receiver<StreamMessageResponse>,
    serve: JoinHandle<Result<(), Status>>,
}

impl Controller {
    fn connect(server: &Arc<P4rtServer>) -> Self {
        let (request_tx, request_rx) = mpsc::channel(16);
        let (response_tx, response_rx) = mpsc::channel(16);
        let server = server.clone();
        let serve =
            tokio::spawn(async move { run_stream_channel(&server, request_rx, response_tx).await });
        Self {
            requests: request_tx,
            responses: response_rx,
            serve,
        }
    }

    async fn arbitrate(&mut self, device_id: u64, election_id: u128) -> ArbitrationStatus {
        self.requests
            .send(StreamMessageRequest::Arbitration(ArbitrationUpdate {
                device_id,
                role: None,
                election_id: Some(ElectionId(election_id)),
            }))
            .await
            .expect("stream task alive");
        self.expect_arbitration().await
    }

    async fn expect_arbitration(&mut self) -> ArbitrationStatus {
        match self.recv().await {
            StreamMessageResponse::Arbitration(status) => status,
            other => panic!("expected arbitration status, got {other:?}"),
        }
    }

    async fn recv(&mut self) -> StreamMessageResponse {
        timeout(Duration::from_secs(2), self.responses.recv())
            .await
            .expect("response within two seconds")
            .expect("stream still open")
    }

    /// Closes the inbound half and waits for the serving task to finish.
    async fn close(self) -> (Result<(), Status>, mpsc::Receiver<StreamMessageResponse>) {
        drop(self.requests);
        let result = timeout(Duration::from_secs(2), self.serve)
            .await
            .expect("stream task exits")
            .expect("stream task not cancelled");
        (result, self.responses)
    }
}

fn write_request(election_id: u128) -> WriteRequest {
    WriteRequest {
        device_id: 1,
        role: None,
        election_id: Some(ElectionId(election_id)),
        updates: vec![ForwardingUpdate(vec![0xab])],
    }
}

#[tokio::test]
async fn primary_failover_keeps_the_recorded_election_id_authoritative() {
    init_tracing();
    let switch = Arc::new(FakeSwitch::default());
    let server = Arc::new(P4rtServer::new(switch.clone()));

    // Controller A wins the primary seat with the higher election id.
    let mut a = Controller::connect(&server);
    let a_status = a.arbitrate(1, 100).await;
    assert_eq!(a_status.status.code, Code::Ok);
    assert_eq!(a_status.primary_election_id, Some(ElectionId(100)));

    // Controller B joins as a backup and is told a primary exists.
    let mut b = Controller::connect(&server);
    let b_status = b.arbitrate(1, 50).await;
    assert_eq!(b_status.status.code, Code::AlreadyExists);
    assert_eq!(b_status.primary_election_id, Some(ElectionId(100)));

    // Only the primary's credentials clear a write.
    server.write(&write_request(100)).await.expect("primary write");
    let denied = server
        .write(&write_request(50))
        .await
        .expect_err("backup write");
    assert_eq!(denied.code, Code::PermissionDenied);

    // A disconnects. B is notified, and the notification still points at
    // the departed primary's election id.
    let (a_result, _a_responses) = a.close().await;
    a_result.expect("clean close");
    let after_failover = b.expect_arbitration().await;
    assert_eq!(after_failover.status.code, Code::AlreadyExists);
    assert_eq!(after_failover.primary_election_id, Some(ElectionId(100)));

    // B still cannot write: the recorded id outlives the connection.
    let denied = server
        .write(&write_request(50))
        .await
        .expect_err("backup write after failover");
    assert_eq!(denied.code, Code::PermissionDenied);

    // A reconnect with the recorded id reclaims the seat and B hears it.
    let mut a2 = Controller::connect(&server);
    let reclaim = a2.arbitrate(1, 100).await;
    assert_eq!(reclaim.status.code, Code::Ok);
    let b_update = b.expect_arbitration().await;
    assert_eq!(b_update.status.code, Code::AlreadyExists);

    assert_eq!(switch.writes.lock().expect("writes lock").len(), 1);
}

#[tokio::test]
async fn packets_flow_between_the_device_and_the_primary() {
    init_tracing();
    let switch = Arc::new(FakeSwitch::default());
    let server = Arc::new(P4rtServer::new(switch.clone()));

    let mut primary = Controller::connect(&server);
    let status = primary.arbitrate(7, 10).await;
    assert_eq!(status.status.code, Code::Ok);

    // Packet out from the primary lands on the backend with the stream's
    // pinned device id.
    primary
        .requests
        .send(StreamMessageRequest::Packet(PacketOut {
            payload: vec![1, 2, 3],
        }))
        .await
        .expect("stream task alive");

    // Packet ins are punted to the primary's stream.
    let (punt_tx, punt_rx) = mpsc::channel(4);
    let forwarder = spawn_packet_in_forwarder(server.controller_manager(), punt_rx);
    punt_tx
        .send(PacketIn { payload: vec![9] })
        .await
        .expect("punt");

    match primary.recv().await {
        StreamMessageResponse::Packet(packet) => assert_eq!(packet.payload, vec![9]),
        other => panic!("expected packet in, got {other:?}"),
    }

    drop(punt_tx);
    timeout(Duration::from_secs(2), forwarder)
        .await
        .expect("forwarder exits")
        .expect("forwarder task");

    let (result, _responses) = primary.close().await;
    result.expect("clean close");

    let packets = switch.packets_out.lock().expect("packets lock").clone();
    assert_eq!(packets, vec![(7, PacketOut { payload: vec![1, 2, 3] })]);
}
