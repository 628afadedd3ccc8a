//! Integration tests for the arbiter daemon.
//!
//! These tests run the real server, executor, and monitors against the
//! simulated hardware backend and talk to the daemon over its socket
//! exactly as the hwa client does.
//!
//! Tests CAN use `.unwrap()` and `.expect()` - the panic-free policy
//! applies to production code only.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use hwa_core::{
    Capability, Direction, FrequencyConfig, PinAddress, Resource, ResourceMap, ResourceName,
};
use hwa_hal::SimAdapter;
use hwa_protocol::{Action, ErrorCode, ProtocolVersion, Reply, Request, Target};
use hwad::executor::spawn_executor;
use hwad::monitor::spawn_edge_monitors;
use hwad::server::DaemonServer;

// ============================================================================
// Constants
// ============================================================================

/// Maximum time to wait for server socket to appear
const SOCKET_WAIT_TIMEOUT: Duration = Duration::from_millis(500);

/// Interval between socket existence checks
const SOCKET_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Grace period for server shutdown
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_millis(100);

/// Idle timeout used by test servers unless overridden
const TEST_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

const VALVE1: PinAddress = PinAddress::new(0x27, 10);
const VALVE2: PinAddress = PinAddress::new(0x27, 6);
const PUMP1: PinAddress = PinAddress::new(0x27, 5);
const MOIST1: PinAddress = PinAddress::new(0x48, 0);
const ACSENSE: PinAddress = PinAddress::new(0x20, 3);

// ============================================================================
// Test Helpers
// ============================================================================

/// A realistic mixed resource map: three relays, one ADC channel, one
/// powerline frequency sense.
fn test_map() -> ResourceMap {
    let switchable = |name: &str, address| Resource {
        name: ResourceName::new(name),
        address,
        direction: Direction::Output,
        capability: Capability::Switchable,
    };

    ResourceMap::from_resources(vec![
        switchable("valve1", VALVE1),
        switchable("valve2", VALVE2),
        switchable("pump1", PUMP1),
        Resource {
            name: ResourceName::new("moist1"),
            address: MOIST1,
            direction: Direction::Analog,
            capability: Capability::AnalogRead,
        },
        Resource {
            name: ResourceName::new("acsense"),
            address: ACSENSE,
            direction: Direction::Input,
            capability: Capability::Frequency,
        },
    ])
    .expect("build test map")
}

fn test_freq_config() -> FrequencyConfig {
    FrequencyConfig {
        window_secs: 1.0,
        min_hz: 1.0,
        max_hz: 1000.0,
    }
}

/// Test server context that manages server lifecycle and cleanup.
struct TestServer {
    socket_path: PathBuf,
    cancel_token: CancellationToken,
    sim: Arc<SimAdapter>,
    _temp_dir: TempDir, // Keep alive for RAII cleanup
}

impl TestServer {
    /// Spawns a full daemon stack (executor, monitors, server) on the
    /// simulated backend.
    async fn spawn_with_idle_timeout(idle_timeout: Duration) -> Self {
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        let socket_path = temp_dir.path().join("hwad-test.sock");

        let map = Arc::new(test_map());
        let sim = Arc::new(SimAdapter::new());
        let cancel_token = CancellationToken::new();

        let executor = spawn_executor(Arc::clone(&map), Arc::clone(&sim) as _);
        spawn_edge_monitors(
            &map,
            Arc::clone(&sim) as _,
            Some(test_freq_config()),
            executor.clone(),
            cancel_token.clone(),
        );

        let server = DaemonServer::new(
            socket_path.clone(),
            executor,
            map,
            idle_timeout,
            cancel_token.clone(),
        );

        tokio::spawn(async move {
            let _ = server.run().await;
        });

        // Wait for socket to be ready with timeout
        let start = tokio::time::Instant::now();
        while start.elapsed() < SOCKET_WAIT_TIMEOUT {
            if socket_path.exists() {
                break;
            }
            sleep(SOCKET_POLL_INTERVAL).await;
        }

        assert!(
            socket_path.exists(),
            "Server socket did not appear within {SOCKET_WAIT_TIMEOUT:?}"
        );

        TestServer {
            socket_path,
            cancel_token,
            sim,
            _temp_dir: temp_dir,
        }
    }

    async fn spawn() -> Self {
        Self::spawn_with_idle_timeout(TEST_IDLE_TIMEOUT).await
    }

    /// Creates a client connection to the server.
    async fn connect(&self) -> TestClient {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .expect("connect to server");
        TestClient::new(stream)
    }

    /// Shuts down the server gracefully.
    async fn shutdown(self) {
        self.cancel_token.cancel();
        sleep(SHUTDOWN_GRACE_PERIOD).await;
    }
}

/// Test client connection with protocol helpers.
struct TestClient {
    reader: BufReader<tokio::net::unix::OwnedReadHalf>,
    writer: tokio::net::unix::OwnedWriteHalf,
}

impl TestClient {
    fn new(stream: UnixStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Sends a request to the server.
    async fn send(&mut self, request: Request) {
        let json = serde_json::to_string(&request).unwrap();
        self.send_raw(&json).await;
    }

    /// Sends a raw line to the server.
    async fn send_raw(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Receives a reply from the server.
    async fn recv(&mut self) -> Reply {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap();
        assert!(!line.is_empty(), "server closed the connection");
        serde_json::from_str(&line).unwrap()
    }

    /// Sends a request and reads the reply.
    async fn request(&mut self, target: Target, action: Action) -> Reply {
        self.send(Request::new(target, action)).await;
        self.recv().await
    }

    /// Reads one reply; returns None if the server closed the stream.
    async fn try_recv(&mut self) -> Option<Reply> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await.unwrap();
        if n == 0 {
            return None;
        }
        Some(serde_json::from_str(&line).unwrap())
    }
}

fn entries(reply: Reply) -> Vec<(String, String)> {
    match reply {
        Reply::Status { entries } => entries
            .into_iter()
            .map(|e| (e.resource.to_string(), e.value))
            .collect(),
        other => panic!("expected status reply, got {other:?}"),
    }
}

// ============================================================================
// Switching and status
// ============================================================================

#[tokio::test]
async fn test_switch_on_then_status() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    let reply = client.request(Target::named("valve1"), Action::On).await;
    assert_eq!(entries(reply), vec![("valve1".to_string(), "on".to_string())]);
    assert_eq!(server.sim.output_level(VALVE1), Some(true));

    let transactions_after_write = server.sim.transaction_count();

    // Status is served from the cache: no further bus traffic.
    let reply = client.request(Target::named("valve1"), Action::Status).await;
    assert_eq!(entries(reply), vec![("valve1".to_string(), "on".to_string())]);
    assert_eq!(server.sim.transaction_count(), transactions_after_write);

    server.shutdown().await;
}

#[tokio::test]
async fn test_status_unknown_before_first_write() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    let reply = client.request(Target::named("pump1"), Action::Status).await;
    assert_eq!(
        entries(reply),
        vec![("pump1".to_string(), "unknown".to_string())]
    );
    assert_eq!(server.sim.transaction_count(), 0);

    server.shutdown().await;
}

#[tokio::test]
async fn test_analog_status_reads_hardware_each_time() {
    let server = TestServer::spawn().await;
    server.sim.set_channel(MOIST1, 2.51134);

    let mut client = server.connect().await;

    let reply = client.request(Target::named("moist1"), Action::Status).await;
    assert_eq!(
        entries(reply),
        vec![("moist1".to_string(), "2.5113".to_string())]
    );
    assert_eq!(server.sim.transaction_count(), 1);

    server.sim.set_channel(MOIST1, 1.0);
    let reply = client.request(Target::named("moist1"), Action::Status).await;
    assert_eq!(
        entries(reply),
        vec![("moist1".to_string(), "1.0000".to_string())]
    );
    assert_eq!(server.sim.transaction_count(), 2);

    server.shutdown().await;
}

#[tokio::test]
async fn test_unknown_resource_rejected_without_bus_traffic() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    let reply = client.request(Target::named("valveX"), Action::On).await;
    match reply {
        Reply::Error { code, message } => {
            assert_eq!(code, ErrorCode::UnknownResource);
            assert!(message.contains("valveX"));
        }
        other => panic!("expected error reply, got {other:?}"),
    }
    assert_eq!(server.sim.transaction_count(), 0);

    server.shutdown().await;
}

#[tokio::test]
async fn test_switching_an_input_rejected() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    let reply = client.request(Target::named("acsense"), Action::On).await;
    match reply {
        Reply::Error { code, .. } => assert_eq!(code, ErrorCode::IncompatibleAction),
        other => panic!("expected error reply, got {other:?}"),
    }

    server.shutdown().await;
}

// ============================================================================
// The `all` target
// ============================================================================

#[tokio::test]
async fn test_all_on_rejected() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    let reply = client.request(Target::All, Action::On).await;
    match reply {
        Reply::Error { code, .. } => assert_eq!(code, ErrorCode::IncompatibleAction),
        other => panic!("expected error reply, got {other:?}"),
    }
    assert_eq!(server.sim.transaction_count(), 0);

    server.shutdown().await;
}

#[tokio::test]
async fn test_all_off_sweeps_switchables_in_order() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    client.request(Target::named("valve1"), Action::On).await;
    client.request(Target::named("pump1"), Action::On).await;

    let reply = client.request(Target::All, Action::Off).await;
    assert_eq!(
        entries(reply),
        vec![
            ("valve1".to_string(), "off".to_string()),
            ("valve2".to_string(), "off".to_string()),
            ("pump1".to_string(), "off".to_string()),
        ]
    );

    assert_eq!(server.sim.output_level(VALVE1), Some(false));
    assert_eq!(server.sim.output_level(VALVE2), Some(false));
    assert_eq!(server.sim.output_level(PUMP1), Some(false));

    server.shutdown().await;
}

#[tokio::test]
async fn test_all_status_order_is_deterministic() {
    let server = TestServer::spawn().await;
    server.sim.set_channel(MOIST1, 0.42);

    let mut client = server.connect().await;
    client.request(Target::named("valve2"), Action::On).await;

    for _ in 0..3 {
        let reply = client.request(Target::All, Action::Status).await;
        let names: Vec<String> = entries(reply).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["valve1", "valve2", "pump1", "moist1", "acsense"]);
    }

    server.shutdown().await;
}

#[tokio::test]
async fn test_all_off_survives_per_resource_failure() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    // valve2's next transaction fails; the sweep must still reach pump1.
    server.sim.fail_next(VALVE2, "nak");

    let reply = client.request(Target::All, Action::Off).await;
    assert_eq!(
        entries(reply),
        vec![
            ("valve1".to_string(), "off".to_string()),
            ("valve2".to_string(), "error".to_string()),
            ("pump1".to_string(), "off".to_string()),
        ]
    );
    assert_eq!(server.sim.output_level(PUMP1), Some(false));

    server.shutdown().await;
}

// ============================================================================
// Hardware failure handling
// ============================================================================

#[tokio::test]
async fn test_hardware_failure_degrades_status_to_unknown() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    client.request(Target::named("valve1"), Action::On).await;

    server.sim.fail_next(VALVE1, "bus timeout");
    let reply = client.request(Target::named("valve1"), Action::Off).await;
    match reply {
        Reply::Error { code, .. } => assert_eq!(code, ErrorCode::Hardware),
        other => panic!("expected error reply, got {other:?}"),
    }

    // The stale "on" is not reported after a failed write.
    let reply = client.request(Target::named("valve1"), Action::Status).await;
    assert_eq!(
        entries(reply),
        vec![("valve1".to_string(), "unknown".to_string())]
    );

    server.shutdown().await;
}

// ============================================================================
// Edge-driven inputs
// ============================================================================

#[tokio::test]
async fn test_frequency_status_from_background_monitor() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    // The monitor, not the client, observes the edges.
    for _ in 0..3 {
        server.sim.inject_edge(ACSENSE, true);
        sleep(Duration::from_millis(20)).await;
    }
    sleep(Duration::from_millis(50)).await;

    let reply = client.request(Target::named("acsense"), Action::Status).await;
    let values = entries(reply);
    assert_eq!(values.len(), 1);
    let hz: f64 = values[0].1.parse().expect("frequency value");
    assert!(hz > 0.0, "expected a positive frequency, got {hz}");

    // Edge observation costs no bus transactions.
    assert_eq!(server.sim.transaction_count(), 0);

    server.shutdown().await;
}

#[tokio::test]
async fn test_frequency_unknown_before_any_measurement() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    let reply = client.request(Target::named("acsense"), Action::Status).await;
    assert_eq!(
        entries(reply),
        vec![("acsense".to_string(), "unknown".to_string())]
    );

    server.shutdown().await;
}

// ============================================================================
// Arbitration
// ============================================================================

#[tokio::test]
async fn test_second_client_turned_away_busy() {
    let server = TestServer::spawn().await;
    let mut first = server.connect().await;

    // First client engages the lock with a request.
    first.request(Target::named("valve1"), Action::On).await;

    // Second client is rejected immediately and the stream closes.
    let mut second = server.connect().await;
    match second.try_recv().await {
        Some(Reply::Busy { .. }) => {}
        other => panic!("expected busy reply, got {other:?}"),
    }
    assert!(second.try_recv().await.is_none());

    // First client is unaffected.
    let reply = first.request(Target::named("valve1"), Action::Status).await;
    assert_eq!(entries(reply), vec![("valve1".to_string(), "on".to_string())]);

    server.shutdown().await;
}

#[tokio::test]
async fn test_lock_released_on_disconnect() {
    let server = TestServer::spawn().await;

    {
        let mut first = server.connect().await;
        first.request(Target::named("valve1"), Action::On).await;
        // Dropped here: connection closes, lock released.
    }
    sleep(Duration::from_millis(50)).await;

    let mut second = server.connect().await;
    let reply = second.request(Target::named("valve1"), Action::Status).await;
    assert_eq!(entries(reply), vec![("valve1".to_string(), "on".to_string())]);

    server.shutdown().await;
}

#[tokio::test]
async fn test_idle_session_times_out_and_releases_lock() {
    let server = TestServer::spawn_with_idle_timeout(Duration::from_millis(100)).await;

    let mut first = server.connect().await;
    first.request(Target::named("valve1"), Action::On).await;

    // Go silent past the idle timeout.
    sleep(Duration::from_millis(250)).await;

    let mut second = server.connect().await;
    let reply = second.request(Target::named("valve1"), Action::Status).await;
    assert_eq!(entries(reply), vec![("valve1".to_string(), "on".to_string())]);

    server.shutdown().await;
}

// ============================================================================
// Protocol edges
// ============================================================================

#[tokio::test]
async fn test_malformed_request_gets_error_not_disconnect() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    client.send_raw("this is not json").await;
    match client.recv().await {
        Reply::Error { code, .. } => assert_eq!(code, ErrorCode::Malformed),
        other => panic!("expected error reply, got {other:?}"),
    }

    // The session survives and serves the next request.
    let reply = client.request(Target::named("valve1"), Action::Status).await;
    assert_eq!(
        entries(reply),
        vec![("valve1".to_string(), "unknown".to_string())]
    );

    server.shutdown().await;
}

#[tokio::test]
async fn test_incompatible_protocol_version_rejected() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    let request = Request {
        protocol_version: ProtocolVersion::new(2, 0),
        resource: Target::named("valve1"),
        action: Action::Status,
    };
    client.send(request).await;

    match client.recv().await {
        Reply::Error { code, .. } => assert_eq!(code, ErrorCode::Version),
        other => panic!("expected error reply, got {other:?}"),
    }

    server.shutdown().await;
}

// ============================================================================
// Scenario
// ============================================================================

#[tokio::test]
async fn test_irrigation_session_scenario() {
    let server = TestServer::spawn().await;
    server.sim.set_channel(MOIST1, 1.8342);

    let mut client = server.connect().await;

    // Check moisture, open the valve, start the pump.
    let reply = client.request(Target::named("moist1"), Action::Status).await;
    assert_eq!(
        entries(reply),
        vec![("moist1".to_string(), "1.8342".to_string())]
    );

    client.request(Target::named("valve1"), Action::On).await;
    client.request(Target::named("pump1"), Action::On).await;

    let reply = client.request(Target::All, Action::Status).await;
    let values = entries(reply);
    assert_eq!(values[0], ("valve1".to_string(), "on".to_string()));
    assert_eq!(values[2], ("pump1".to_string(), "on".to_string()));

    // Done watering: everything off.
    let reply = client.request(Target::All, Action::Off).await;
    assert!(entries(reply).iter().all(|(_, v)| v == "off"));

    // No transaction ever overlapped another.
    assert!(!server.sim.overlap_detected());

    server.shutdown().await;
}
