//! Integration tests: echo server over real loopback QUIC connections.
//!
//! Each test binds a server on 127.0.0.1:0 with fresh credentials and talks
//! to it through the client core.
//!
//! Run with `--nocapture` and `RUST_LOG=debug` to see the protocol trace:
//! ```sh
//! RUST_LOG=debug cargo test -p lab-server-core --test echo_test -- --nocapture
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lab_client_core::{ClientEndpoint, EchoClient, request};
use lab_proto::cancel::CancelScope;
use lab_proto::config::LabConfig;
use lab_proto::echo::{DEFAULT_ALPN, EchoTransform};
use lab_proto::identity::Credentials;
use lab_proto::tls::verifier::LabServerCertVerifier;
use lab_proto::trust::VerifyPolicy;
use lab_server_core::{
    DispatchEnd, EchoServer, ServerEndpoint, ServerHandle, ServerStats, dispatch, handle,
};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::{DigitallySignedStruct, SignatureScheme};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};

/// Init tracing subscriber (idempotent across tests via try_init).
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn test_config() -> LabConfig {
    LabConfig {
        stream_pause_ms: 0,
        io_timeout_ms: 2_000,
        ..LabConfig::default()
    }
}

fn loopback() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}

/// Helper: spawn an echo server with fresh credentials.
fn spawn_server(config: &LabConfig) -> (ServerHandle, Credentials) {
    let credentials = Credentials::generate().expect("credentials");
    let server = EchoServer::bind_to(loopback(), config, &credentials, EchoTransform::default())
        .expect("server should bind");
    (server.spawn().expect("server should spawn"), credentials)
}

/// Poll until `check` passes or a second elapses.
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

// ---------------------------------------------------------------------------
// Round trip
// ---------------------------------------------------------------------------

#[tokio::test]
async fn server_echoes_with_prefix() {
    init_tracing();
    let config = test_config();
    let (server, creds) = spawn_server(&config);

    let client = EchoClient::connect_to(
        server.local_addr(),
        config,
        VerifyPolicy::pinned(creds.fingerprint()),
    )
    .await
    .expect("client should connect");

    let response = client
        .send(b"Hello from stream 1! Time: 12:00:00")
        .await
        .expect("exchange");
    assert_eq!(response.text(), "Echo: Hello from stream 1! Time: 12:00:00");
    assert!(!response.truncated);

    client.finish().await;
    server.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn empty_message_echoes_prefix_only() {
    init_tracing();
    let config = test_config();
    let (server, _creds) = spawn_server(&config);

    let client = EchoClient::connect_to(server.local_addr(), config, VerifyPolicy::SkipVerify)
        .await
        .expect("client should connect");

    let response = client.send(b"").await.expect("EOF is not an error");
    assert_eq!(response.bytes, b"Echo: ");

    client.finish().await;
    server.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn oversized_request_is_truncated_to_server_buffer() {
    init_tracing();
    let server_config = LabConfig {
        buffer_size: 16,
        ..test_config()
    };
    let (server, _creds) = spawn_server(&server_config);

    let client =
        EchoClient::connect_to(server.local_addr(), test_config(), VerifyPolicy::SkipVerify)
            .await
            .expect("client should connect");

    let message = b"0123456789abcdefTHIS PART IS DROPPED";
    let response = client.send(message).await.expect("exchange");
    assert_eq!(response.bytes, b"Echo: 0123456789abcdef");

    assert!(eventually(|| server.stats().streams_completed == 1).await);

    client.finish().await;
    server.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn custom_prefix_is_applied() {
    init_tracing();
    let config = LabConfig {
        echo_prefix: "pong: ".into(),
        ..test_config()
    };
    let credentials = Credentials::generate().expect("credentials");
    let server = EchoServer::bind_to(
        loopback(),
        &config,
        &credentials,
        EchoTransform::new(config.echo_prefix.clone()),
    )
    .expect("bind")
    .spawn()
    .expect("spawn");

    let client = EchoClient::connect_to(server.local_addr(), config, VerifyPolicy::SkipVerify)
        .await
        .expect("client should connect");
    assert_eq!(client.send(b"ping").await.expect("exchange").text(), "pong: ping");

    client.finish().await;
    server.shutdown().await.expect("clean shutdown");
}

// ---------------------------------------------------------------------------
// Connection reuse
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sequential_streams_share_one_connection() {
    init_tracing();
    let config = test_config();
    let (server, _creds) = spawn_server(&config);

    let client = EchoClient::connect_to(server.local_addr(), config, VerifyPolicy::SkipVerify)
        .await
        .expect("client should connect");
    let conn_id = client.connection().id();

    let report = client.run_sequential(3).await.expect("sequential run");
    assert_eq!(report.completed(), 3);
    assert_eq!(report.completion_order(), vec![1, 2, 3]);
    assert_eq!(client.connection().id(), conn_id);

    let ids: Vec<u64> = report.streams.iter().map(|r| r.stream.0).collect();
    assert_eq!(ids, vec![0, 4, 8], "client-initiated bidi streams on one connection");

    for (i, response) in report.responses().enumerate() {
        let text = response.text();
        assert!(
            text.starts_with(&format!("Echo: Hello from stream {}! Time: ", i + 1)),
            "unexpected response {text:?}"
        );
    }

    assert!(eventually(|| server.stats().streams_completed == 3).await);
    let stats = server.stats();
    assert_eq!(stats.connections_accepted, 1, "handshake must happen once");
    assert_eq!(stats.streams_accepted, 3);

    client.finish().await;
    server.shutdown().await.expect("clean shutdown");
}

// ---------------------------------------------------------------------------
// Handshake policy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn alpn_mismatch_is_rejected_by_handshake() {
    init_tracing();
    let config = test_config();
    let (server, _creds) = spawn_server(&config);

    let client_config = LabConfig {
        alpn: "something-else".into(),
        ..test_config()
    };
    let result =
        EchoClient::connect_to(server.local_addr(), client_config, VerifyPolicy::SkipVerify).await;
    assert!(result.is_err(), "mismatched ALPN must not connect");

    assert_eq!(server.stats().connections_accepted, 0);
    assert!(!server.is_finished(), "a failed handshake must not stop the accept loop");

    // The server keeps serving well-behaved clients.
    let client =
        EchoClient::connect_to(server.local_addr(), test_config(), VerifyPolicy::SkipVerify)
            .await
            .expect("second client should connect");
    assert_eq!(client.send(b"still up").await.expect("exchange").text(), "Echo: still up");

    client.finish().await;
    server.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn wrong_pin_is_rejected() {
    init_tracing();
    let config = test_config();
    let (server, _creds) = spawn_server(&config);

    let stranger = Credentials::generate().expect("other credentials");
    let result = EchoClient::connect_to(
        server.local_addr(),
        config,
        VerifyPolicy::pinned(stranger.fingerprint()),
    )
    .await;
    assert!(result.is_err(), "unpinned server certificate must be rejected");

    server.shutdown().await.expect("clean shutdown");
}

/// Accepts any server certificate, but only after blocking its thread.
#[derive(Debug)]
struct SlowVerifier {
    stall: Duration,
    inner: Arc<LabServerCertVerifier>,
}

impl ServerCertVerifier for SlowVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        std::thread::sleep(self.stall);
        self.inner
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// Dial `addr` on a dedicated thread and runtime whose handshake stalls for
/// `stall` midway. Returns whether the handshake eventually succeeded.
fn dial_with_stalled_handshake(addr: SocketAddr, stall: Duration) -> std::thread::JoinHandle<bool> {
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        runtime.block_on(async move {
            let verifier = SlowVerifier {
                stall,
                inner: LabServerCertVerifier::new(VerifyPolicy::SkipVerify),
            };
            let mut tls = rustls::ClientConfig::builder_with_provider(Arc::new(
                rustls::crypto::ring::default_provider(),
            ))
            .with_protocol_versions(&[&rustls::version::TLS13])
            .expect("tls versions")
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(verifier))
            .with_no_client_auth();
            tls.alpn_protocols = vec![DEFAULT_ALPN.as_bytes().to_vec()];

            let crypto =
                quinn::crypto::rustls::QuicClientConfig::try_from(tls).expect("quic client config");
            let endpoint = quinn::Endpoint::client(SocketAddr::from(([127, 0, 0, 1], 0)))
                .expect("client endpoint");
            let connecting = endpoint
                .connect_with(quinn::ClientConfig::new(Arc::new(crypto)), addr, "localhost")
                .expect("connect");
            let connected = connecting.await.is_ok();
            endpoint.close(0u32.into(), b"done");
            connected
        })
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stalled_handshake_does_not_delay_other_clients() {
    init_tracing();
    let config = test_config();
    let (server, _creds) = spawn_server(&config);

    let stall = Duration::from_secs(2);
    let stalled = dial_with_stalled_handshake(server.local_addr(), stall);
    // Let the stalled attempt reach the server first.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let started = Instant::now();
    let client = EchoClient::connect_to(server.local_addr(), config, VerifyPolicy::SkipVerify)
        .await
        .expect("client should connect");
    let response = client.send(b"hi").await.expect("exchange");
    let waited = started.elapsed();

    assert_eq!(response.text(), "Echo: hi");
    assert!(
        waited < Duration::from_secs(1),
        "client waited {waited:?} behind another peer's handshake"
    );

    let stalled_connected = tokio::task::spawn_blocking(move || stalled.join())
        .await
        .expect("join task")
        .expect("stalled client thread");
    assert!(stalled_connected, "the slow handshake still completes on its own");
    assert!(eventually(|| server.stats().connections_accepted == 2).await);

    client.finish().await;
    server.shutdown().await.expect("clean shutdown");
}

// ---------------------------------------------------------------------------
// Per-stream faults
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reset_stream_is_abandoned_without_hurting_siblings() {
    init_tracing();
    // Opening the faulty stream implicitly opens the two below it, so their
    // handlers start reading early; give them room.
    let config = LabConfig {
        io_timeout_ms: 5_000,
        ..test_config()
    };
    let (server, _creds) = spawn_server(&config);

    let endpoint = ClientEndpoint::new(VerifyPolicy::SkipVerify, &config).expect("endpoint");
    let conn = endpoint.dial(server.local_addr()).await.expect("dial");
    let settings = config.stream_settings();
    let scope = CancelScope::unbounded();

    // Two healthy streams are opened and left waiting for a request.
    let first = conn.open_stream(&scope).await.expect("open first");
    let second = conn.open_stream(&scope).await.expect("open second");

    // The faulty stream starts a request and then abandons it.
    let mut broken = conn.open_stream(&scope).await.expect("open broken");
    broken.write_all(b"half a requ", &scope).await.expect("partial write");
    broken.reset(1).expect("reset");

    assert!(eventually(|| server.stats().streams_failed == 1).await);

    let (a, b) = tokio::join!(
        request(first, b"first", &settings, &scope),
        request(second, b"second", &settings, &scope),
    );
    assert_eq!(a.expect("first exchange").text(), "Echo: first");
    assert_eq!(b.expect("second exchange").text(), "Echo: second");

    // The dispatcher is still accepting streams on the same connection.
    let later = conn.open_stream(&scope).await.expect("open later");
    let response = request(later, b"later", &settings, &scope).await.expect("later exchange");
    assert_eq!(response.text(), "Echo: later");

    assert!(eventually(|| server.stats().streams_completed == 3).await);
    let stats = server.stats();
    assert_eq!(stats.streams_failed, 1);
    assert_eq!(stats.connections_accepted, 1);

    drop(broken);
    conn.close(0, b"client done");
    server.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn request_filling_buffer_exactly_is_not_truncated() {
    init_tracing();
    let config = LabConfig {
        buffer_size: 16,
        ..test_config()
    };
    let credentials = Credentials::generate().expect("credentials");
    let endpoint = ServerEndpoint::bind(loopback(), &credentials, &config).expect("bind");
    let addr = endpoint.local_addr().expect("addr");

    let client_endpoint =
        ClientEndpoint::new(VerifyPolicy::SkipVerify, &config).expect("client endpoint");
    let (server_conn, client_conn) = tokio::join!(endpoint.accept(), client_endpoint.dial(addr));
    let server_conn = server_conn.expect("accept");
    let client_conn = client_conn.expect("dial");

    let scope = CancelScope::unbounded();
    let mut stream = client_conn.open_stream(&scope).await.expect("open");
    stream.write_all(b"0123456789abcdef", &scope).await.expect("write");
    stream.finish().expect("finish");

    let accepted = server_conn.accept_stream(&scope).await.expect("accept stream");
    let exchange = handle(accepted, &EchoTransform::default(), &config.stream_settings(), &scope)
        .await
        .expect("exchange");
    assert_eq!(exchange.request_len, 16);
    assert!(!exchange.truncated);

    client_conn.close(0, b"client done");
    endpoint.close();
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_stops_accept_loop() {
    init_tracing();
    let config = LabConfig {
        idle_timeout_ms: 300,
        ..test_config()
    };
    let (server, _creds) = spawn_server(&config);
    let addr = server.local_addr();

    server.shutdown().await.expect("clean shutdown");

    let result = EchoClient::connect_to(addr, config, VerifyPolicy::SkipVerify).await;
    assert!(result.is_err(), "no one should answer after shutdown");
}

#[tokio::test]
async fn dispatcher_ends_quietly_when_peer_closes() {
    init_tracing();
    let config = test_config();
    let credentials = Credentials::generate().expect("credentials");
    let endpoint = ServerEndpoint::bind(loopback(), &credentials, &config).expect("bind");
    let addr = endpoint.local_addr().expect("addr");

    let client_endpoint =
        ClientEndpoint::new(VerifyPolicy::SkipVerify, &config).expect("client endpoint");
    let (server_conn, client_conn) = tokio::join!(endpoint.accept(), client_endpoint.dial(addr));
    let server_conn = server_conn.expect("accept");
    let client_conn = client_conn.expect("dial");

    let stats = Arc::new(ServerStats::new());
    let task = tokio::spawn(dispatch(
        server_conn,
        Arc::new(EchoTransform::default()),
        config.stream_settings(),
        CancelScope::unbounded(),
        Arc::clone(&stats),
    ));

    client_conn.close(0, b"client done");
    let end = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("dispatcher should notice the close")
        .expect("dispatcher task");
    assert_eq!(end, DispatchEnd::ConnectionClosed);
    assert_eq!(stats.snapshot().streams_failed, 0);

    endpoint.close();
}

#[tokio::test]
async fn dispatcher_stops_on_cancel() {
    init_tracing();
    let config = test_config();
    let credentials = Credentials::generate().expect("credentials");
    let endpoint = ServerEndpoint::bind(loopback(), &credentials, &config).expect("bind");
    let addr = endpoint.local_addr().expect("addr");

    let client_endpoint =
        ClientEndpoint::new(VerifyPolicy::SkipVerify, &config).expect("client endpoint");
    let (server_conn, client_conn) = tokio::join!(endpoint.accept(), client_endpoint.dial(addr));
    let server_conn = server_conn.expect("accept");
    let _client_conn = client_conn.expect("dial");

    let scope = CancelScope::unbounded();
    let task = tokio::spawn(dispatch(
        server_conn.clone(),
        Arc::new(EchoTransform::default()),
        config.stream_settings(),
        scope.clone(),
        Arc::new(ServerStats::new()),
    ));

    scope.cancel();
    let end = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("dispatcher should stop")
        .expect("dispatcher task");
    assert_eq!(end, DispatchEnd::Cancelled);
    assert_ne!(
        server_conn.state(),
        lab_proto::transport::ConnectionState::Active,
        "dispatcher closes its connection on exit"
    );

    endpoint.close();
}
