//! Sync layer against throwaway local controllers

use futures_util::SinkExt;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use signal_sim::simulation::{
    DirectionCounts, Lights, PhaseSnapshot, SensorReport, SignalColor, TrafficWorld,
};
use signal_sim::sync::{
    ConnectionState, ControllerClient, StreamTask, StreamUpdate, SyncClient, SyncConfig,
    SyncError, SyncEvent,
};

const STATE_BODY: &str = r#"{"lights":{"vertical":"red","horizontal":"green"},"time_to_next_change":4.5,"stage":"GREEN"}"#;

/// Read one HTTP request, head and body
async fn read_request(socket: &mut TcpStream) -> String {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    let head_end = loop {
        if let Some(at) = request.windows(4).position(|w| w == b"\r\n\r\n") {
            break at + 4;
        }
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
            return String::from_utf8_lossy(&request).into_owned();
        }
        request.extend_from_slice(&buf[..n]);
    };
    let head = String::from_utf8_lossy(&request[..head_end]).to_ascii_lowercase();
    let body_len: usize = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|n| n.trim().parse().ok())
        .unwrap_or(0);
    while request.len() < head_end + body_len {
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        request.extend_from_slice(&buf[..n]);
    }
    String::from_utf8_lossy(&request).into_owned()
}

fn request_body(request: &str) -> serde_json::Value {
    let body = request.split("\r\n\r\n").nth(1).unwrap();
    serde_json::from_str(body).unwrap()
}

/// Answer a single HTTP request with `status` and `body`, returning the request
async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        request
    });
    (base, handle)
}

#[tokio::test]
async fn test_fetch_state_from_controller() {
    let (base, server) = serve_once("200 OK", STATE_BODY).await;
    let client = ControllerClient::new(&base, Duration::from_secs(2)).unwrap();

    let snapshot = client.fetch_state("downtown").await.unwrap();
    assert_eq!(snapshot.lights.vertical, SignalColor::Red);
    assert_eq!(snapshot.lights.horizontal, SignalColor::Green);
    assert_eq!(snapshot.time_to_next_change, 4.5);

    let request = server.await.unwrap();
    assert!(request.starts_with("GET /state?intersection=downtown "));
}

#[tokio::test]
async fn test_malformed_state_is_an_error() {
    let (base, _server) = serve_once("200 OK", r#"{"lights":{"vertical":"purple"}}"#).await;
    let client = ControllerClient::new(&base, Duration::from_secs(2)).unwrap();
    assert!(matches!(
        client.fetch_state("main").await,
        Err(SyncError::Malformed(_))
    ));
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let (base, _server) = serve_once("503 Service Unavailable", "{}").await;
    let client = ControllerClient::new(&base, Duration::from_secs(2)).unwrap();
    assert!(matches!(
        client.reset("main").await,
        Err(SyncError::Status { status: 503, .. })
    ));
}

#[tokio::test]
async fn test_poll_result_updates_world() {
    let (base, _server) = serve_once("200 OK", STATE_BODY).await;
    let mut sync = SyncClient::new(SyncConfig {
        base_url: base,
        streaming: false,
        ..SyncConfig::default()
    })
    .unwrap();
    let mut world = TrafficWorld::default();

    sync.request_poll();
    let event = tokio::time::timeout(Duration::from_secs(5), sync.next_event())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, SyncEvent::Poll { epoch: 0, .. }));
    assert!(sync.handle_event(event, &mut world));
    assert_eq!(world.phase.horizontal.color, SignalColor::Green);
    assert_eq!(world.phase.vertical.color, SignalColor::Red);
}

#[tokio::test]
async fn test_stream_delivers_tagged_snapshots() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws?intersection=main", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
        ws.send(Message::Text(r#"{"type":"hello","data":{}}"#.to_string()))
            .await
            .unwrap();
        let state = format!(r#"{{"type":"state","data":{}}}"#, STATE_BODY);
        ws.send(Message::Text(state)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = StreamTask::spawn(
        url.parse().unwrap(),
        3,
        Duration::ZERO,
        Duration::from_secs(60),
        tx,
    );

    let mut seen = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
        match event {
            SyncEvent::Stream { generation, update } => {
                assert_eq!(generation, 3);
                let done = matches!(update, StreamUpdate::Snapshot(_));
                seen.push(update);
                if done {
                    break;
                }
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
    task.cancel();

    assert_eq!(seen[0], StreamUpdate::Connecting);
    assert_eq!(seen[1], StreamUpdate::Connected);
    match &seen[2] {
        StreamUpdate::Snapshot(snapshot) => {
            assert_eq!(snapshot.lights.horizontal, SignalColor::Green);
            assert_eq!(snapshot.stage.as_deref(), Some("GREEN"));
        }
        other => panic!("expected snapshot, got {:?}", other),
    }
}

/// Collect stream updates until `done` says stop or nothing arrives for 5s
async fn collect_updates(
    rx: &mut mpsc::UnboundedReceiver<SyncEvent>,
    mut done: impl FnMut(&[(Instant, StreamUpdate)]) -> bool,
) -> Vec<(Instant, StreamUpdate)> {
    let mut seen = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
        match event {
            SyncEvent::Stream { update, .. } => seen.push((Instant::now(), update)),
            other => panic!("unexpected event {:?}", other),
        }
        if done(&seen) {
            break;
        }
    }
    seen
}

#[tokio::test]
async fn test_secure_stream_url_uses_tls() {
    // Plain TCP that hangs up: the TLS handshake fails, but TLS is attempted
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("wss://{}/ws?intersection=main", listener.local_addr().unwrap());
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = StreamTask::spawn(
        url.parse().unwrap(),
        1,
        Duration::ZERO,
        Duration::from_secs(60),
        tx,
    );
    let seen = collect_updates(&mut rx, |seen| seen.len() >= 2).await;
    task.cancel();

    assert_eq!(seen[0].1, StreamUpdate::Connecting);
    match &seen[1].1 {
        StreamUpdate::Disconnected(reason) => {
            assert!(
                !reason.contains("TLS support not compiled in"),
                "wss unavailable: {}",
                reason
            );
        }
        other => panic!("expected disconnect, got {:?}", other),
    }
}

#[tokio::test]
async fn test_stream_reconnects_after_fixed_delay() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws?intersection=main", listener.local_addr().unwrap());
    tokio::spawn(async move {
        for _ in 0..2 {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            ws.close(None).await.ok();
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let reconnect_delay = Duration::from_millis(200);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = StreamTask::spawn(url.parse().unwrap(), 1, Duration::ZERO, reconnect_delay, tx);
    let seen = collect_updates(&mut rx, |seen| {
        seen.iter()
            .filter(|(_, u)| *u == StreamUpdate::Connected)
            .count()
            == 2
    })
    .await;
    task.cancel();

    let updates: Vec<_> = seen.iter().map(|(_, u)| u.clone()).collect();
    assert_eq!(updates.len(), 5, "updates: {:?}", updates);
    assert_eq!(updates[0], StreamUpdate::Connecting);
    assert_eq!(updates[1], StreamUpdate::Connected);
    assert!(matches!(updates[2], StreamUpdate::Disconnected(_)));
    assert_eq!(updates[3], StreamUpdate::Connecting);
    assert_eq!(updates[4], StreamUpdate::Connected);
    assert!(seen[3].0.duration_since(seen[2].0) >= reconnect_delay - Duration::from_millis(20));
}

#[tokio::test]
async fn test_switch_controller_waits_then_reconnects() {
    let mut sync = SyncClient::new(SyncConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        reconnect_delay_ms: 60_000,
        switch_delay_ms: 300,
        ..SyncConfig::default()
    })
    .unwrap();
    let mut world = TrafficWorld::default();
    sync.open_stream(Duration::from_secs(60));
    let old_generation = sync.generation();
    let old_epoch = sync.epoch();

    // The new controller records when the stream request shows up
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let request = read_request(&mut socket).await;
            if request.starts_with("GET /ws?intersection=main ") {
                let _ = seen_tx.send(Instant::now());
            }
        }
    });

    let switched_at = Instant::now();
    sync.switch_controller(&base).unwrap();
    assert_eq!(sync.connection_state(), ConnectionState::Disconnected);
    assert_eq!(sync.generation(), old_generation + 1);
    assert_eq!(sync.epoch(), old_epoch + 1);

    let stale_stream = SyncEvent::Stream {
        generation: old_generation,
        update: StreamUpdate::Connected,
    };
    assert!(!sync.handle_event(stale_stream, &mut world));
    assert_eq!(sync.connection_state(), ConnectionState::Disconnected);

    let stale_poll = SyncEvent::Poll {
        epoch: old_epoch,
        result: Ok(PhaseSnapshot {
            lights: Lights {
                vertical: SignalColor::Red,
                horizontal: SignalColor::Red,
            },
            time_to_next_change: 1.0,
            stage: None,
        }),
    };
    assert!(!sync.handle_event(stale_poll, &mut world));
    assert_eq!(world.phase.vertical.color, SignalColor::Green);

    let connected_at = tokio::time::timeout(Duration::from_secs(5), seen_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(connected_at.duration_since(switched_at) >= Duration::from_millis(300));
    sync.shutdown();
}

#[tokio::test]
async fn test_sensor_report_posts_json() {
    let (base, server) = serve_once("200 OK", "{}").await;
    let sync = SyncClient::new(SyncConfig {
        base_url: base,
        intersection: "downtown".to_string(),
        streaming: false,
        ..SyncConfig::default()
    })
    .unwrap();

    let report = SensorReport {
        arrivals: DirectionCounts::new(1, 0, 3, 2),
        departures: DirectionCounts::new(0, 1, 0, 0),
        occupancy: 2,
    };
    sync.send_sensor_report(report);

    let request = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap();
    assert!(request.starts_with("POST /sensor?intersection=downtown "));
    assert_eq!(request_body(&request), serde_json::to_value(report).unwrap());
}

#[tokio::test]
async fn test_demand_report_posts_counts_and_phase() {
    let (base, server) = serve_once("200 OK", "{}").await;
    let sync = SyncClient::new(SyncConfig {
        base_url: base,
        streaming: false,
        ..SyncConfig::default()
    })
    .unwrap();

    sync.send_demand(DirectionCounts::new(3, 3, 20, 18));

    let request = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap();
    assert!(request.starts_with("POST /traffic?intersection=main "));
    assert_eq!(
        request_body(&request),
        serde_json::json!({
            "north": 3, "south": 3, "east": 20, "west": 18, "preferred_phase": "EW"
        })
    );
}

#[tokio::test]
async fn test_failed_report_leaves_state_alone() {
    let (base, server) = serve_once("500 Internal Server Error", "{}").await;
    let mut sync = SyncClient::new(SyncConfig {
        base_url: base,
        streaming: false,
        ..SyncConfig::default()
    })
    .unwrap();
    let mut world = TrafficWorld::default();
    world.spawn_vehicles(&signal_sim::simulation::SpawnRequest(DirectionCounts::new(1, 1, 1, 1)));

    sync.send_sensor_report(world.sensor_report());
    server.await.unwrap();

    assert!(tokio::time::timeout(Duration::from_millis(200), sync.next_event())
        .await
        .is_err());
    assert_eq!(sync.connection_state(), ConnectionState::Disconnected);
    assert_eq!(sync.epoch(), 0);
    assert_eq!(world.vehicles.len(), 4);
    assert_eq!(world.phase.vertical.color, SignalColor::Green);
}
