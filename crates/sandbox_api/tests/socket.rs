use futures_util::{SinkExt, StreamExt};
use sandbox_api::ws::spawn_session_socket;
use sandbox_api::{ClientMessage, ServerMessage, TransportEvent, TransportEventKind};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::tungstenite::Message;

async fn next_event(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("transport event in time")
        .expect("event channel open")
}

#[tokio::test]
async fn socket_reports_open_messages_and_peer_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let ws = tokio_tungstenite::accept_async(stream)
            .await
            .expect("ws accept");
        let (mut sink, mut inbound) = ws.split();

        let frame = inbound.next().await.expect("frame").expect("frame ok");
        let text = frame.into_text().expect("text frame");
        let received: serde_json::Value = serde_json::from_str(&text).expect("json");
        let data = received["data"].as_str().unwrap_or_default().to_owned();

        let reply = serde_json::json!({"type": "stdout", "data": format!("echo {data}")});
        sink.send(Message::Text(reply.to_string()))
            .await
            .expect("send stdout");
        let done = serde_json::json!({"type": "system", "status": "terminated"});
        sink.send(Message::Text(done.to_string()))
            .await
            .expect("send system");
        sink.send(Message::Close(None)).await.expect("close");
        received
    });

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let handle = spawn_session_socket(format!("ws://{addr}/ws/s-1"), 7, None, events_tx);
    assert_eq!(handle.generation(), 7);

    assert_eq!(
        next_event(&mut events_rx).await,
        TransportEvent::new(7, TransportEventKind::Opened)
    );
    assert!(handle.send(ClientMessage::stdin("hi\n")));

    let TransportEventKind::Message(text) = next_event(&mut events_rx).await.kind else {
        panic!("expected stdout frame");
    };
    assert_eq!(
        ServerMessage::decode(&text).expect("decode"),
        ServerMessage::Stdout {
            data: "echo hi\n".to_owned()
        }
    );

    let TransportEventKind::Message(text) = next_event(&mut events_rx).await.kind else {
        panic!("expected system frame");
    };
    assert!(ServerMessage::decode(&text).expect("decode").is_terminal());

    assert_eq!(
        next_event(&mut events_rx).await.kind,
        TransportEventKind::Closed
    );

    let received = server.await.expect("server task");
    assert_eq!(received, serde_json::json!({"type": "stdin", "data": "hi\n"}));
}

#[tokio::test]
async fn connect_failure_is_reported_as_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let _handle = spawn_session_socket(
        format!("ws://{addr}/ws/none"),
        3,
        Some(Duration::from_secs(2)),
        events_tx,
    );

    let event = next_event(&mut events_rx).await;
    assert_eq!(event.generation, 3);
    assert!(matches!(event.kind, TransportEventKind::Error(_)));
}

#[tokio::test]
async fn secure_socket_urls_attempt_a_tls_handshake() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let server = tokio::spawn(async move {
        // Accept and hang up before any TLS bytes are answered.
        let (stream, _) = listener.accept().await.expect("accept");
        drop(stream);
    });

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let _handle = spawn_session_socket(
        format!("wss://{addr}/ws/s-1"),
        4,
        Some(Duration::from_secs(2)),
        events_tx,
    );

    let event = next_event(&mut events_rx).await;
    server.await.expect("server task");
    let TransportEventKind::Error(message) = event.kind else {
        panic!("expected handshake failure, got {:?}", event.kind);
    };
    assert!(message.starts_with("websocket error:"), "{message}");
    assert!(!message.contains("not compiled"), "{message}");
}

#[tokio::test]
async fn connect_timeout_is_reported_as_websocket_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    // The listener accepts at the TCP level but never answers the upgrade.
    let _listener = listener;

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let _handle = spawn_session_socket(
        format!("ws://{addr}/ws/slow"),
        5,
        Some(Duration::from_millis(200)),
        events_tx,
    );

    let event = next_event(&mut events_rx).await;
    assert_eq!(
        event.kind,
        TransportEventKind::Error(
            "websocket error: connection timed out after 200ms".to_owned()
        )
    );
}
