//! End-to-end channel behavior against an in-process WebSocket server.

use futures::{SinkExt, StreamExt};
use minegimme_session::{
    ChannelState, LifecycleAction, RejectReason, ServerSession, ServerStatus, SessionConfig,
    SessionError,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

struct TestServer {
    addr: SocketAddr,
    accepts: Arc<AtomicUsize>,
    uris: Arc<std::sync::Mutex<Vec<String>>>,
    inbound: mpsc::UnboundedReceiver<Message>,
    push: mpsc::UnboundedSender<String>,
}

/// Starts a server that sends `opening(n)` on the n-th connection, then
/// forwards pushed frames out and received frames to `inbound`.
async fn spawn_server(opening: fn(usize) -> Vec<Message>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepts = Arc::new(AtomicUsize::new(0));
    let uris = Arc::new(std::sync::Mutex::new(Vec::new()));
    let (inbound_tx, inbound) = mpsc::unbounded_channel();
    let (push, push_rx) = mpsc::unbounded_channel::<String>();
    let push_rx = Arc::new(Mutex::new(push_rx));

    let counter = accepts.clone();
    let seen = uris.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let index = counter.fetch_add(1, Ordering::SeqCst);
            let inbound_tx = inbound_tx.clone();
            let push_rx = push_rx.clone();
            let seen = seen.clone();

            tokio::spawn(async move {
                let record_uri = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                    seen.lock().unwrap().push(req.uri().to_string());
                    Ok(resp)
                };
                let Ok(mut ws) = accept_hdr_async(stream, record_uri).await else {
                    return;
                };
                for message in opening(index) {
                    if ws.send(message).await.is_err() {
                        return;
                    }
                }

                let mut push_rx = push_rx.lock().await;
                loop {
                    tokio::select! {
                        Some(text) = push_rx.recv() => {
                            if ws.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        incoming = ws.next() => match incoming {
                            Some(Ok(message)) => {
                                let _ = inbound_tx.send(message);
                            }
                            _ => break,
                        },
                    }
                }
            });
        }
    });

    TestServer {
        addr,
        accepts,
        uris,
        inbound,
        push,
    }
}

fn silent(_: usize) -> Vec<Message> {
    Vec::new()
}

fn config_for(addr: SocketAddr) -> SessionConfig {
    SessionConfig {
        api_base: format!("http://{addr}/api/v1/servers"),
        reconnect_delay_ms: 100,
        connect_timeout_ms: 2000,
        close_timeout_ms: 1000,
        ..Default::default()
    }
}

async fn open_session(server: &TestServer) -> ServerSession<minegimme_session::files::HttpFileBackend> {
    let session =
        ServerSession::with_http_backend(config_for(server.addr), "survival", "secret").unwrap();
    session.connect().await.unwrap();
    session
}

async fn next_text(inbound: &mut mpsc::UnboundedReceiver<Message>) -> String {
    loop {
        let message = timeout(WAIT, inbound.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("server stopped");
        if let Message::Text(text) = message {
            return text.to_string();
        }
    }
}

async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    timeout(WAIT, async {
        while !condition() {
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_channel_address_carries_target_and_token() {
    let server = spawn_server(silent).await;
    let session = open_session(&server).await;

    assert_eq!(session.channel_state(), ChannelState::Open);
    assert_eq!(
        server.uris.lock().unwrap().clone(),
        vec!["/api/v1/servers/ws/survival?token=secret".to_string()]
    );
    session.close().await;
}

#[tokio::test]
async fn test_ping_answered_with_exactly_one_pong() {
    fn ping(_: usize) -> Vec<Message> {
        vec![Message::Text(r#"{"type":"ping"}"#.into())]
    }
    let mut server = spawn_server(ping).await;
    let session = open_session(&server).await;

    assert_eq!(next_text(&mut server.inbound).await, r#"{"action":"pong"}"#);
    assert!(timeout(Duration::from_millis(300), server.inbound.recv()).await.is_err());

    session.close().await;
}

#[tokio::test]
async fn test_frames_applied_in_arrival_order() {
    fn burst(_: usize) -> Vec<Message> {
        let mut frames: Vec<Message> = (0..20)
            .map(|i| {
                Message::Text(
                    format!(
                        r#"{{"type":"console","data":{{"text":"line {i}","type":"info","timestamp":"12:00:00"}}}}"#
                    )
                    .into(),
                )
            })
            .collect();
        frames.push(Message::Text("garbage".into()));
        frames.push(Message::Text(r#"{"type":"status","data":"starting"}"#.into()));
        frames
    }
    let server = spawn_server(burst).await;
    let session = open_session(&server).await;

    let status = session.status().clone();
    wait_until(|| {
        status
            .try_read()
            .map(|s| s.snapshot().status == ServerStatus::Starting)
            .unwrap_or(false)
    })
    .await;

    let console = session.console().read().await;
    let texts: Vec<String> = console.records().iter().map(|r| r.text.clone()).collect();
    let expected: Vec<String> = (0..20).map(|i| format!("line {i}")).collect();
    assert_eq!(texts, expected);
    drop(console);

    session.close().await;
}

#[tokio::test]
async fn test_abnormal_close_triggers_second_handshake() {
    fn fail_first(index: usize) -> Vec<Message> {
        if index == 0 {
            vec![Message::Close(Some(CloseFrame {
                code: CloseCode::Error,
                reason: "internal error".into(),
            }))]
        } else {
            Vec::new()
        }
    }
    let server = spawn_server(fail_first).await;
    let session = open_session(&server).await;

    let accepts = server.accepts.clone();
    wait_until(|| accepts.load(Ordering::SeqCst) >= 2).await;

    let mut state = session.channel_state();
    for _ in 0..100 {
        if state == ChannelState::Open {
            break;
        }
        sleep(Duration::from_millis(20)).await;
        state = session.channel_state();
    }
    assert_eq!(state, ChannelState::Open);

    let console = session.console().read().await;
    assert!(console
        .records()
        .iter()
        .any(|r| r.category == "system" && r.text.contains("code 1011")));
    drop(console);

    session.close().await;
}

#[tokio::test]
async fn test_normal_close_does_not_reconnect() {
    fn close_normally(_: usize) -> Vec<Message> {
        vec![Message::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "bye".into(),
        }))]
    }
    let server = spawn_server(close_normally).await;
    let session = open_session(&server).await;

    for _ in 0..100 {
        if session.channel_state() == ChannelState::Closed {
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(session.channel_state(), ChannelState::Closed);

    sleep(Duration::from_millis(400)).await;
    assert_eq!(server.accepts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_teardown_sends_normal_close() {
    let mut server = spawn_server(silent).await;
    let session = open_session(&server).await;

    session.close().await;
    assert_eq!(session.channel_state(), ChannelState::Closed);

    let code = timeout(WAIT, async {
        loop {
            match server.inbound.recv().await {
                Some(Message::Close(frame)) => break frame.map(|f| f.code),
                Some(_) => continue,
                None => break None,
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(code, Some(CloseCode::Normal));

    sleep(Duration::from_millis(300)).await;
    assert_eq!(server.accepts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_lifecycle_action_guarded_by_flag() {
    let mut server = spawn_server(silent).await;
    let session = open_session(&server).await;

    session.start().await.unwrap();
    assert_eq!(next_text(&mut server.inbound).await, r#"{"action":"start"}"#);
    assert_eq!(
        session.status().read().await.pending_action(),
        Some(LifecycleAction::Start)
    );

    let err = session.stop().await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::ActionRejected(RejectReason::ActionInFlight(LifecycleAction::Start))
    ));
    // The rejected action never reached the channel
    assert!(timeout(Duration::from_millis(200), server.inbound.recv()).await.is_err());

    server
        .push
        .send(r#"{"type":"status","data":"online"}"#.to_string())
        .unwrap();
    let status = session.status().clone();
    wait_until(|| {
        status
            .try_read()
            .map(|s| s.pending_action().is_none())
            .unwrap_or(false)
    })
    .await;

    session.stop().await.unwrap();
    assert_eq!(next_text(&mut server.inbound).await, r#"{"action":"stop"}"#);

    session.close().await;
}

#[tokio::test]
async fn test_commands_rejected_once_closed() {
    let mut server = spawn_server(silent).await;
    let session = open_session(&server).await;

    session.command("  ").await.unwrap();
    session.command("say hi").await.unwrap();
    assert_eq!(
        next_text(&mut server.inbound).await,
        r#"{"action":"command","data":"say hi"}"#
    );

    session.close().await;
    assert!(matches!(
        session.command("list").await,
        Err(SessionError::ActionRejected(RejectReason::ChannelNotOpen(
            ChannelState::Closed
        )))
    ));
    assert!(matches!(
        session.start().await,
        Err(SessionError::ActionRejected(RejectReason::ChannelNotOpen(_)))
    ));
}

#[tokio::test]
async fn test_file_listing_mirrored() {
    fn files(_: usize) -> Vec<Message> {
        vec![
            Message::Text(
                r#"{"type":"file_init","data":[
                    {"path":"a","name":"a","type":"directory","size":null,"modified":"2024-05-01T10:00:00"},
                    {"path":"a/b.txt","name":"b.txt","type":"file","size":3,"modified":"2024-05-01T10:00:00"},
                    {"path":"c.txt","name":"c.txt","type":"file","size":4,"modified":"2024-05-01T10:00:00"}]}"#
                    .into(),
            ),
            Message::Text(
                r#"{"type":"file_update","changes":[{"event":"added","path":"logs/latest.log"}],
                    "data":[{"path":"logs/latest.log","name":"latest.log","type":"file","size":10,"modified":"2024-05-01T10:01:00"}]}"#
                    .into(),
            ),
        ]
    }
    let server = spawn_server(files).await;
    let session = open_session(&server).await;

    let tree = session.tree().clone();
    wait_until(|| {
        tree.try_read()
            .map(|t| t.get("logs/latest.log").is_some())
            .unwrap_or(false)
    })
    .await;

    let tree = session.tree().read().await;
    let names: Vec<String> = tree.list("").iter().map(|n| n.name.clone()).collect();
    assert_eq!(names, vec!["a", "logs", "c.txt"]);
    assert_eq!(tree.get("logs/latest.log").and_then(|n| n.size), Some(10));
    drop(tree);

    session.close().await;
}
