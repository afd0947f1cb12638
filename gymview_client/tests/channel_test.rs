//! Live channel tests against an in-process WebSocket server.

use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use gymview_client::channel::{ChannelConfig, ChannelEvent, ChannelState, UpdateChannel};

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, format!("ws://{addr}"))
}

fn update_json(episode: u32, step: u32, reward: f64) -> String {
    serde_json::json!({
        "episode": episode,
        "step": step,
        "reward": reward,
        "cumulative_reward": reward,
        "state": 0,
        "action": 0,
    })
    .to_string()
}

fn fast_config() -> ChannelConfig {
    ChannelConfig {
        base_backoff_ms: 5,
        max_backoff_ms: 40,
        ..ChannelConfig::default()
    }
}

#[tokio::test]
async fn delivers_updates_then_completion_and_says_goodbye_properly() {
    let (listener, endpoint) = bind().await;
    let (observed_tx, mut observed_rx) = mpsc::unbounded_channel::<String>();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        let first = ws.next().await.unwrap().unwrap();
        observed_tx.send(first.into_text().unwrap()).unwrap();

        ws.send(Message::Text(update_json(1, 4, 0.5))).await.unwrap();
        ws.send(Message::Text(r#"{"status": "completed"}"#.to_string()))
            .await
            .unwrap();

        while let Some(Ok(message)) = ws.next().await {
            match message {
                Message::Text(text) => observed_tx.send(text).unwrap(),
                Message::Close(frame) => {
                    let code = frame.map(|f| u16::from(f.code)).unwrap_or(0);
                    observed_tx.send(format!("close:{code}")).unwrap();
                    break;
                }
                _ => {}
            }
        }
    });

    let (channel, mut events) = UpdateChannel::open(&endpoint, "sess-1", ChannelConfig::default());

    match events.recv().await.unwrap() {
        ChannelEvent::Update(update) => {
            assert_eq!(update.episode, 1);
            assert_eq!(update.step, 4);
        }
        other => panic!("expected an update, got {other:?}"),
    }
    assert_eq!(events.recv().await.unwrap(), ChannelEvent::Completed);

    let states = channel.state_watch();
    channel.disconnect().await;
    assert_eq!(*states.borrow(), ChannelState::Closed);
    server.await.unwrap();

    assert_eq!(observed_rx.recv().await.unwrap(), "START");
    assert_eq!(observed_rx.recv().await.unwrap(), "STOP");
    assert_eq!(observed_rx.recv().await.unwrap(), "close:1000");
}

#[tokio::test]
async fn malformed_frames_are_skipped_without_killing_the_stream() {
    let (listener, endpoint) = bind().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let _start = ws.next().await.unwrap().unwrap();

        ws.send(Message::Text("definitely not json".to_string()))
            .await
            .unwrap();
        ws.send(Message::Text(update_json(2, 9, -1.0))).await.unwrap();
        ws.send(Message::Text(r#"{"status": "completed"}"#.to_string()))
            .await
            .unwrap();

        // Stay alive until the client closes.
        while let Some(Ok(message)) = ws.next().await {
            if matches!(message, Message::Close(_)) {
                break;
            }
        }
    });

    let (channel, mut events) = UpdateChannel::open(&endpoint, "sess-2", ChannelConfig::default());

    match events.recv().await.unwrap() {
        ChannelEvent::Update(update) => assert_eq!(update.episode, 2),
        other => panic!("expected the well-formed update first, got {other:?}"),
    }
    assert_eq!(events.recv().await.unwrap(), ChannelEvent::Completed);

    channel.disconnect().await;
    server.await.unwrap();
}

#[tokio::test]
async fn reconnects_after_an_abnormal_drop() {
    let (listener, endpoint) = bind().await;
    let connections = Arc::new(AtomicUsize::new(0));
    let connections_seen = connections.clone();

    let server = tokio::spawn(async move {
        // First connection: greet and drop without a closing handshake.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let _start = ws.next().await.unwrap().unwrap();
        connections_seen.fetch_add(1, Ordering::SeqCst);
        drop(ws);

        // Second connection: the retry. Serve it properly.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let _start = ws.next().await.unwrap().unwrap();
        connections_seen.fetch_add(1, Ordering::SeqCst);
        ws.send(Message::Text(update_json(5, 1, 2.0))).await.unwrap();
        ws.send(Message::Text(r#"{"status": "completed"}"#.to_string()))
            .await
            .unwrap();
        while let Some(Ok(message)) = ws.next().await {
            if matches!(message, Message::Close(_)) {
                break;
            }
        }
    });

    let (channel, mut events) = UpdateChannel::open(&endpoint, "sess-3", fast_config());

    match events.recv().await.unwrap() {
        ChannelEvent::Update(update) => assert_eq!(update.episode, 5),
        other => panic!("expected an update from the second connection, got {other:?}"),
    }
    assert_eq!(events.recv().await.unwrap(), ChannelEvent::Completed);
    assert_eq!(connections.load(Ordering::SeqCst), 2);

    channel.disconnect().await;
    server.await.unwrap();
}

#[tokio::test]
async fn disconnect_during_a_pending_reconnect_cancels_the_retry() {
    let (listener, endpoint) = bind().await;
    let connections = Arc::new(AtomicUsize::new(0));
    let connections_seen = connections.clone();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let _start = ws.next().await.unwrap().unwrap();
        connections_seen.fetch_add(1, Ordering::SeqCst);
        drop(ws);

        // Any further connection attempt would land here.
        while let Ok((stream, _)) = listener.accept().await {
            connections_seen.fetch_add(1, Ordering::SeqCst);
            drop(stream);
        }
    });

    let slow_retry = ChannelConfig {
        base_backoff_ms: 60_000,
        max_backoff_ms: 60_000,
        ..ChannelConfig::default()
    };
    let (channel, _events) = UpdateChannel::open(&endpoint, "sess-4", slow_retry);

    let mut states = channel.state_watch();
    states
        .wait_for(|state| *state == ChannelState::Reconnecting)
        .await
        .unwrap();

    channel.disconnect().await;
    assert_eq!(*states.borrow(), ChannelState::Closed);

    // Give a would-be stray retry time to show up.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(connections.load(Ordering::SeqCst), 1);
    server.abort();
}

#[tokio::test]
async fn exhausting_reconnect_attempts_emits_connection_lost() {
    let (listener, endpoint) = bind().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let _start = ws.next().await.unwrap().unwrap();
        drop(ws);
        // Dropping the listener makes every retry fail fast.
        drop(listener);
    });

    let config = ChannelConfig {
        connect_timeout: Duration::from_millis(250),
        max_reconnect_attempts: 3,
        base_backoff_ms: 1,
        max_backoff_ms: 5,
        ..ChannelConfig::default()
    };
    let (channel, mut events) = UpdateChannel::open(&endpoint, "sess-5", config);

    assert_eq!(events.recv().await.unwrap(), ChannelEvent::ConnectionLost);
    assert_eq!(events.recv().await, None);

    let mut states = channel.state_watch();
    states
        .wait_for(|state| *state == ChannelState::Closed)
        .await
        .unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn initial_connect_failure_is_terminal_and_silent() {
    // Nothing listens here; the very first connect fails.
    let (channel, mut events) =
        UpdateChannel::open("ws://127.0.0.1:1", "sess-6", ChannelConfig::default());

    let mut states = channel.state_watch();
    states
        .wait_for(|state| *state == ChannelState::Closed)
        .await
        .unwrap();

    // No retry, no event; the queue just closes.
    assert_eq!(events.recv().await, None);
}
