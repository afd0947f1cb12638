//! Push-update channel: one WebSocket connection per training session.
//!
//! The connection lifecycle is an explicit state machine
//! (`Idle → Connecting → Open → Reconnecting → … → Closed`) observable
//! through a `watch` channel, and inbound frames are turned into typed
//! events on a bounded queue. Unexpected disconnects re-enter `Connecting`
//! with exponential back-off; a deliberate [`UpdateChannel::disconnect`]
//! sends the stop token, closes with the normal-closure code, and is
//! terminal.

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::protocol::{classify_frame, InboundFrame, START_TOKEN, STOP_TOKEN};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChannelState {
    /// Constructed, not yet connected.
    Idle,
    /// Transport handshake in flight.
    Connecting,
    /// Connected; the start token has been sent.
    Open,
    /// Waiting out a back-off delay before the next connect attempt.
    Reconnecting,
    /// Terminal: deliberate disconnect, remote normal closure, initial
    /// connect failure, or reconnect exhaustion.
    Closed,
}

/// Events delivered to the channel's consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A step-level update arrived.
    Update(Box<crate::protocol::TrainingUpdate>),
    /// The backend signalled that the run finished.
    Completed,
    /// Reconnect attempts are exhausted; no further events will arrive.
    ConnectionLost,
}

/// Tuning knobs for one channel instance.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub connect_timeout: Duration,
    pub max_reconnect_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub event_buffer: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            max_reconnect_attempts: 5,
            base_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
            event_buffer: 1_024,
        }
    }
}

impl ChannelConfig {
    /// Back-off before reconnect attempt number `attempt` (1-based):
    /// `min(base × 2^attempt, max)`.
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let ms = self
            .base_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

/// Handle to a live channel task.
///
/// Dropping the handle detaches the task without closing the connection;
/// only [`disconnect`](Self::disconnect) tears the transport down.
pub struct UpdateChannel {
    session_id: String,
    state_rx: watch::Receiver<ChannelState>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl UpdateChannel {
    /// Spawn the connection task for `session_id` and hand back the event
    /// queue it feeds.
    pub fn open(
        ws_endpoint: &str,
        session_id: &str,
        config: ChannelConfig,
    ) -> (Self, mpsc::Receiver<ChannelEvent>) {
        let url = format!(
            "{}/ws/training/{}",
            ws_endpoint.trim_end_matches('/'),
            session_id
        );
        let (events_tx, events_rx) = mpsc::channel(config.event_buffer.max(1));
        let (state_tx, state_rx) = watch::channel(ChannelState::Idle);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_channel(
            url,
            config,
            events_tx,
            state_tx,
            cancel.clone(),
        ));

        (
            Self {
                session_id: session_id.to_string(),
                state_rx,
                cancel,
                task,
            },
            events_rx,
        )
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ChannelState {
        *self.state_rx.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn state_watch(&self) -> watch::Receiver<ChannelState> {
        self.state_rx.clone()
    }

    /// Deliberately close the channel: stop token, normal-closure code,
    /// pending reconnect timers cancelled. The channel is not reusable.
    pub async fn disconnect(self) {
        self.cancel.cancel();
        if let Err(err) = self.task.await {
            warn!("channel task did not shut down cleanly: {err}");
        }
    }
}

/// Why the read loop handed control back.
enum ReadOutcome {
    /// `disconnect()` was requested.
    Deliberate,
    /// The remote side closed, with the close code if one was sent.
    Remote(Option<CloseCode>),
}

async fn run_channel(
    url: String,
    config: ChannelConfig,
    events: mpsc::Sender<ChannelEvent>,
    state: watch::Sender<ChannelState>,
    cancel: CancellationToken,
) {
    let mut attempts: u32 = 0;
    let mut ever_connected = false;

    loop {
        if cancel.is_cancelled() {
            let _ = state.send(ChannelState::Closed);
            return;
        }

        let _ = state.send(ChannelState::Connecting);
        let connected = tokio::select! {
            result = timeout(config.connect_timeout, connect_async(url.as_str())) => match result {
                Ok(Ok((ws, _response))) => Some(ws),
                Ok(Err(err)) => {
                    error!("websocket connect to {url} failed: {err}");
                    None
                }
                Err(_) => {
                    error!("websocket connect to {url} timed out");
                    None
                }
            },
            _ = cancel.cancelled() => {
                let _ = state.send(ChannelState::Closed);
                return;
            }
        };

        let outcome = match connected {
            Some(mut ws) => {
                attempts = 0;
                ever_connected = true;
                let _ = state.send(ChannelState::Open);
                info!("update channel connected to {url}");

                if let Err(err) = ws.send(Message::Text(START_TOKEN.to_string())).await {
                    error!("failed to send start token: {err}");
                    ReadOutcome::Remote(None)
                } else {
                    read_frames(&mut ws, &events, &cancel).await
                }
            }
            None if !ever_connected => {
                // Construction failure: no automatic retry, only post-open
                // disconnects re-enter the connect path.
                let _ = state.send(ChannelState::Closed);
                return;
            }
            None => ReadOutcome::Remote(None),
        };

        match outcome {
            ReadOutcome::Deliberate => {
                let _ = state.send(ChannelState::Closed);
                return;
            }
            ReadOutcome::Remote(Some(CloseCode::Normal)) => {
                info!("update channel closed by remote (normal closure)");
                let _ = state.send(ChannelState::Closed);
                return;
            }
            ReadOutcome::Remote(code) => {
                if attempts >= config.max_reconnect_attempts {
                    warn!(
                        "update channel lost after {} reconnect attempts",
                        config.max_reconnect_attempts
                    );
                    let _ = events.send(ChannelEvent::ConnectionLost).await;
                    let _ = state.send(ChannelState::Closed);
                    return;
                }
                attempts += 1;
                let delay = config.reconnect_delay(attempts);
                info!(
                    "update channel disconnected (code {:?}); reconnect attempt {}/{} in {}ms",
                    code,
                    attempts,
                    config.max_reconnect_attempts,
                    delay.as_millis()
                );
                let _ = state.send(ChannelState::Reconnecting);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => {
                        let _ = state.send(ChannelState::Closed);
                        return;
                    }
                }
            }
        }
    }
}

/// Pump frames until the remote closes or a deliberate disconnect arrives.
///
/// On a deliberate disconnect this also performs the stop-token/normal-close
/// farewell while the transport is still open.
async fn read_frames(
    ws: &mut WsStream,
    events: &mpsc::Sender<ChannelEvent>,
    cancel: &CancellationToken,
) -> ReadOutcome {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                if let Err(err) = ws.send(Message::Text(STOP_TOKEN.to_string())).await {
                    debug!("failed to send stop token: {err}");
                }
                if let Err(err) = ws
                    .close(Some(CloseFrame {
                        code: CloseCode::Normal,
                        reason: "client disconnect".into(),
                    }))
                    .await
                {
                    debug!("websocket close failed: {err}");
                }
                return ReadOutcome::Deliberate;
            }
            frame = ws.next() => match frame {
                Some(Ok(Message::Text(text))) => match classify_frame(&text) {
                    Ok(InboundFrame::Completed) => {
                        info!("training run completed");
                        if events.send(ChannelEvent::Completed).await.is_err() {
                            debug!("event consumer dropped; stopping read loop");
                            return ReadOutcome::Deliberate;
                        }
                    }
                    Ok(InboundFrame::Update(update)) => {
                        if events.send(ChannelEvent::Update(update)).await.is_err() {
                            debug!("event consumer dropped; stopping read loop");
                            return ReadOutcome::Deliberate;
                        }
                    }
                    Err(err) => {
                        // Isolated per message: log, drop, keep reading.
                        warn!("dropping malformed frame: {err}");
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    return ReadOutcome::Remote(frame.map(|f| f.code));
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    // A transport error alone does not trigger reconnection;
                    // the stream ending afterwards does.
                    error!("websocket transport error: {err}");
                }
                None => return ReadOutcome::Remote(None),
            }
        }
    }
}
