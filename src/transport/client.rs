use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::messages::{parse_frame, ControlMessage, Inbound, TextClass};
use crate::audio::AudioFrame;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection lifecycle as observed by the rest of the application.
///
/// `Recording` and `Idle` are sub-states of an open connection: `Recording`
/// once audio frames are flowing, `Idle` when the socket is open but capture
/// is stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Recording,
    Idle,
    Error,
}

impl ConnectionState {
    /// Whether the socket is open and frames can be sent.
    pub fn is_open(self) -> bool {
        matches!(
            self,
            ConnectionState::Connected | ConnectionState::Recording | ConnectionState::Idle
        )
    }
}

/// Configuration for one transcription socket.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Socket base URL, e.g. "wss://backend.example.com".
    pub socket_base: String,
    pub session_id: i64,
    pub doctor_id: i64,
    pub patient_id: i64,
    /// Application-level keep-alive interval.
    pub heartbeat_interval: Duration,
    /// Delay before the single reconnect attempt after an abnormal close.
    pub reconnect_delay: Duration,
}

impl TransportConfig {
    /// Full socket URL for this session's participants.
    pub fn socket_url(&self) -> String {
        format!(
            "{}/ws/transcribe/{}/{}/{}",
            self.socket_base.trim_end_matches('/'),
            self.session_id,
            self.doctor_id,
            self.patient_id
        )
    }
}

#[derive(Debug)]
enum Outbound {
    Audio(Vec<u8>),
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseKind {
    Normal,
    Abnormal,
}

/// One abnormal closure earns exactly one scheduled retry, and only while the
/// session is still active. Normal closures never reconnect.
fn should_reconnect(close: CloseKind, session_active: bool, retry_spent: bool) -> bool {
    close == CloseKind::Abnormal && session_active && !retry_spent
}

/// Owns the single duplex connection to the transcription backend.
///
/// Exactly one transport exists per active session. Connection state is
/// published on a watch channel; inbound frames are classified and forwarded
/// on the event channel. Failures flip the state and surface as
/// error-classified events, they are never returned as errors from `send`.
pub struct Transport {
    config: TransportConfig,
    state_tx: watch::Sender<ConnectionState>,
    events_tx: mpsc::Sender<Inbound>,
    outbound: Option<mpsc::Sender<Outbound>>,
    task: Option<JoinHandle<()>>,
    active: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl Transport {
    pub fn new(config: TransportConfig, events_tx: mpsc::Sender<Inbound>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            state_tx,
            events_tx,
            outbound: None,
            task: None,
            active: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Subscribe to connection state changes.
    pub fn connection(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Open the socket and start the heartbeat. No-op if already open or
    /// still connecting.
    pub fn connect(&mut self) {
        if self.task.as_ref().is_some_and(|t| !t.is_finished()) {
            debug!("transport already connected");
            return;
        }

        self.active.store(true, Ordering::SeqCst);
        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        self.outbound = Some(outbound_tx);

        let url = self.config.socket_url();
        info!(url = %url, "opening transcription socket");

        let heartbeat = self.config.heartbeat_interval;
        let reconnect_delay = self.config.reconnect_delay;
        let active = Arc::clone(&self.active);
        let shutdown = Arc::clone(&self.shutdown);
        let state = self.state_tx.clone();
        let events = self.events_tx.clone();

        self.task = Some(tokio::spawn(run(
            url,
            heartbeat,
            reconnect_delay,
            active,
            shutdown,
            state,
            events,
            outbound_rx,
        )));
    }

    /// Close the socket with a normal-closure code and cancel the heartbeat.
    /// Idempotent.
    pub async fn disconnect(&mut self, reason: &str) {
        self.active.store(false, Ordering::SeqCst);
        self.shutdown.notify_waiters();

        if let Some(tx) = self.outbound.take() {
            let _ = tx.send(Outbound::Close).await;
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("transport task panicked: {}", e);
            }
        }

        self.state_tx.send_replace(ConnectionState::Disconnected);
        info!(reason, "transport disconnected");
    }

    /// Send one audio frame as a binary message. Frames produced while the
    /// socket is not open are dropped, not queued: stale audio has no value
    /// once a gap exists. Returns whether the frame was accepted.
    pub fn send_audio(&self, frame: &AudioFrame) -> bool {
        if !self.state().is_open() {
            debug!(
                samples = frame.samples.len(),
                "socket not open, dropping audio frame"
            );
            return false;
        }
        let Some(tx) = &self.outbound else {
            return false;
        };

        let mut bytes = Vec::with_capacity(frame.samples.len() * 2);
        for sample in &frame.samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }

        match tx.try_send(Outbound::Audio(bytes)) {
            Ok(()) => {
                self.state_tx.send_if_modified(|s| {
                    if matches!(*s, ConnectionState::Connected | ConnectionState::Idle) {
                        *s = ConnectionState::Recording;
                        true
                    } else {
                        false
                    }
                });
                true
            }
            Err(_) => {
                warn!("outbound queue full, dropping audio frame");
                false
            }
        }
    }

    /// Flag the open connection as idle once capture stops.
    pub fn mark_idle(&self) {
        self.state_tx.send_if_modified(|s| {
            if *s == ConnectionState::Recording {
                *s = ConnectionState::Idle;
                true
            } else {
                false
            }
        });
    }
}

#[allow(clippy::too_many_arguments)]
async fn run(
    url: String,
    heartbeat: Duration,
    reconnect_delay: Duration,
    active: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    state: watch::Sender<ConnectionState>,
    events: mpsc::Sender<Inbound>,
    mut outbound: mpsc::Receiver<Outbound>,
) {
    // Spent after each abnormal close, restored by a successful connect.
    let mut retry_spent = false;

    loop {
        if !active.load(Ordering::SeqCst) {
            state.send_replace(ConnectionState::Disconnected);
            break;
        }

        state.send_replace(ConnectionState::Connecting);
        let ws = match connect_async(url.as_str()).await {
            Ok((ws, _)) => {
                retry_spent = false;
                ws
            }
            Err(e) => {
                warn!("failed to open transcription socket: {}", e);
                state.send_replace(ConnectionState::Error);
                let _ = events
                    .send(Inbound::Text(
                        TextClass::Error,
                        format!("connection failed: {}", e),
                    ))
                    .await;
                break;
            }
        };

        info!("transcription socket connected");
        state.send_replace(ConnectionState::Connected);

        let close = drive(ws, heartbeat, &events, &mut outbound).await;
        match close {
            CloseKind::Normal => {
                state.send_replace(ConnectionState::Disconnected);
                break;
            }
            CloseKind::Abnormal => {
                let _ = events
                    .send(Inbound::Text(
                        TextClass::Error,
                        "connection to transcription service lost".to_string(),
                    ))
                    .await;

                if should_reconnect(close, active.load(Ordering::SeqCst), retry_spent) {
                    retry_spent = true;
                    state.send_replace(ConnectionState::Disconnected);
                    info!(
                        "abnormal close, reconnecting in {:?}",
                        reconnect_delay
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(reconnect_delay) => {}
                        _ = shutdown.notified() => {}
                    }
                } else {
                    state.send_replace(ConnectionState::Error);
                    break;
                }
            }
        }
    }
}

/// Pump one open connection until it closes. Heartbeats are interleaved with
/// audio frames on the same channel and carry no ordering relationship to
/// transcript content.
async fn drive(
    mut ws: WsStream,
    heartbeat: Duration,
    events: &mpsc::Sender<Inbound>,
    outbound: &mut mpsc::Receiver<Outbound>,
) -> CloseKind {
    let mut beat = tokio::time::interval(heartbeat);
    beat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately; consume it so heartbeats start one
    // interval after connect.
    beat.tick().await;

    loop {
        tokio::select! {
            _ = beat.tick() => {
                let msg = ControlMessage::Heartbeat {
                    timestamp: chrono::Utc::now().timestamp_millis(),
                };
                match serde_json::to_string(&msg) {
                    Ok(json) => {
                        if ws.send(Message::Text(json)).await.is_err() {
                            return CloseKind::Abnormal;
                        }
                    }
                    Err(e) => warn!("failed to encode heartbeat: {}", e),
                }
            }

            cmd = outbound.recv() => match cmd {
                Some(Outbound::Audio(bytes)) => {
                    if ws.send(Message::Binary(bytes)).await.is_err() {
                        return CloseKind::Abnormal;
                    }
                }
                Some(Outbound::Close) | None => {
                    let frame = CloseFrame {
                        code: CloseCode::Normal,
                        reason: "client disconnect".into(),
                    };
                    let _ = ws.close(Some(frame)).await;
                    // Drain until the server acknowledges the close.
                    while let Some(msg) = ws.next().await {
                        if msg.is_err() {
                            break;
                        }
                    }
                    return CloseKind::Normal;
                }
            },

            frame = ws.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Some(msg) = parse_frame(&text) {
                        let _ = events.send(msg).await;
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = ws.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(reason))) => {
                    let normal = reason
                        .as_ref()
                        .is_some_and(|f| f.code == CloseCode::Normal);
                    info!(?reason, "transcription socket closed by server");
                    return if normal { CloseKind::Normal } else { CloseKind::Abnormal };
                }
                Some(Ok(_)) => {
                    // The backend never sends binary or other frame types.
                }
                Some(Err(e)) => {
                    warn!("socket read error: {}", e);
                    return CloseKind::Abnormal;
                }
                None => return CloseKind::Abnormal,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abnormal_close_with_active_session_reconnects_once() {
        assert!(should_reconnect(CloseKind::Abnormal, true, false));
        assert!(!should_reconnect(CloseKind::Abnormal, true, true));
    }

    #[test]
    fn normal_close_never_reconnects() {
        assert!(!should_reconnect(CloseKind::Normal, true, false));
        assert!(!should_reconnect(CloseKind::Normal, false, false));
    }

    #[test]
    fn ended_session_never_reconnects() {
        assert!(!should_reconnect(CloseKind::Abnormal, false, false));
    }

    #[test]
    fn socket_url_embeds_all_participants() {
        let config = TransportConfig {
            socket_base: "wss://backend.example.com/".to_string(),
            session_id: 12345,
            doctor_id: 7,
            patient_id: 42,
            heartbeat_interval: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(3),
        };
        assert_eq!(
            config.socket_url(),
            "wss://backend.example.com/ws/transcribe/12345/7/42"
        );
    }
}
