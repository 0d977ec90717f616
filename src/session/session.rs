use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::config::SessionConfig;
use super::lifecycle::{Action, Lifecycle, SessionEvent, SessionPhase};
use super::stats::SessionStats;
use crate::api::{BackendApi, VisitSummary};
use crate::audio::{AudioBackend, AudioBackendFactory};
use crate::error::{ClientError, Result};
use crate::transcript::{FoldOutcome, TranscriptAssembler, TranscriptSnapshot};
use crate::transport::{ConnectionState, Inbound, Transport};

/// Read side of a running session: transcript snapshots after every accepted
/// message, raised error signals, and the observable connection state.
pub struct SessionFeed {
    pub transcript: watch::Receiver<TranscriptSnapshot>,
    pub errors: mpsc::Receiver<String>,
    pub connection: watch::Receiver<ConnectionState>,
}

/// A visit session that ties capture, streaming transport, transcript
/// assembly, and backend finalization together.
///
/// The microphone and the socket are each owned by exactly one session;
/// starting a new visit means creating a new `VisitSession` after stopping
/// the previous one.
pub struct VisitSession {
    config: SessionConfig,
    api: BackendApi,

    transport: Arc<Mutex<Transport>>,
    lifecycle: Arc<Mutex<Lifecycle>>,
    assembler: Arc<Mutex<TranscriptAssembler>>,

    snapshot_tx: watch::Sender<TranscriptSnapshot>,
    errors_tx: mpsc::Sender<String>,
    events_rx: Option<mpsc::Receiver<Inbound>>,

    /// Signals the audio pump to stop capture; carries one permit so a stop
    /// issued while the pump is mid-frame is not lost.
    stop_capture: Arc<Notify>,

    audio_task: Option<JoinHandle<()>>,
    inbound_task: Option<JoinHandle<()>>,

    frames_sent: Arc<AtomicUsize>,
    /// Bumped on every start; end-session responses from a superseded epoch
    /// are ignored instead of cancelled mid-flight.
    epoch: Arc<AtomicU64>,
    started_at: chrono::DateTime<Utc>,
}

impl VisitSession {
    pub fn new(config: SessionConfig) -> (Self, SessionFeed) {
        let (events_tx, events_rx) = mpsc::channel(256);
        let (errors_tx, errors_rx) = mpsc::channel(16);
        let (snapshot_tx, snapshot_rx) = watch::channel(TranscriptSnapshot::default());

        let transport = Transport::new(config.transport_config(), events_tx);
        let connection = transport.connection();
        let api = BackendApi::new(config.base_url.clone());
        let assembler = TranscriptAssembler::new(config.session_id);

        let feed = SessionFeed {
            transcript: snapshot_rx,
            errors: errors_rx,
            connection,
        };

        let session = Self {
            config,
            api,
            transport: Arc::new(Mutex::new(transport)),
            lifecycle: Arc::new(Mutex::new(Lifecycle::new())),
            assembler: Arc::new(Mutex::new(assembler)),
            snapshot_tx,
            errors_tx,
            events_rx: Some(events_rx),
            stop_capture: Arc::new(Notify::new()),
            audio_task: None,
            inbound_task: None,
            frames_sent: Arc::new(AtomicUsize::new(0)),
            epoch: Arc::new(AtomicU64::new(0)),
            started_at: Utc::now(),
        };

        (session, feed)
    }

    pub fn session_id(&self) -> i64 {
        self.config.session_id
    }

    /// Connect the transport and start capture.
    ///
    /// Device failures abort the start and are returned distinctly from
    /// transport failures; the session drops back to `NotStarted` so the
    /// clinician can retry after fixing the microphone.
    pub async fn start(&mut self) -> Result<()> {
        {
            let mut lifecycle = self.lifecycle.lock().await;
            if lifecycle.phase() != SessionPhase::NotStarted {
                warn!("session already started");
                return Ok(());
            }
            lifecycle.apply(SessionEvent::StartRequested);
        }
        self.epoch.fetch_add(1, Ordering::SeqCst);

        info!("starting visit session {}", self.config.session_id);

        let mut connection = {
            let mut transport = self.transport.lock().await;
            let rx = transport.connection();
            transport.connect();
            rx
        };

        // Wait for the socket to open. The handshake is the suspension
        // point; failures flip the state rather than raise from connect.
        loop {
            let state = *connection.borrow_and_update();
            if state.is_open() {
                break;
            }
            if state == ConnectionState::Error {
                *self.lifecycle.lock().await = Lifecycle::new();
                return Err(ClientError::Transport(
                    "failed to open transcription socket".to_string(),
                ));
            }
            if connection.changed().await.is_err() {
                *self.lifecycle.lock().await = Lifecycle::new();
                return Err(ClientError::Transport("transport stopped".to_string()));
            }
        }

        self.assembler
            .lock()
            .await
            .reset_for_session(self.config.session_id);

        self.spawn_inbound_pump();

        let mut backend = AudioBackendFactory::create(
            self.config.audio_source.clone(),
            self.config.capture_config(),
        )?;
        let frames = match backend.start().await {
            Ok(rx) => rx,
            Err(e) => {
                // No microphone means no session; tear the socket back down.
                self.transport.lock().await.disconnect("capture failed").await;
                *self.lifecycle.lock().await = Lifecycle::new();
                return Err(e.into());
            }
        };

        self.spawn_audio_pump(backend, frames);

        info!("visit session started");
        Ok(())
    }

    /// Stop capture, finalize the visit with the backend, and close the
    /// socket. A failed end-session call is reported through the error feed
    /// but still advances the session to `Ended`.
    pub async fn stop(&mut self) -> Result<Option<VisitSummary>> {
        {
            let mut lifecycle = self.lifecycle.lock().await;
            match lifecycle.phase() {
                SessionPhase::AwaitingConnection | SessionPhase::Recording => {
                    lifecycle.apply(SessionEvent::StopRequested);
                }
                other => {
                    warn!(phase = ?other, "stop requested but session is not running");
                    return Ok(None);
                }
            }
        }

        info!("stopping visit session {}", self.config.session_id);

        self.stop_capture.notify_one();
        if let Some(task) = self.audio_task.take() {
            if let Err(e) = task.await {
                error!("audio pump panicked: {}", e);
            }
        }
        self.transport.lock().await.mark_idle();

        let epoch_at_call = self.epoch.load(Ordering::SeqCst);
        let result = self.api.end_session(self.config.session_id).await;

        let summary = if self.epoch.load(Ordering::SeqCst) != epoch_at_call {
            warn!("session superseded, ignoring end-session response");
            None
        } else {
            match result {
                Ok(summary) => {
                    info!(
                        summary_id = summary.summary_id,
                        "visit finalization queued"
                    );
                    Some(summary)
                }
                Err(e) => {
                    warn!("end-session call failed: {}", e);
                    let _ = self
                        .errors_tx
                        .try_send(format!("failed to finalize visit: {}", e));
                    None
                }
            }
        };

        self.transport.lock().await.disconnect("visit ended").await;
        if let Some(task) = self.inbound_task.take() {
            task.abort();
        }

        self.lifecycle
            .lock()
            .await
            .apply(SessionEvent::EndSessionSettled);

        info!("visit session ended");
        Ok(summary)
    }

    /// Current lifecycle phase.
    pub async fn phase(&self) -> SessionPhase {
        self.lifecycle.lock().await.phase()
    }

    /// Current session statistics.
    pub async fn stats(&self) -> SessionStats {
        let phase = self.lifecycle.lock().await.phase();
        let connection = self.transport.lock().await.state();
        let entry_count = self.assembler.lock().await.entries().len();
        let duration = Utc::now().signed_duration_since(self.started_at);

        SessionStats {
            phase,
            connection,
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            frames_sent: self.frames_sent.load(Ordering::SeqCst),
            entry_count,
        }
    }

    /// Accumulated transcript.
    pub async fn transcript(&self) -> TranscriptSnapshot {
        self.assembler.lock().await.snapshot()
    }

    /// Explicitly wipe the conversation log.
    pub async fn clear_transcript(&self) {
        let snapshot = {
            let mut assembler = self.assembler.lock().await;
            assembler.clear();
            assembler.snapshot()
        };
        let _ = self.snapshot_tx.send(snapshot);
    }

    fn spawn_inbound_pump(&mut self) {
        let Some(mut events_rx) = self.events_rx.take() else {
            return;
        };
        let assembler = Arc::clone(&self.assembler);
        let snapshot_tx = self.snapshot_tx.clone();
        let errors_tx = self.errors_tx.clone();

        self.inbound_task = Some(tokio::spawn(async move {
            while let Some(message) = events_rx.recv().await {
                let (outcome, snapshot) = {
                    let mut assembler = assembler.lock().await;
                    let outcome = assembler.fold(message);
                    (outcome, assembler.snapshot())
                };

                if let FoldOutcome::ErrorRaised(text) = &outcome {
                    warn!("transcription error: {}", text);
                    let _ = errors_tx.try_send(text.clone());
                }

                // One emission per accepted message, no batching window.
                let _ = snapshot_tx.send(snapshot);
            }
        }));
    }

    fn spawn_audio_pump(
        &mut self,
        mut backend: Box<dyn AudioBackend>,
        mut frames: mpsc::Receiver<crate::audio::AudioFrame>,
    ) {
        let transport = Arc::clone(&self.transport);
        let lifecycle = Arc::clone(&self.lifecycle);
        let frames_sent = Arc::clone(&self.frames_sent);
        let errors_tx = self.errors_tx.clone();
        let stop_capture = Arc::clone(&self.stop_capture);
        let restart_delay = self.config.capture_restart_delay;

        self.audio_task = Some(tokio::spawn(async move {
            info!("audio pump started ({})", backend.name());

            loop {
                tokio::select! {
                    _ = stop_capture.notified() => {
                        if let Err(e) = backend.stop().await {
                            warn!("failed to stop capture: {}", e);
                        }
                        break;
                    }

                    frame = frames.recv() => match frame {
                        Some(frame) => {
                            let accepted = transport.lock().await.send_audio(&frame);
                            if accepted {
                                frames_sent.fetch_add(1, Ordering::SeqCst);
                                let mut lifecycle = lifecycle.lock().await;
                                if lifecycle.phase() == SessionPhase::AwaitingConnection {
                                    lifecycle.apply(SessionEvent::FirstFrameSent);
                                }
                            }
                        }
                        None => {
                            let action =
                                lifecycle.lock().await.apply(SessionEvent::CaptureLost);
                            if action != Action::RestartCapture {
                                break;
                            }

                            warn!(
                                "capture ended unexpectedly, restarting in {:?}",
                                restart_delay
                            );
                            tokio::select! {
                                _ = stop_capture.notified() => {
                                    if let Err(e) = backend.stop().await {
                                        warn!("failed to stop capture: {}", e);
                                    }
                                    break;
                                }
                                _ = tokio::time::sleep(restart_delay) => {}
                            }

                            if let Err(e) = backend.stop().await {
                                warn!("failed to reset capture: {}", e);
                            }
                            match backend.start().await {
                                Ok(rx) => {
                                    frames = rx;
                                    info!("capture restarted");
                                }
                                Err(e) => {
                                    error!("failed to restart capture: {}", e);
                                    let _ = errors_tx
                                        .try_send(format!("microphone lost: {}", e));
                                    break;
                                }
                            }
                        }
                    }
                }
            }

            info!("audio pump stopped");
        }));
    }
}
