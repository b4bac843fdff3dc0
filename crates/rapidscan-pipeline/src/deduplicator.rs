//! # Scan Deduplicator
//!
//! Turns the capture device's high-frequency frame stream into one
//! acceptance per physical presentation of a barcode, and drives the device
//! through its standby/resume cycle so a single pass is not reported dozens
//! of times.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Debounce Cycle                                     │
//! │                                                                         │
//! │                 frame == last_accepted                                  │
//! │                 → Repeated (or nothing)                                 │
//! │                      ┌────┐                                             │
//! │                      │    ▼                                             │
//! │                  ┌────────────┐   frame != last_accepted                │
//! │       ┌─────────►│    IDLE    │ ─── → Accepted, set_mode(Standby) ──┐   │
//! │       │          └────────────┘                                     │   │
//! │       │                ▲                                            ▼   │
//! │       │ ack(Active)    │ failure / timeout              ┌────────────┐  │
//! │       │                │ → TransitionFailed             │ SUSPENDING │  │
//! │  ┌────────────┐        └──────────────────────────────  └────────────┘  │
//! │  │  RESUMING  │                                               │         │
//! │  └────────────┘                                    ack(Standby)         │
//! │       ▲                                                       ▼         │
//! │       │ resume delay elapsed,                         ┌────────────┐    │
//! │       │ set_mode(Active)                              │  COOLDOWN  │    │
//! │       └────────────────────────────────────────────── └────────────┘    │
//! │                                                                         │
//! │  Frames arriving outside IDLE are dropped without a state change.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Task Layout
//! One tokio task owns the state. Frames, resets, snapshots and shutdown all
//! travel a single FIFO command channel, so the task is the only place that
//! decides on scans and the only caller of [`ScanSource::set_mode`]. The
//! in-flight cycle step (an acknowledgement or the resume timer) is polled
//! alongside the command channel, which keeps frames flowing (and being
//! dropped) while the device is switching.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::config::{DebounceSettings, RepeatPolicy};
use crate::error::{PipelineError, PipelineResult};
use crate::events::{ScanNotification, ScanSink, NOTIFICATION_CAPACITY};
use crate::source::{ModeAck, ScanSource, SourceMode};
use rapidscan_core::{DecodedScan, ScanDecoder, ScanFrame};

// =============================================================================
// Constants
// =============================================================================

/// Capacity of the deduplicator command queue.
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

// =============================================================================
// Deduplicator State
// =============================================================================

/// Where the deduplicator is in the debounce cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPhase {
    /// Source active, waiting for frames.
    #[default]
    Idle,
    /// Standby commanded, not yet acknowledged.
    Suspending,
    /// Source in standby, resume timer running.
    Cooldown,
    /// Active commanded, not yet acknowledged.
    Resuming,
}

impl std::fmt::Display for DedupPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DedupPhase::Idle => write!(f, "idle"),
            DedupPhase::Suspending => write!(f, "suspending"),
            DedupPhase::Cooldown => write!(f, "cooldown"),
            DedupPhase::Resuming => write!(f, "resuming"),
        }
    }
}

/// Observable deduplicator state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DeduplicatorState {
    /// The most recently accepted scan. Repeats are judged against this only.
    pub last_accepted: Option<DecodedScan>,
    pub phase: DedupPhase,
}

// =============================================================================
// Deduplicator Settings
// =============================================================================

#[derive(Debug, Clone)]
pub struct DeduplicatorSettings {
    pub resume_delay: Duration,
    pub transition_timeout: Duration,
    pub repeat_policy: RepeatPolicy,
}

impl Default for DeduplicatorSettings {
    fn default() -> Self {
        DeduplicatorSettings::from(&DebounceSettings::default())
    }
}

impl From<&DebounceSettings> for DeduplicatorSettings {
    fn from(settings: &DebounceSettings) -> Self {
        DeduplicatorSettings {
            resume_delay: settings.resume_delay(),
            transition_timeout: settings.transition_timeout(),
            repeat_policy: settings.repeat_policy,
        }
    }
}

// =============================================================================
// Commands & Handles
// =============================================================================

/// Commands for the deduplicator task.
#[derive(Debug)]
enum DedupCommand {
    /// A frame from the capture device.
    Frame(ScanFrame),
    /// Forget the last accepted scan.
    Reset(oneshot::Sender<()>),
    /// Report the current state.
    Snapshot(oneshot::Sender<DeduplicatorState>),
    /// Stop the task.
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable entry point for the capture device.
#[derive(Debug, Clone)]
pub struct ScanFeed {
    cmd_tx: mpsc::Sender<DedupCommand>,
}

impl ScanFeed {
    /// Queues a frame without waiting.
    ///
    /// Returns false if the frame was dropped because the queue is full or
    /// the deduplicator has stopped.
    pub fn deliver(&self, frame: ScanFrame) -> bool {
        match self.cmd_tx.try_send(DedupCommand::Frame(frame)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Deduplicator queue full; frame dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Deduplicator stopped; frame dropped");
                false
            }
        }
    }
}

/// Handle for controlling and observing the deduplicator.
#[derive(Clone)]
pub struct DeduplicatorHandle {
    cmd_tx: mpsc::Sender<DedupCommand>,
    state_rx: watch::Receiver<DeduplicatorState>,
    events_tx: broadcast::Sender<ScanNotification>,
}

impl DeduplicatorHandle {
    /// Returns a feed for the capture device.
    pub fn feed(&self) -> ScanFeed {
        ScanFeed {
            cmd_tx: self.cmd_tx.clone(),
        }
    }

    /// Queues a frame, waiting for queue space instead of dropping.
    pub async fn submit(&self, frame: ScanFrame) -> PipelineResult<()> {
        self.cmd_tx
            .send(DedupCommand::Frame(frame))
            .await
            .map_err(|_| PipelineError::ChannelError("Deduplicator channel closed".into()))
    }

    /// Returns the state after every previously queued command is handled.
    pub async fn snapshot(&self) -> PipelineResult<DeduplicatorState> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(DedupCommand::Snapshot(tx))
            .await
            .map_err(|_| PipelineError::ShuttingDown)?;
        rx.await.map_err(|_| PipelineError::ShuttingDown)
    }

    /// Returns the most recently published state without waiting.
    pub fn state(&self) -> DeduplicatorState {
        self.state_rx.borrow().clone()
    }

    /// Returns a receiver notified on every state change.
    pub fn watch_state(&self) -> watch::Receiver<DeduplicatorState> {
        self.state_rx.clone()
    }

    /// Subscribes to scan decisions.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanNotification> {
        self.events_tx.subscribe()
    }

    /// Forgets the last accepted scan, so the next frame of that barcode is
    /// accepted again. Used when a checkout is cleared.
    pub async fn reset(&self) -> PipelineResult<()> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(DedupCommand::Reset(tx))
            .await
            .map_err(|_| PipelineError::ShuttingDown)?;
        rx.await.map_err(|_| PipelineError::ShuttingDown)
    }

    /// Stops the task after it handles everything queued before this call.
    pub async fn shutdown(&self) -> PipelineResult<()> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(DedupCommand::Shutdown(tx))
            .await
            .map_err(|_| PipelineError::ShuttingDown)?;
        rx.await.map_err(|_| PipelineError::ShuttingDown)
    }
}

// =============================================================================
// Deduplicator
// =============================================================================

/// Builder for the deduplicator task.
pub struct Deduplicator {
    settings: DeduplicatorSettings,
    decoder: ScanDecoder,
    source: Arc<dyn ScanSource>,
    sinks: Vec<Arc<dyn ScanSink>>,
}

impl Deduplicator {
    pub fn new(
        settings: DeduplicatorSettings,
        decoder: ScanDecoder,
        source: Arc<dyn ScanSource>,
    ) -> Self {
        Deduplicator {
            settings,
            decoder,
            source,
            sinks: Vec::new(),
        }
    }

    /// Registers a synchronous sink. Sinks run in registration order.
    pub fn with_sink(mut self, sink: Arc<dyn ScanSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Spawns the task and returns its handle.
    pub fn start(self) -> DeduplicatorHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let (state_tx, state_rx) = watch::channel(DeduplicatorState::default());
        let (events_tx, _) = broadcast::channel(NOTIFICATION_CAPACITY);

        let worker = Worker {
            settings: self.settings,
            decoder: self.decoder,
            source: self.source,
            sinks: self.sinks,
            state: DeduplicatorState::default(),
            state_tx,
            events_tx: events_tx.clone(),
            pending: None,
        };

        tokio::spawn(async move {
            worker.run(cmd_rx).await;
        });

        DeduplicatorHandle {
            cmd_tx,
            state_rx,
            events_tx,
        }
    }
}

// =============================================================================
// Worker
// =============================================================================

/// Outcome of the in-flight cycle step.
enum CycleStep {
    Suspended(PipelineResult<()>),
    ResumeDue,
    Resumed(PipelineResult<()>),
}

type StepFuture = Pin<Box<dyn Future<Output = CycleStep> + Send>>;

struct Worker {
    settings: DeduplicatorSettings,
    decoder: ScanDecoder,
    source: Arc<dyn ScanSource>,
    sinks: Vec<Arc<dyn ScanSink>>,
    state: DeduplicatorState,
    state_tx: watch::Sender<DeduplicatorState>,
    events_tx: broadcast::Sender<ScanNotification>,
    /// At most one cycle step runs at a time.
    pending: Option<StepFuture>,
}

impl Worker {
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<DedupCommand>) {
        info!(
            resume_delay = ?self.settings.resume_delay,
            transition_timeout = ?self.settings.transition_timeout,
            repeat_policy = %self.settings.repeat_policy,
            "Scan deduplicator started"
        );

        loop {
            tokio::select! {
                // Settle the cycle before looking at new input
                biased;

                step = next_step(&mut self.pending) => {
                    self.pending = None;
                    self.advance(step);
                }
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(DedupCommand::Frame(frame)) => self.handle_frame(frame),
                        Some(DedupCommand::Reset(reply)) => {
                            debug!("Forgetting last accepted scan");
                            self.update(|state| state.last_accepted = None);
                            let _ = reply.send(());
                        }
                        Some(DedupCommand::Snapshot(reply)) => {
                            let _ = reply.send(self.state.clone());
                        }
                        Some(DedupCommand::Shutdown(reply)) => {
                            info!(phase = %self.state.phase, "Scan deduplicator shutting down");
                            // Closed before replying so later sends fail at once
                            cmd_rx.close();
                            let _ = reply.send(());
                            break;
                        }
                        None => {
                            info!("All deduplicator handles dropped; stopping");
                            break;
                        }
                    }
                }
            }
        }
    }

    // =========================================================================
    // Frame Handling
    // =========================================================================

    fn handle_frame(&mut self, frame: ScanFrame) {
        if self.state.phase != DedupPhase::Idle {
            debug!(phase = %self.state.phase, "Frame dropped outside idle");
            return;
        }

        let scan = match self.decoder.decode_frame(&frame) {
            None => return,
            Some(Ok(scan)) => scan,
            Some(Err(e)) => {
                debug!(error = %e, "Discarding undecodable frame");
                return;
            }
        };

        if self.state.last_accepted.as_ref() == Some(&scan) {
            match self.settings.repeat_policy {
                RepeatPolicy::Notify => {
                    debug!(%scan, "Repeat of last accepted scan");
                    self.notify(ScanNotification::Repeated(scan));
                }
                RepeatPolicy::Silent => debug!(%scan, "Repeat dropped silently"),
            }
            return;
        }

        info!(%scan, "Scan accepted");
        self.update(|state| {
            state.last_accepted = Some(scan.clone());
            state.phase = DedupPhase::Suspending;
        });
        self.notify(ScanNotification::Accepted(scan));
        self.command_mode(SourceMode::Standby);
    }

    // =========================================================================
    // Cycle Steps
    // =========================================================================

    fn advance(&mut self, step: CycleStep) {
        match step {
            CycleStep::Suspended(Ok(())) => {
                debug!(delay = ?self.settings.resume_delay, "Source in standby");
                self.update(|state| state.phase = DedupPhase::Cooldown);
                let delay = self.settings.resume_delay;
                self.pending = Some(Box::pin(async move {
                    tokio::time::sleep(delay).await;
                    CycleStep::ResumeDue
                }));
            }
            CycleStep::ResumeDue => {
                self.update(|state| state.phase = DedupPhase::Resuming);
                self.command_mode(SourceMode::Active);
            }
            CycleStep::Resumed(Ok(())) => {
                debug!("Source active again");
                self.update(|state| state.phase = DedupPhase::Idle);
            }
            CycleStep::Suspended(Err(e)) => self.fail(SourceMode::Standby, e),
            CycleStep::Resumed(Err(e)) => self.fail(SourceMode::Active, e),
        }
    }

    /// Issues a mode command and makes its acknowledgement the pending step.
    fn command_mode(&mut self, mode: SourceMode) {
        let ack = self.source.set_mode(mode);
        let limit = self.settings.transition_timeout;
        self.pending = Some(Box::pin(async move {
            let result = await_mode_ack(ack, mode, limit).await;
            match mode {
                SourceMode::Standby => CycleStep::Suspended(result),
                SourceMode::Active => CycleStep::Resumed(result),
            }
        }));
    }

    /// Reports a failed mode change and falls back to idle with the source
    /// assumed active.
    fn fail(&mut self, mode: SourceMode, error: PipelineError) {
        warn!(%mode, error = %error, "Capture device mode change failed");
        self.notify(ScanNotification::TransitionFailed {
            mode,
            reason: error.to_string(),
            timed_out: error.is_timeout(),
        });
        self.update(|state| state.phase = DedupPhase::Idle);
    }

    // =========================================================================
    // Publishing
    // =========================================================================

    fn update(&mut self, change: impl FnOnce(&mut DeduplicatorState)) {
        change(&mut self.state);
        self.state_tx.send_replace(self.state.clone());
    }

    fn notify(&self, notification: ScanNotification) {
        for sink in &self.sinks {
            sink.on_scan(&notification);
        }
        // No subscribers is fine
        let _ = self.events_tx.send(notification);
    }
}

/// Resolves with the pending step, or never if there is none.
async fn next_step(pending: &mut Option<StepFuture>) -> CycleStep {
    match pending {
        Some(step) => step.await,
        None => std::future::pending().await,
    }
}

/// Waits for a mode acknowledgement, bounded by `limit`.
async fn await_mode_ack(ack: ModeAck, mode: SourceMode, limit: Duration) -> PipelineResult<()> {
    match tokio::time::timeout(limit, ack).await {
        Ok(Ok(Ok(()))) => Ok(()),
        Ok(Ok(Err(reason))) => Err(PipelineError::TransitionRejected { mode, reason }),
        Ok(Err(_)) => Err(PipelineError::TransitionAbandoned { mode }),
        Err(_) => Err(PipelineError::TransitionTimeout {
            mode,
            after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
