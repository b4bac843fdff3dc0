//! # Decoded-Scan Source
//!
//! The capture device as the pipeline sees it: something that can be told to
//! go `Active` or `Standby`, acknowledges each command asynchronously, and
//! pushes decoded frames while active.
//!
//! ## Mode Command Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     set_mode() Completion Signal                        │
//! │                                                                         │
//! │  Deduplicator                           ScanSource                      │
//! │  ────────────                           ──────────                      │
//! │  set_mode(Standby) ───────────────────► start switching                 │
//! │        │                                     │                          │
//! │        │◄──────── ModeAck (oneshot) ─────────┘                          │
//! │        │                                                                │
//! │  timeout(limit, ack)                                                    │
//! │        ├── Ok(Ok(()))      device reached the mode                      │
//! │        ├── Ok(Err(reason)) device refused          → TransitionRejected │
//! │        ├── sender dropped  device gave up silently → TransitionAbandoned│
//! │        └── elapsed         device never answered   → TransitionTimeout  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Real camera drivers implement [`ScanSource`] outside this crate.
//! [`SimulatedSource`] is the in-process stand-in used by tests and the
//! replay tool.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::debug;

use crate::deduplicator::ScanFeed;
use rapidscan_core::ScanFrame;

// =============================================================================
// Source Mode
// =============================================================================

/// Capture device mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    /// Camera on, decoder reporting frames.
    Active,
    /// Camera idling, no frames reported.
    Standby,
}

impl std::fmt::Display for SourceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceMode::Active => write!(f, "active"),
            SourceMode::Standby => write!(f, "standby"),
        }
    }
}

// =============================================================================
// Source Interface
// =============================================================================

/// Completion signal for a mode command.
///
/// The device sends `Ok(())` once the mode is reached or `Err(reason)` if it
/// refuses. Dropping the sender means the command was abandoned.
pub type ModeAck = oneshot::Receiver<Result<(), String>>;

/// A capture device the deduplicator can command.
///
/// Only the deduplicator task calls `set_mode`; implementations do not need
/// to handle overlapping commands.
pub trait ScanSource: Send + Sync {
    /// Starts switching to `mode` and returns the completion signal.
    fn set_mode(&self, mode: SourceMode) -> ModeAck;
}

// =============================================================================
// Simulated Source
// =============================================================================

/// How the simulated device answers mode commands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AckBehavior {
    /// Acknowledge synchronously.
    #[default]
    Immediate,
    /// Acknowledge after a delay (needs a tokio runtime).
    After(Duration),
    /// Refuse every command with the given reason.
    Reject(String),
    /// Drop the completion sender without answering.
    Abandon,
    /// Park acknowledgements until `release_next` is called. Never releasing
    /// models a device that hangs.
    Hold,
}

type HeldAck = (SourceMode, oneshot::Sender<Result<(), String>>);

/// In-process capture device.
///
/// Records every commanded mode, answers according to its [`AckBehavior`],
/// and only forwards captured frames to the pipeline while its acknowledged
/// mode is `Active`.
#[derive(Debug)]
pub struct SimulatedSource {
    behavior: Mutex<AckBehavior>,
    commands: Mutex<Vec<SourceMode>>,
    held: Mutex<VecDeque<HeldAck>>,
    mode: Arc<Mutex<SourceMode>>,
    feed: Mutex<Option<ScanFeed>>,
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new(AckBehavior::default())
    }
}

impl SimulatedSource {
    /// Creates a source that starts out `Active`.
    pub fn new(behavior: AckBehavior) -> Self {
        SimulatedSource {
            behavior: Mutex::new(behavior),
            commands: Mutex::new(Vec::new()),
            held: Mutex::new(VecDeque::new()),
            mode: Arc::new(Mutex::new(SourceMode::Active)),
            feed: Mutex::new(None),
        }
    }

    /// Changes how later commands are answered.
    pub fn set_behavior(&self, behavior: AckBehavior) {
        *lock(&self.behavior) = behavior;
    }

    /// Connects the source to a pipeline feed.
    pub fn attach(&self, feed: ScanFeed) {
        *lock(&self.feed) = Some(feed);
    }

    /// Simulates the decoder recognising `frame`.
    ///
    /// Returns false if the frame went nowhere: the device is in standby, no
    /// feed is attached, or the pipeline queue is full.
    pub fn capture(&self, frame: ScanFrame) -> bool {
        if self.current_mode() != SourceMode::Active {
            debug!("Simulated source in standby; frame not decoded");
            return false;
        }
        match lock(&self.feed).as_ref() {
            Some(feed) => feed.deliver(frame),
            None => false,
        }
    }

    /// Every mode commanded so far, in order.
    pub fn commands(&self) -> Vec<SourceMode> {
        lock(&self.commands).clone()
    }

    /// The last acknowledged mode.
    pub fn current_mode(&self) -> SourceMode {
        *lock(&self.mode)
    }

    /// Number of parked acknowledgements (`Hold` behavior).
    pub fn held_count(&self) -> usize {
        lock(&self.held).len()
    }

    /// Answers the oldest parked command. Returns its mode, or `None` if
    /// nothing is parked.
    pub fn release_next(&self, result: Result<(), String>) -> Option<SourceMode> {
        let (mode, tx) = lock(&self.held).pop_front()?;
        if result.is_ok() {
            *lock(&self.mode) = mode;
        }
        let _ = tx.send(result);
        Some(mode)
    }
}

impl ScanSource for SimulatedSource {
    fn set_mode(&self, mode: SourceMode) -> ModeAck {
        let (tx, rx) = oneshot::channel();
        lock(&self.commands).push(mode);

        let behavior = lock(&self.behavior).clone();
        debug!(%mode, ?behavior, "Simulated source received mode command");

        match behavior {
            AckBehavior::Immediate => {
                *lock(&self.mode) = mode;
                let _ = tx.send(Ok(()));
            }
            AckBehavior::After(delay) => {
                let current = Arc::clone(&self.mode);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    *lock(&current) = mode;
                    let _ = tx.send(Ok(()));
                });
            }
            AckBehavior::Reject(reason) => {
                let _ = tx.send(Err(reason));
            }
            AckBehavior::Abandon => drop(tx),
            AckBehavior::Hold => lock(&self.held).push_back((mode, tx)),
        }

        rx
    }
}

/// Locks a mutex, recovering the data if a holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_mode_display() {
        assert_eq!(SourceMode::Active.to_string(), "active");
        assert_eq!(SourceMode::Standby.to_string(), "standby");
    }

    #[tokio::test]
    async fn test_immediate_ack() {
        let source = SimulatedSource::default();
        let ack = source.set_mode(SourceMode::Standby);

        assert_eq!(ack.await.unwrap(), Ok(()));
        assert_eq!(source.current_mode(), SourceMode::Standby);
        assert_eq!(source.commands(), vec![SourceMode::Standby]);
    }

    #[tokio::test]
    async fn test_reject_and_abandon() {
        let source = SimulatedSource::new(AckBehavior::Reject("lens covered".into()));
        let ack = source.set_mode(SourceMode::Standby);
        assert_eq!(ack.await.unwrap(), Err("lens covered".to_string()));
        assert_eq!(source.current_mode(), SourceMode::Active);

        source.set_behavior(AckBehavior::Abandon);
        let ack = source.set_mode(SourceMode::Standby);
        assert!(ack.await.is_err());
    }

    #[tokio::test]
    async fn test_hold_until_released() {
        let source = SimulatedSource::new(AckBehavior::Hold);
        let mut ack = source.set_mode(SourceMode::Standby);

        assert!(ack.try_recv().is_err());
        assert_eq!(source.held_count(), 1);

        assert_eq!(source.release_next(Ok(())), Some(SourceMode::Standby));
        assert_eq!(ack.await.unwrap(), Ok(()));
        assert_eq!(source.current_mode(), SourceMode::Standby);
        assert_eq!(source.release_next(Ok(())), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_ack() {
        let source = SimulatedSource::new(AckBehavior::After(Duration::from_millis(30)));
        let ack = source.set_mode(SourceMode::Standby);

        assert_eq!(source.current_mode(), SourceMode::Active);
        assert_eq!(ack.await.unwrap(), Ok(()));
        assert_eq!(source.current_mode(), SourceMode::Standby);
    }

    #[test]
    fn test_capture_without_feed_goes_nowhere() {
        let source = SimulatedSource::default();
        assert!(!source.capture(ScanFrame::single("{}")));
    }
}
