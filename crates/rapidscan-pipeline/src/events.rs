//! # Pipeline Notifications
//!
//! Everything the pipeline pushes outward: scan decisions from the
//! deduplicator and line changes from the cart.
//!
//! ## Delivery Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Notification Fan-out                             │
//! │                                                                         │
//! │  Deduplicator task                                                      │
//! │       │ ScanNotification                                                │
//! │       ├──► ScanSink::on_scan()   (synchronous, in decision order)       │
//! │       │        └── CartAggregator ──► CartNotification                  │
//! │       │                                   └──► broadcast (UI)           │
//! │       └──► broadcast (UI observers: accept flash, "hold to add more")   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Broadcast receivers that fall behind see `RecvError::Lagged`; sinks never
//! miss a notification.

use serde::{Deserialize, Serialize};

use crate::source::SourceMode;
use rapidscan_core::{CartLine, DecodedScan, LineDelta, LineDeltaKind};

/// Capacity of every broadcast channel in the pipeline.
pub const NOTIFICATION_CAPACITY: usize = 256;

// =============================================================================
// Scan Notifications
// =============================================================================

/// A deduplicator decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ScanNotification {
    /// A new physical presentation of a barcode.
    Accepted(DecodedScan),

    /// The last accepted barcode is still being held up to the camera.
    Repeated(DecodedScan),

    /// The capture device failed to switch modes. The deduplicator is back in
    /// `Idle` and assumes the device is active.
    TransitionFailed {
        mode: SourceMode,
        reason: String,
        timed_out: bool,
    },
}

impl ScanNotification {
    /// The scan this notification is about, if any.
    pub fn scan(&self) -> Option<&DecodedScan> {
        match self {
            ScanNotification::Accepted(scan) | ScanNotification::Repeated(scan) => Some(scan),
            ScanNotification::TransitionFailed { .. } => None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, ScanNotification::Accepted(_))
    }
}

/// Synchronous receiver of scan decisions.
///
/// Called on the deduplicator task, once per decision, in decision order.
/// Implementations must not block.
pub trait ScanSink: Send + Sync {
    fn on_scan(&self, notification: &ScanNotification);
}

// =============================================================================
// Cart Notifications
// =============================================================================

/// A change to the cart, carrying the line as it is after the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum CartNotification {
    LineAdded(CartLine),
    LineIncremented(CartLine),
    /// A scan was accepted but the line is already at the quantity cap.
    LineAtLimit(CartLine),
    LineAdjusted(CartLine),
    /// Carries the line as it was when removed.
    LineRemoved(CartLine),
    /// Every line was removed and a new cart id issued.
    Cleared,
}

impl From<LineDelta> for CartNotification {
    fn from(delta: LineDelta) -> Self {
        match delta.kind {
            LineDeltaKind::Added => CartNotification::LineAdded(delta.line),
            LineDeltaKind::Incremented => CartNotification::LineIncremented(delta.line),
            LineDeltaKind::AtLimit => CartNotification::LineAtLimit(delta.line),
            LineDeltaKind::Adjusted => CartNotification::LineAdjusted(delta.line),
            LineDeltaKind::Removed => CartNotification::LineRemoved(delta.line),
        }
    }
}
