//! # Domain Types
//!
//! Data types shared by the scan pipeline and the presentation layer.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   ScanFrame     │   │  DecodedScan    │   │    CartLine     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  barcodes (raw  │──►│  payload        │──►│  scan           │       │
//! │  │  decoder JSON)  │   │  symbology      │   │  quantity ≥ 1   │       │
//! │  └─────────────────┘   └─────────────────┘   │  first/last seen│       │
//! │                                              └─────────────────┘       │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │   LineDelta     │   │  CartSnapshot   │                             │
//! │  │  ─────────────  │   │  ─────────────  │                             │
//! │  │  kind           │   │  cart_id        │                             │
//! │  │  line (after)   │   │  lines, totals  │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! - A `DecodedScan` is identified structurally: same payload and same
//!   symbology means the same scan.
//! - A `CartLine` is keyed by payload alone, so the same product code read
//!   through two symbologies still lands on one line.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// =============================================================================
// Decoded Scan
// =============================================================================

/// A barcode payload plus the symbology it was read as.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DecodedScan {
    /// Decoded barcode content.
    pub payload: String,

    /// Symbology identifier as reported by the decoder (e.g. `ean13Upca`).
    pub symbology: String,
}

impl DecodedScan {
    /// Creates a decoded scan.
    pub fn new(payload: impl Into<String>, symbology: impl Into<String>) -> Self {
        DecodedScan {
            payload: payload.into(),
            symbology: symbology.into(),
        }
    }
}

impl std::fmt::Display for DecodedScan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.payload, self.symbology)
    }
}

// =============================================================================
// Scan Frame
// =============================================================================

/// One observation frame from the capture device.
///
/// Each entry is the raw JSON record the decoder produced for a barcode newly
/// recognised in this frame, e.g. `{"data":"012345678905","symbology":"ean13Upca"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFrame {
    /// Raw decoder records, in recognition order.
    #[serde(default)]
    pub barcodes: Vec<String>,
}

impl ScanFrame {
    /// Creates a frame from raw decoder records.
    pub fn new(barcodes: Vec<String>) -> Self {
        ScanFrame { barcodes }
    }

    /// Convenience: a frame carrying a single raw record.
    pub fn single(raw: impl Into<String>) -> Self {
        ScanFrame {
            barcodes: vec![raw.into()],
        }
    }

    /// Convenience: a frame carrying a single well-formed record for `scan`.
    pub fn from_scan(scan: &DecodedScan) -> Self {
        let raw = serde_json::json!({
            "data": scan.payload,
            "symbology": scan.symbology,
        });
        ScanFrame::single(raw.to_string())
    }

    /// Returns true when nothing was recognised in this frame.
    pub fn is_empty(&self) -> bool {
        self.barcodes.is_empty()
    }
}

// =============================================================================
// Cart Line
// =============================================================================

/// The aggregated quantity for one distinct barcode payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// The scan that created this line.
    pub scan: DecodedScan,

    /// Accumulated quantity. Never below 1 while the line exists.
    pub quantity: i64,

    /// When the payload was first accepted.
    #[ts(as = "String")]
    pub first_scanned_at: DateTime<Utc>,

    /// When the line last changed.
    #[ts(as = "String")]
    pub last_scanned_at: DateTime<Utc>,
}

impl CartLine {
    /// Creates a line with quantity 1.
    pub fn new(scan: DecodedScan) -> Self {
        let now = Utc::now();
        CartLine {
            scan,
            quantity: 1,
            first_scanned_at: now,
            last_scanned_at: now,
        }
    }

    /// The payload this line is keyed by.
    #[inline]
    pub fn payload(&self) -> &str {
        &self.scan.payload
    }
}

// =============================================================================
// Line Delta
// =============================================================================

/// What happened to a cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LineDeltaKind {
    /// A new line was created with quantity 1.
    Added,
    /// An existing line's quantity went up by one.
    Incremented,
    /// A repeat scan hit a line already at `MAX_LINE_QUANTITY`; nothing changed.
    AtLimit,
    /// A line's quantity was set explicitly.
    Adjusted,
    /// A line was removed.
    Removed,
}

impl std::fmt::Display for LineDeltaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineDeltaKind::Added => write!(f, "added"),
            LineDeltaKind::Incremented => write!(f, "incremented"),
            LineDeltaKind::AtLimit => write!(f, "at_limit"),
            LineDeltaKind::Adjusted => write!(f, "adjusted"),
            LineDeltaKind::Removed => write!(f, "removed"),
        }
    }
}

/// The result of a cart mutation: the kind of change and the line after it.
///
/// For `Removed` the line is the one that was taken out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LineDelta {
    pub kind: LineDeltaKind,
    pub line: CartLine,
}

// =============================================================================
// Cart Snapshot
// =============================================================================

/// Read-only view of the cart for the presentation layer.
///
/// The checkout header shows `total_quantity`; the table lists `lines` in
/// first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    /// Cart identity (UUID v4), renewed on clear.
    pub cart_id: String,
    pub lines: Vec<CartLine>,
    pub line_count: usize,
    pub total_quantity: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================
