//! # rapidscan-core: Pure Scan & Cart Logic
//!
//! This crate holds everything about a checkout scan session that can be
//! expressed without touching a camera, a clock-driven timer, or a thread.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Rapid Scan Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │             Presentation (external, out of scope)               │   │
//! │  │      Camera preview ──► Checkout card ──► Quantity editor       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ notifications / adjust_quantity        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    rapidscan-pipeline                           │   │
//! │  │     Deduplicator task ──► CartAggregator ──► subscribers        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ rapidscan-core (THIS CRATE) ★                   │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   scan    │  │   cart    │  │ validation│  │   │
//! │  │   │DecodedScan│  │ Symbology │  │   Cart    │  │  payload  │  │   │
//! │  │   │ ScanFrame │  │ScanDecoder│  │ CartLine  │  │  quantity │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO TIMERS • NO THREADS • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Scan and cart data types (DecodedScan, ScanFrame, CartLine)
//! - [`scan`] - Symbologies and decoding of the capture device's raw output
//! - [`cart`] - Insertion-ordered cart with per-payload quantities
//! - [`error`] - Domain error types
//! - [`validation`] - Payload and quantity rules
//!
//! ## Example Usage
//!
//! ```rust
//! use rapidscan_core::{Cart, DecodedScan, LineDeltaKind};
//!
//! let mut cart = Cart::new();
//! let scan = DecodedScan::new("012345678905", "ean13Upca");
//!
//! assert_eq!(cart.record_accepted_scan(&scan).kind, LineDeltaKind::Added);
//! assert_eq!(cart.record_accepted_scan(&scan).kind, LineDeltaKind::Incremented);
//! assert_eq!(cart.total_quantity(), 2);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod scan;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::Cart;
pub use error::{CoreError, CoreResult, ValidationError};
pub use scan::{ScanDecoder, Symbology};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Longest payload accepted from the decoder, in characters.
///
/// Matches the numeric capacity of a version 40 QR code, the largest
/// symbology the capture device is configured for.
pub const MAX_PAYLOAD_LEN: usize = 7089;

/// Longest symbology identifier accepted from the decoder.
pub const MAX_SYMBOLOGY_LEN: usize = 32;

/// Largest quantity a single cart line can hold.
pub const MAX_LINE_QUANTITY: i64 = 999;
