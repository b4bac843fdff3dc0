//! # Checkout Cart
//!
//! The single-threaded cart that accepted scans are folded into.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Source                    Operation                  Line Change       │
//! │  ──────                    ─────────                  ───────────       │
//! │                                                                         │
//! │  Accepted scan ──────────► record_accepted_scan() ──► new line (qty 1) │
//! │                                                   └─► qty += 1          │
//! │                                                                         │
//! │  Adjust quantity ────────► adjust_quantity() ───────► qty = n (1..=999)│
//! │                                                                         │
//! │  Remove item ────────────► remove_line() ───────────► line removed     │
//! │                                                                         │
//! │  New checkout ───────────► clear() ─────────────────► empty, new id    │
//! │                                                                         │
//! │  Checkout card ──────────► lines() / total_quantity() (read only)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - At most one line per distinct payload
//! - Lines stay in first-seen order
//! - Every line's quantity is between 1 and `MAX_LINE_QUANTITY`
//! - `total_quantity()` always equals the sum of line quantities
//!
//! Thread safety is not this type's concern; the pipeline's `CartAggregator`
//! owns a `Cart` behind a mutex.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::types::{CartLine, CartSnapshot, DecodedScan, LineDelta, LineDeltaKind};
use crate::validation::validate_quantity;
use crate::MAX_LINE_QUANTITY;

/// Insertion-ordered cart keyed by barcode payload.
///
/// Serialize only: the payload index is derived state and is not persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    /// Cart identity (UUID v4). Renewed by `clear`.
    id: String,

    /// Lines in first-seen order.
    lines: Vec<CartLine>,

    /// payload → position in `lines`.
    #[serde(skip)]
    index: HashMap<String, usize>,

    /// Running sum of line quantities.
    total_quantity: i64,

    /// When the cart was created/last cleared.
    created_at: DateTime<Utc>,
}

impl Default for Cart {
    fn default() -> Self {
        Self::new()
    }
}

impl Cart {
    /// Creates a new empty cart.
    pub fn new() -> Self {
        Cart {
            id: Uuid::new_v4().to_string(),
            lines: Vec::new(),
            index: HashMap::new(),
            total_quantity: 0,
            created_at: Utc::now(),
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Folds an accepted scan into the cart.
    ///
    /// ## Behavior
    /// - Payload not in cart: adds a line with quantity 1 (`Added`)
    /// - Payload already in cart: increments its quantity (`Incremented`)
    /// - Line already at `MAX_LINE_QUANTITY`: left as is (`AtLimit`)
    ///
    /// Lines are keyed by payload only; the line keeps the symbology of the
    /// scan that created it.
    pub fn record_accepted_scan(&mut self, scan: &DecodedScan) -> LineDelta {
        if let Some(&pos) = self.index.get(&scan.payload) {
            let line = &mut self.lines[pos];
            line.last_scanned_at = Utc::now();
            if line.quantity >= MAX_LINE_QUANTITY {
                return LineDelta {
                    kind: LineDeltaKind::AtLimit,
                    line: line.clone(),
                };
            }
            line.quantity += 1;
            self.total_quantity += 1;

            return LineDelta {
                kind: LineDeltaKind::Incremented,
                line: line.clone(),
            };
        }

        let line = CartLine::new(scan.clone());
        self.index.insert(scan.payload.clone(), self.lines.len());
        self.lines.push(line.clone());
        self.total_quantity += 1;

        LineDelta {
            kind: LineDeltaKind::Added,
            line,
        }
    }

    /// Sets an explicit quantity on an existing line.
    ///
    /// ## Behavior
    /// - Quantity below 1 or above `MAX_LINE_QUANTITY`: `InvalidQuantity`,
    ///   cart unchanged. Use [`Cart::remove_line`] to take an item out.
    /// - Payload not in cart: `LineNotFound`, cart unchanged
    pub fn adjust_quantity(&mut self, payload: &str, quantity: i64) -> CoreResult<LineDelta> {
        if validate_quantity(quantity).is_err() {
            return Err(CoreError::InvalidQuantity {
                payload: payload.to_string(),
                requested: quantity,
            });
        }

        let pos = *self
            .index
            .get(payload)
            .ok_or_else(|| CoreError::LineNotFound(payload.to_string()))?;

        let line = &mut self.lines[pos];
        self.total_quantity += quantity - line.quantity;
        line.quantity = quantity;
        line.last_scanned_at = Utc::now();

        Ok(LineDelta {
            kind: LineDeltaKind::Adjusted,
            line: line.clone(),
        })
    }

    /// Removes a line by payload.
    pub fn remove_line(&mut self, payload: &str) -> CoreResult<LineDelta> {
        let pos = self
            .index
            .remove(payload)
            .ok_or_else(|| CoreError::LineNotFound(payload.to_string()))?;

        let line = self.lines.remove(pos);
        self.total_quantity -= line.quantity;

        // Positions after the removed line shift down by one
        for later in &self.lines[pos..] {
            if let Some(slot) = self.index.get_mut(later.payload()) {
                *slot -= 1;
            }
        }

        Ok(LineDelta {
            kind: LineDeltaKind::Removed,
            line,
        })
    }

    /// Clears all lines and starts a new cart identity.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.index.clear();
        self.total_quantity = 0;
        self.id = Uuid::new_v4().to_string();
        self.created_at = Utc::now();
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Cart identity.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// When the cart was created or last cleared.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Lines in first-seen order.
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Looks up the line for a payload.
    pub fn line(&self, payload: &str) -> Option<&CartLine> {
        self.index.get(payload).map(|&pos| &self.lines[pos])
    }

    /// Returns the number of distinct payloads in the cart.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Returns the total quantity of all lines.
    pub fn total_quantity(&self) -> i64 {
        self.total_quantity
    }

    /// Sums line quantities from scratch. Always equal to `total_quantity()`.
    pub fn recomputed_total(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Checks if the cart is empty.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Read-only copy for the presentation layer.
    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            cart_id: self.id.clone(),
            lines: self.lines.clone(),
            line_count: self.lines.len(),
            total_quantity: self.total_quantity,
        }
    }
}
