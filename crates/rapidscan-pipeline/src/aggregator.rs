//! # Cart Aggregator
//!
//! The single owner of the checkout cart. Accepted scans arrive from the
//! deduplicator task while quantity edits arrive from the presentation layer;
//! both go through the same lock.
//!
//! ## Thread Safety
//! The cart is wrapped in `Arc<Mutex<T>>` because:
//! 1. Scan acceptances and manual edits come from different tasks
//! 2. Only one of them may modify the cart at a time
//! 3. The change notification must leave in the same order as the changes
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Aggregator Operations                           │
//! │                                                                         │
//! │  Origin                   Call                     Notification         │
//! │  ──────                   ────                     ────────────         │
//! │                                                                         │
//! │  Accepted(scan) ─────────► record_accepted_scan() ► LineAdded /         │
//! │  "Hold to add more" ─────┘                          LineIncremented     │
//! │                                                                         │
//! │  Change Quantity ────────► adjust_quantity() ─────► LineAdjusted        │
//! │                                                                         │
//! │  Remove Line ────────────► remove_line() ─────────► LineRemoved         │
//! │                                                                         │
//! │  Finish Checkout ────────► clear() ───────────────► Cleared             │
//! │                                                                         │
//! │  NOTE: Each mutation and its notification happen under the lock.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::PipelineResult;
use crate::events::{CartNotification, ScanNotification, ScanSink, NOTIFICATION_CAPACITY};
use rapidscan_core::{Cart, CartLine, CartSnapshot, DecodedScan, LineDelta};

/// Thread-safe cart with change notifications.
#[derive(Clone)]
pub struct CartAggregator {
    cart: Arc<Mutex<Cart>>,
    events_tx: broadcast::Sender<CartNotification>,
}

impl CartAggregator {
    /// Creates an empty cart.
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        CartAggregator {
            cart: Arc::new(Mutex::new(Cart::new())),
            events_tx,
        }
    }

    /// Subscribes to cart changes.
    pub fn subscribe(&self) -> broadcast::Receiver<CartNotification> {
        self.events_tx.subscribe()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Adds one unit of `scan`, creating its line if needed.
    pub fn record_accepted_scan(&self, scan: &DecodedScan) -> LineDelta {
        let mut cart = self.lock();
        let delta = cart.record_accepted_scan(scan);
        debug!(
            payload = %scan.payload,
            kind = %delta.kind,
            quantity = delta.line.quantity,
            total = cart.total_quantity(),
            "Cart line updated"
        );
        self.publish(delta.clone().into());
        delta
    }

    /// Sets an explicit quantity on an existing line.
    ///
    /// Quantities outside `1..=MAX_LINE_QUANTITY` and unknown payloads are
    /// rejected without changing the cart; use [`remove_line`](Self::remove_line)
    /// to take a line out.
    pub fn adjust_quantity(&self, payload: &str, quantity: i64) -> PipelineResult<LineDelta> {
        let mut cart = self.lock();
        let delta = cart.adjust_quantity(payload, quantity)?;
        debug!(%payload, quantity, total = cart.total_quantity(), "Cart line adjusted");
        self.publish(delta.clone().into());
        Ok(delta)
    }

    /// Removes a line.
    pub fn remove_line(&self, payload: &str) -> PipelineResult<LineDelta> {
        let mut cart = self.lock();
        let delta = cart.remove_line(payload)?;
        debug!(%payload, total = cart.total_quantity(), "Cart line removed");
        self.publish(delta.clone().into());
        Ok(delta)
    }

    /// Empties the cart and starts a new cart id.
    pub fn clear(&self) {
        let mut cart = self.lock();
        let removed = cart.line_count();
        cart.clear();
        info!(cart_id = %cart.id(), removed, "Cart cleared");
        self.publish(CartNotification::Cleared);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Executes a function with read access to the cart.
    pub fn with_cart<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Cart) -> R,
    {
        f(&self.lock())
    }

    /// Lines in first-seen order.
    pub fn lines(&self) -> Vec<CartLine> {
        self.with_cart(|cart| cart.lines().to_vec())
    }

    pub fn total_quantity(&self) -> i64 {
        self.with_cart(Cart::total_quantity)
    }

    pub fn snapshot(&self) -> CartSnapshot {
        self.with_cart(Cart::snapshot)
    }

    fn lock(&self) -> MutexGuard<'_, Cart> {
        // Cart operations leave the cart consistent even if a caller panicked
        self.cart.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, notification: CartNotification) {
        let _ = self.events_tx.send(notification);
    }
}

impl Default for CartAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanSink for CartAggregator {
    fn on_scan(&self, notification: &ScanNotification) {
        match notification {
            ScanNotification::Accepted(scan) => {
                self.record_accepted_scan(scan);
            }
            // Repeats reach the cart only when the presentation layer
            // re-submits them ("press and hold to add more").
            ScanNotification::Repeated(_) | ScanNotification::TransitionFailed { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::source::SourceMode;
    use rapidscan_core::{CoreError, LineDeltaKind};

    fn ean(payload: &str) -> DecodedScan {
        DecodedScan::new(payload, "ean13Upca")
    }

    #[test]
    fn test_empty_cart() {
        let cart = CartAggregator::new();
        assert!(cart.lines().is_empty());
        assert_eq!(cart.total_quantity(), 0);
    }

    #[test]
    fn test_record_and_adjust() {
        let cart = CartAggregator::new();

        assert_eq!(cart.record_accepted_scan(&ean("012345678905")).kind, LineDeltaKind::Added);
        let delta = cart.record_accepted_scan(&ean("012345678905"));
        assert_eq!(delta.kind, LineDeltaKind::Incremented);
        assert_eq!(delta.line.quantity, 2);
        cart.record_accepted_scan(&DecodedScan::new("abc", "qr"));
        assert_eq!(cart.total_quantity(), 3);

        assert!(matches!(
            cart.adjust_quantity("012345678905", 0),
            Err(PipelineError::Core(CoreError::InvalidQuantity { .. }))
        ));
        assert!(matches!(
            cart.adjust_quantity("unknown", 5),
            Err(PipelineError::Core(CoreError::LineNotFound(_)))
        ));
        assert_eq!(cart.total_quantity(), 3);

        cart.adjust_quantity("012345678905", 5).unwrap();
        assert_eq!(cart.total_quantity(), 6);
        assert_eq!(cart.lines()[0].quantity, 5);
    }

    #[test]
    fn test_queries_are_idempotent() {
        let cart = CartAggregator::new();
        cart.record_accepted_scan(&ean("1"));
        cart.record_accepted_scan(&ean("2"));

        assert_eq!(cart.lines(), cart.lines());
        assert_eq!(cart.total_quantity(), cart.total_quantity());
        assert_eq!(cart.snapshot(), cart.snapshot());
    }

    #[test]
    fn test_sink_only_records_accepted() {
        let cart = CartAggregator::new();

        cart.on_scan(&ScanNotification::Accepted(ean("1")));
        cart.on_scan(&ScanNotification::Repeated(ean("1")));
        cart.on_scan(&ScanNotification::TransitionFailed {
            mode: SourceMode::Standby,
            reason: "timeout".into(),
            timed_out: true,
        });

        assert_eq!(cart.total_quantity(), 1);
    }

    #[tokio::test]
    async fn test_notifications_follow_mutation_order() {
        let cart = CartAggregator::new();
        let mut events = cart.subscribe();

        cart.record_accepted_scan(&ean("1"));
        cart.record_accepted_scan(&ean("1"));
        cart.adjust_quantity("1", 4).unwrap();
        let _ = cart.adjust_quantity("1", -1);
        cart.remove_line("1").unwrap();
        cart.clear();

        let kinds: Vec<&str> = {
            let mut kinds = Vec::new();
            while let Ok(event) = events.try_recv() {
                kinds.push(match event {
                    CartNotification::LineAdded(_) => "added",
                    CartNotification::LineIncremented(_) => "incremented",
                    CartNotification::LineAtLimit(_) => "at_limit",
                    CartNotification::LineAdjusted(_) => "adjusted",
                    CartNotification::LineRemoved(_) => "removed",
                    CartNotification::Cleared => "cleared",
                });
            }
            kinds
        };

        // The rejected adjustment produced nothing
        assert_eq!(kinds, vec!["added", "incremented", "adjusted", "removed", "cleared"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_records_are_not_lost() {
        let cart = CartAggregator::new();
        let mut tasks = Vec::new();

        for worker in 0..4 {
            let cart = cart.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..250 {
                    cart.record_accepted_scan(&ean("shared"));
                    cart.record_accepted_scan(&ean(&format!("w{}-{}", worker, i % 5)));
                    tokio::task::yield_now().await;
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let snapshot = cart.snapshot();
        assert_eq!(snapshot.lines[0].payload(), "shared");
        assert_eq!(snapshot.lines[0].quantity, 1000);
        assert_eq!(snapshot.line_count, 1 + 4 * 5);
        assert_eq!(snapshot.total_quantity, 2000);
        assert_eq!(cart.with_cart(Cart::recomputed_total), 2000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_adjust_races_with_scans_without_drift() {
        let cart = CartAggregator::new();
        cart.record_accepted_scan(&ean("A"));

        let scanner = {
            let cart = cart.clone();
            tokio::spawn(async move {
                for _ in 0..500 {
                    cart.record_accepted_scan(&ean("A"));
                    tokio::task::yield_now().await;
                }
            })
        };
        let editor = {
            let cart = cart.clone();
            tokio::spawn(async move {
                for q in 1..=500 {
                    cart.adjust_quantity("A", q).unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };
        scanner.await.unwrap();
        editor.await.unwrap();

        let line_quantity = cart.lines()[0].quantity;
        assert!(line_quantity >= 1);
        assert_eq!(cart.total_quantity(), line_quantity);
        assert_eq!(cart.with_cart(Cart::recomputed_total), line_quantity);
    }
}
