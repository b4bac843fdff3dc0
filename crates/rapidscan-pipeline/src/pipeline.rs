//! # Scan Pipeline
//!
//! Wires a capture device, the deduplicator and the cart together.
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    ScanPipeline::start(config, source)                  │
//! │                                                                         │
//! │  1. config.validate()                                                  │
//! │  2. ScanDecoder from [decoder] symbologies                             │
//! │  3. CartAggregator::new()                                              │
//! │  4. Deduplicator::new(debounce settings, decoder, source)              │
//! │         .with_sink(cart)                                               │
//! │         .start()                      ──► tokio task                   │
//! │  5. Hand the ScanFeed to the capture device                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use tracing::info;

use crate::aggregator::CartAggregator;
use crate::config::ScannerConfig;
use crate::deduplicator::{Deduplicator, DeduplicatorHandle, DeduplicatorSettings, ScanFeed};
use crate::error::PipelineResult;
use crate::source::ScanSource;

/// A running scan pipeline.
pub struct ScanPipeline {
    deduplicator: DeduplicatorHandle,
    cart: CartAggregator,
}

impl ScanPipeline {
    /// Validates `config` and starts the pipeline. Must be called inside a
    /// tokio runtime.
    pub fn start(config: &ScannerConfig, source: Arc<dyn ScanSource>) -> PipelineResult<Self> {
        config.validate()?;

        let cart = CartAggregator::new();
        let deduplicator = Deduplicator::new(
            DeduplicatorSettings::from(&config.debounce),
            config.decoder(),
            source,
        )
        .with_sink(Arc::new(cart.clone()))
        .start();

        info!(
            symbologies = config.decoder.symbologies.len(),
            repeat_policy = %config.repeat_policy(),
            "Scan pipeline started"
        );

        Ok(ScanPipeline { deduplicator, cart })
    }

    /// Entry point for the capture device.
    pub fn feed(&self) -> ScanFeed {
        self.deduplicator.feed()
    }

    pub fn deduplicator(&self) -> &DeduplicatorHandle {
        &self.deduplicator
    }

    pub fn cart(&self) -> &CartAggregator {
        &self.cart
    }

    /// Clears the cart and forgets the last accepted scan, so the next
    /// checkout starts fresh.
    pub async fn start_new_checkout(&self) -> PipelineResult<()> {
        self.cart.clear();
        self.deduplicator.reset().await
    }

    /// Stops the deduplicator after queued frames are handled. The cart
    /// stays readable.
    pub async fn shutdown(&self) -> PipelineResult<()> {
        self.deduplicator.shutdown().await?;
        info!(total_quantity = self.cart.total_quantity(), "Scan pipeline stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepeatPolicy;
    use crate::deduplicator::DedupPhase;
    use crate::events::{CartNotification, ScanNotification};
    use crate::source::{AckBehavior, SimulatedSource, SourceMode};
    use rapidscan_core::{DecodedScan, ScanFrame, Symbology, MAX_LINE_QUANTITY};

    fn frame(payload: &str, symbology: &str) -> ScanFrame {
        ScanFrame::from_scan(&DecodedScan::new(payload, symbology))
    }

    /// Waits until every queued frame is handled and the device is back up.
    async fn settle(pipeline: &ScanPipeline) {
        pipeline.deduplicator().snapshot().await.unwrap();
        let mut rx = pipeline.deduplicator().watch_state();
        rx.wait_for(|s| s.phase == DedupPhase::Idle).await.unwrap();
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let mut config = ScannerConfig::default();
        config.decoder.symbologies.clear();

        let result = ScanPipeline::start(&config, Arc::new(SimulatedSource::default()));
        assert!(result.err().is_some_and(|e| e.is_config_error()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scans_flow_into_cart() {
        let source = Arc::new(SimulatedSource::default());
        let pipeline = ScanPipeline::start(&ScannerConfig::default(), source.clone()).unwrap();
        source.attach(pipeline.feed());

        for payload in ["012345678905", "012345678905", "abc", "012345678905"] {
            assert!(source.capture(frame(payload, "EAN13")));
            settle(&pipeline).await;
        }

        // The back-to-back repeat did not add; the later re-scan after "abc" did
        let lines = pipeline.cart().lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].payload(), "012345678905");
        assert_eq!(lines[0].quantity, 2);
        assert_eq!(lines[1].payload(), "abc");
        assert_eq!(pipeline.cart().total_quantity(), 3);

        pipeline.shutdown().await.unwrap();
        assert_eq!(pipeline.cart().total_quantity(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_standby_source_decodes_nothing() {
        let source = Arc::new(SimulatedSource::new(AckBehavior::Hold));
        let pipeline = ScanPipeline::start(&ScannerConfig::default(), source.clone()).unwrap();
        source.attach(pipeline.feed());

        assert!(source.capture(frame("A", "qr")));
        pipeline.deduplicator().snapshot().await.unwrap();
        source.release_next(Ok(()));
        assert_eq!(source.current_mode(), SourceMode::Standby);

        assert!(!source.capture(frame("B", "qr")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hold_to_add_more_resubmits_repeat() {
        let source = Arc::new(SimulatedSource::default());
        let pipeline = ScanPipeline::start(&ScannerConfig::default(), source.clone()).unwrap();
        let mut decisions = pipeline.deduplicator().subscribe();

        pipeline.feed().deliver(frame("A", "qr"));
        settle(&pipeline).await;
        pipeline.feed().deliver(frame("A", "qr"));

        // Presentation layer reacts to the repeat
        while let Ok(notification) = decisions.recv().await {
            if let ScanNotification::Repeated(scan) = notification {
                pipeline.cart().record_accepted_scan(&scan);
                break;
            }
        }

        assert_eq!(pipeline.cart().total_quantity(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_checkout_resets_both_sides() {
        let source = Arc::new(SimulatedSource::default());
        let mut config = ScannerConfig::default();
        config.debounce.repeat_policy = RepeatPolicy::Silent;
        config.decoder.symbologies = vec![Symbology::Qr];
        let pipeline = ScanPipeline::start(&config, source).unwrap();

        pipeline.feed().deliver(frame("A", "qr"));
        settle(&pipeline).await;
        let first_cart = pipeline.cart().snapshot().cart_id;

        pipeline.start_new_checkout().await.unwrap();
        assert_eq!(pipeline.cart().total_quantity(), 0);
        assert_ne!(pipeline.cart().snapshot().cart_id, first_cart);

        // Same item opens the next checkout
        pipeline.feed().deliver(frame("A", "qr"));
        let mut rx = pipeline.deduplicator().watch_state();
        rx.wait_for(|s| s.phase == DedupPhase::Idle && s.last_accepted.is_some())
            .await
            .unwrap();
        assert_eq!(pipeline.cart().total_quantity(), 1);

        // Disabled symbology never reaches the cart
        pipeline.feed().deliver(frame("B", "ean8"));
        pipeline.deduplicator().snapshot().await.unwrap();
        assert_eq!(pipeline.cart().lines().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_at_quantity_cap_keeps_pipeline_running() {
        let source = Arc::new(SimulatedSource::default());
        let pipeline = ScanPipeline::start(&ScannerConfig::default(), source).unwrap();

        pipeline.feed().deliver(frame("A", "qr"));
        settle(&pipeline).await;
        pipeline.cart().adjust_quantity("A", MAX_LINE_QUANTITY).unwrap();
        assert!(pipeline.cart().adjust_quantity("A", i64::MAX).is_err());

        let mut cart_events = pipeline.cart().subscribe();
        pipeline.deduplicator().reset().await.unwrap();
        pipeline.feed().deliver(frame("A", "qr"));
        settle(&pipeline).await;

        // Accepted again, but the line does not move past the cap
        assert!(pipeline.deduplicator().snapshot().await.is_ok());
        assert_eq!(pipeline.cart().lines()[0].quantity, MAX_LINE_QUANTITY);
        assert_eq!(pipeline.cart().total_quantity(), MAX_LINE_QUANTITY);
        assert!(matches!(
            cart_events.try_recv(),
            Ok(CartNotification::LineAtLimit(line)) if line.quantity == MAX_LINE_QUANTITY
        ));

        pipeline.feed().deliver(frame("B", "qr"));
        settle(&pipeline).await;
        assert_eq!(pipeline.cart().total_quantity(), MAX_LINE_QUANTITY + 1);
    }
}
