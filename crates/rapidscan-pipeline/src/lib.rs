//! # rapidscan-pipeline: Scan Event Pipeline
//!
//! Async half of the scanner: takes the capture device's decoded frames,
//! decides which of them are new scans, cycles the device through standby so
//! one pass is reported once, and keeps the checkout cart.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Scan Event Pipeline                              │
//! │                                                                         │
//! │  ┌─────────────┐   ScanFeed    ┌───────────────────────────────────┐   │
//! │  │ ScanSource  │ ────────────► │           Deduplicator            │   │
//! │  │  (camera)   │               │                                   │   │
//! │  │             │ ◄──────────── │  decode ─► new? ─► Accepted       │   │
//! │  └─────────────┘   set_mode    │            same? ─► Repeated      │   │
//! │                    + ModeAck   │  Idle ► Suspending ► Cooldown ►   │   │
//! │                                │  Resuming ► Idle                  │   │
//! │                                └────────┬──────────────┬───────────┘   │
//! │                              ScanSink   │              │ broadcast     │
//! │                                         ▼              ▼               │
//! │                              ┌──────────────────┐   Presentation       │
//! │   adjust / remove / clear ─► │  CartAggregator  │ ─► observers         │
//! │   (presentation layer)       │  Mutex<Cart>     │   (CartNotification) │
//! │                              └──────────────────┘                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//! - [`config`] - Debounce and decoder configuration (TOML + env)
//! - [`error`] - Pipeline error types
//! - [`source`] - Capture device interface and simulated device
//! - [`events`] - Scan and cart notifications
//! - [`deduplicator`] - Debounce state machine task
//! - [`aggregator`] - Thread-safe cart owner
//! - [`pipeline`] - Wiring
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rapidscan_pipeline::{ScanPipeline, ScannerConfig, SimulatedSource};
//!
//! let config = ScannerConfig::load_or_default(None);
//! let source = Arc::new(SimulatedSource::default());
//! let pipeline = ScanPipeline::start(&config, source.clone())?;
//! source.attach(pipeline.feed());
//!
//! let mut cart_events = pipeline.cart().subscribe();
//! while let Ok(event) = cart_events.recv().await {
//!     println!("{:?} (total {})", event, pipeline.cart().total_quantity());
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod aggregator;
pub mod config;
pub mod deduplicator;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod source;

// =============================================================================
// Re-exports
// =============================================================================

pub use aggregator::CartAggregator;
pub use config::{DebounceSettings, DecoderSettings, RepeatPolicy, ScannerConfig};
pub use deduplicator::{
    DedupPhase, Deduplicator, DeduplicatorHandle, DeduplicatorSettings, DeduplicatorState,
    ScanFeed,
};
pub use error::{PipelineError, PipelineResult};
pub use events::{CartNotification, ScanNotification, ScanSink};
pub use pipeline::ScanPipeline;
pub use source::{AckBehavior, ModeAck, ScanSource, SimulatedSource, SourceMode};
