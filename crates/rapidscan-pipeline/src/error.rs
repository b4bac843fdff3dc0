//! # Pipeline Error Types
//!
//! Error types for the scan pipeline.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Pipeline Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────────┐  ┌─────────────────────┐ │
//! │  │  Configuration  │  │  Device Transitions │  │      Internal       │ │
//! │  │                 │  │                     │  │                     │ │
//! │  │  InvalidConfig  │  │  TransitionRejected │  │  ChannelError       │ │
//! │  │  ConfigLoad...  │  │  TransitionAbandoned│  │  ShuttingDown       │ │
//! │  │  ConfigSave...  │  │  TransitionTimeout  │  │                     │ │
//! │  └─────────────────┘  └─────────────────────┘  └─────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  Core (wraps rapidscan_core::CoreError: cart requests, decoding) │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::source::SourceMode;
use rapidscan_core::CoreError;

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Pipeline error type.
#[derive(Debug, Error)]
pub enum PipelineError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid scanner configuration.
    #[error("Invalid scanner configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Device Transition Errors
    // =========================================================================
    /// The capture device refused a mode change.
    #[error("Capture device rejected switch to {mode}: {reason}")]
    TransitionRejected { mode: SourceMode, reason: String },

    /// The capture device dropped the command without acknowledging it.
    #[error("Capture device abandoned switch to {mode}")]
    TransitionAbandoned { mode: SourceMode },

    /// The capture device did not acknowledge a mode change in time.
    #[error("Capture device did not reach {mode} within {after_ms} ms")]
    TransitionTimeout { mode: SourceMode, after_ms: u64 },

    // =========================================================================
    // Domain Errors
    // =========================================================================
    /// Cart or decoding error from rapidscan-core.
    #[error(transparent)]
    Core(#[from] CoreError),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Pipeline task is shutting down.
    #[error("Scan pipeline is shutting down")]
    ShuttingDown,

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for PipelineError {
    fn from(err: toml::de::Error) -> Self {
        PipelineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for PipelineError {
    fn from(err: toml::ser::Error) -> Self {
        PipelineError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl PipelineError {
    /// Returns true if this error came from a capture device mode change.
    pub fn is_transition_error(&self) -> bool {
        matches!(
            self,
            PipelineError::TransitionRejected { .. }
                | PipelineError::TransitionAbandoned { .. }
                | PipelineError::TransitionTimeout { .. }
        )
    }

    /// Returns true if the failure was a timeout rather than a refusal.
    pub fn is_timeout(&self) -> bool {
        matches!(self, PipelineError::TransitionTimeout { .. })
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            PipelineError::InvalidConfig(_)
                | PipelineError::ConfigLoadFailed(_)
                | PipelineError::ConfigSaveFailed(_)
        )
    }
}
