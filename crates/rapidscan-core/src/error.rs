//! # Error Types
//!
//! Domain-specific error types for rapidscan-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  rapidscan-core errors (this file)                                     │
//! │  ├── CoreError        - Malformed scans, rejected cart requests        │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  rapidscan-pipeline errors (separate crate)                            │
//! │  └── PipelineError    - Config, device transitions, channels           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → PipelineError → caller            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Recording an accepted scan is total and has no error path; only decoding
//! and explicit user requests against the cart can fail.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core scan and cart errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The decoder's raw output could not be turned into a `DecodedScan`.
    ///
    /// ## When This Occurs
    /// - The raw barcode record is not valid JSON
    /// - The `data` or `symbology` field is missing or not a string
    ///
    /// The event is discarded; neither the last accepted scan nor the cart
    /// changes.
    #[error("Malformed scan: {reason}")]
    MalformedScan { reason: String },

    /// No cart line exists for the payload.
    #[error("No cart line for payload: {0}")]
    LineNotFound(String),

    /// A quantity below one was requested for an existing line.
    ///
    /// ## User Workflow
    /// ```text
    /// Adjust quantity (payload: "012345678905", qty: 0)
    ///      │
    ///      ▼
    /// InvalidQuantity { requested: 0 }
    ///      │
    ///      ▼
    /// UI offers "Remove item" instead (remove_line)
    /// ```
    #[error("Quantity {requested} for {payload} is invalid; quantities must be between 1 and 999")]
    InvalidQuantity { payload: String, requested: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::MalformedScan {
            reason: err.to_string(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value is outside the allowed range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g. a symbology listed twice).
    #[error("{field} '{value}' is listed more than once")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
