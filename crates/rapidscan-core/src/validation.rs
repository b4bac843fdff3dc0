//! # Validation Module
//!
//! Input validation for decoded scans, cart requests and decoder settings.
//!
//! ## Validation Points
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Where Validation Runs                              │
//! │                                                                         │
//! │  Decoder output (ScanDecoder::decode)                                  │
//! │  ├── validate_payload          non-empty, bounded length               │
//! │  └── validate_symbology_id     non-empty, bounded length               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Cart requests (Cart::adjust_quantity)                                 │
//! │  └── validate_quantity         at least 1                              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Configuration (ScannerConfig::validate)                               │
//! │  └── validate_symbology_set    non-empty, no duplicates                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use rapidscan_core::validation::{validate_payload, validate_quantity};
//!
//! assert!(validate_payload("012345678905").is_ok());
//! assert!(validate_quantity(0).is_err());
//! ```

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::scan::Symbology;
use crate::{MAX_LINE_QUANTITY, MAX_PAYLOAD_LEN, MAX_SYMBOLOGY_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Scan Validators
// =============================================================================

/// Validates a decoded barcode payload.
///
/// ## Rules
/// - Must not be empty
/// - At most `MAX_PAYLOAD_LEN` characters
///
/// Whitespace and control characters are legal barcode content (Code 128
/// carries FNC1 as a group separator), so the payload is not trimmed.
pub fn validate_payload(payload: &str) -> ValidationResult<()> {
    if payload.is_empty() {
        return Err(ValidationError::Required {
            field: "payload".to_string(),
        });
    }

    if payload.chars().count() > MAX_PAYLOAD_LEN {
        return Err(ValidationError::TooLong {
            field: "payload".to_string(),
            max: MAX_PAYLOAD_LEN,
        });
    }

    Ok(())
}

/// Validates a symbology identifier as reported by the decoder.
pub fn validate_symbology_id(symbology: &str) -> ValidationResult<()> {
    let symbology = symbology.trim();

    if symbology.is_empty() {
        return Err(ValidationError::Required {
            field: "symbology".to_string(),
        });
    }

    if symbology.len() > MAX_SYMBOLOGY_LEN {
        return Err(ValidationError::TooLong {
            field: "symbology".to_string(),
            max: MAX_SYMBOLOGY_LEN,
        });
    }

    Ok(())
}

// =============================================================================
// Cart Validators
// =============================================================================

/// Validates an explicit line quantity.
///
/// ## Rules
/// - Must be at least 1. Zero is a removal, not an adjustment.
/// - At most `MAX_LINE_QUANTITY` (999)
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Checkout card: Adjust Quantity                                         │
/// │                                                                         │
/// │  Cashier enters quantity: 5                                            │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_quantity(5) ← THIS FUNCTION                                  │
/// │       │                                                                 │
/// │       ├── qty <= 0? → Error: "quantity must be positive"               │
/// │       │                                                                 │
/// │       ├── qty > 999? → Error: "quantity must be between 1 and 999"     │
/// │       │                                                                 │
/// │       └── OK → Cart::adjust_quantity                                   │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty < 1 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

// =============================================================================
// Settings Validators
// =============================================================================

/// Validates the set of symbologies the decoder is allowed to report.
///
/// ## Rules
/// - At least one symbology
/// - No symbology listed twice
pub fn validate_symbology_set(symbologies: &[Symbology]) -> ValidationResult<()> {
    if symbologies.is_empty() {
        return Err(ValidationError::Required {
            field: "symbologies".to_string(),
        });
    }

    let mut seen = HashSet::new();
    for symbology in symbologies {
        if !seen.insert(*symbology) {
            return Err(ValidationError::Duplicate {
                field: "symbologies".to_string(),
                value: symbology.to_string(),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
