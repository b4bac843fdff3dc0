//! # Scan Decoding
//!
//! Turns the capture device's raw per-barcode records into [`DecodedScan`]
//! values.
//!
//! ## Decode Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Frame → DecodedScan                              │
//! │                                                                         │
//! │  ScanFrame { barcodes: [raw₀, raw₁, ...] }                             │
//! │       │                                                                 │
//! │       │  only raw₀ is considered (first newly recognised barcode)      │
//! │       ▼                                                                 │
//! │  serde_json ──► { "data": "...", "symbology": "..." }                  │
//! │       │                                                                 │
//! │       ├── bad JSON / missing field ──► CoreError::MalformedScan        │
//! │       ├── empty or oversized data  ──► ValidationError                 │
//! │       ├── symbology not enabled    ──► ValidationError::NotAllowed     │
//! │       ▼                                                                 │
//! │  DecodedScan { payload, symbology (canonical identifier) }             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{DecodedScan, ScanFrame};
use crate::validation::{validate_payload, validate_symbology_id};

// =============================================================================
// Symbology
// =============================================================================

/// Barcode symbologies the capture device can be configured to recognise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbology {
    #[serde(rename = "code128")]
    Code128,
    #[serde(rename = "code39")]
    Code39,
    #[serde(rename = "qr")]
    Qr,
    #[serde(rename = "ean8")]
    Ean8,
    #[serde(rename = "upce")]
    UpcE,
    /// EAN-13 and UPC-A share one decoder setting.
    #[serde(rename = "ean13Upca")]
    Ean13UpcA,
}

impl Symbology {
    /// Every supported symbology, in configuration order.
    pub const ALL: [Symbology; 6] = [
        Symbology::Code128,
        Symbology::Code39,
        Symbology::Qr,
        Symbology::Ean8,
        Symbology::UpcE,
        Symbology::Ean13UpcA,
    ];

    /// The identifier used in decoder records and config files.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Symbology::Code128 => "code128",
            Symbology::Code39 => "code39",
            Symbology::Qr => "qr",
            Symbology::Ean8 => "ean8",
            Symbology::UpcE => "upce",
            Symbology::Ean13UpcA => "ean13Upca",
        }
    }

    /// The retail set enabled out of the box: all supported symbologies.
    pub fn default_enabled() -> Vec<Symbology> {
        Symbology::ALL.to_vec()
    }
}

impl std::fmt::Display for Symbology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Symbology {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "code128" => Ok(Symbology::Code128),
            "code39" => Ok(Symbology::Code39),
            "qr" | "qrcode" => Ok(Symbology::Qr),
            "ean8" => Ok(Symbology::Ean8),
            "upce" => Ok(Symbology::UpcE),
            "ean13upca" | "ean13" | "upca" => Ok(Symbology::Ean13UpcA),
            _ => Err(ValidationError::NotAllowed {
                field: "symbology".to_string(),
                allowed: Symbology::ALL.iter().map(|s| s.to_string()).collect(),
            }),
        }
    }
}

// =============================================================================
// Raw Decoder Record
// =============================================================================

/// The subset of the decoder's per-barcode JSON that the pipeline reads.
/// Unknown fields (location, frame id, ...) are ignored.
#[derive(Debug, Deserialize)]
struct RawBarcode {
    data: String,
    symbology: String,
}

// =============================================================================
// Scan Decoder
// =============================================================================

/// Decodes raw barcode records, restricted to an enabled symbology set.
#[derive(Debug, Clone)]
pub struct ScanDecoder {
    enabled: Vec<Symbology>,
}

impl Default for ScanDecoder {
    fn default() -> Self {
        ScanDecoder::new(Symbology::default_enabled())
    }
}

impl ScanDecoder {
    /// Creates a decoder accepting only `enabled` symbologies.
    pub fn new(enabled: Vec<Symbology>) -> Self {
        ScanDecoder { enabled }
    }

    /// The symbologies this decoder accepts.
    pub fn enabled(&self) -> &[Symbology] {
        &self.enabled
    }

    /// Returns true if `symbology` is enabled.
    pub fn is_enabled(&self, symbology: Symbology) -> bool {
        self.enabled.contains(&symbology)
    }

    /// Decodes one raw barcode record.
    ///
    /// The returned scan carries the canonical symbology identifier, so
    /// `"EAN13"` and `"ean13Upca"` from the device compare equal.
    pub fn decode(&self, raw: &str) -> CoreResult<DecodedScan> {
        let record: RawBarcode = serde_json::from_str(raw)?;

        validate_payload(&record.data)?;
        validate_symbology_id(&record.symbology)?;

        let symbology: Symbology = record.symbology.parse()?;
        if !self.is_enabled(symbology) {
            return Err(ValidationError::NotAllowed {
                field: "symbology".to_string(),
                allowed: self.enabled.iter().map(|s| s.to_string()).collect(),
            }
            .into());
        }

        Ok(DecodedScan::new(record.data, symbology.as_str()))
    }

    /// Decodes the first newly recognised barcode of a frame.
    ///
    /// Returns `None` for an empty frame. Later barcodes in the same frame are
    /// not considered; the device re-reports them on subsequent frames.
    pub fn decode_frame(&self, frame: &ScanFrame) -> Option<CoreResult<DecodedScan>> {
        frame.barcodes.first().map(|raw| self.decode(raw))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
