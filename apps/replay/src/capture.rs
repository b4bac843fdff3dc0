//! Capture file parsing.
//!
//! A capture is JSON Lines, one decoder frame per line:
//! ```text
//! {"after_ms": 0,  "barcodes": [{"data": "012345678905", "symbology": "ean13Upca"}]}
//! {"after_ms": 33, "barcodes": ["{\"data\":\"abc\",\"symbology\":\"qr\"}"]}
//! {"after_ms": 33, "barcodes": []}
//! ```
//! Barcodes may be given as objects or as the raw JSON strings the decoder
//! emits. Blank lines and lines starting with `#` are skipped.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use rapidscan_core::ScanFrame;

/// One recorded frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedFrame {
    /// Gap since the previous frame.
    pub after: Duration,
    pub frame: ScanFrame,
}

#[derive(Debug, Deserialize)]
struct CaptureLine {
    #[serde(default)]
    after_ms: u64,
    #[serde(default)]
    barcodes: Vec<Value>,
}

/// Parses a whole capture file.
pub fn parse_capture(contents: &str) -> Result<Vec<CapturedFrame>> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(idx, line)| {
            parse_line(line).with_context(|| format!("capture line {}", idx + 1))
        })
        .collect()
}

fn parse_line(line: &str) -> Result<CapturedFrame> {
    let parsed: CaptureLine = serde_json::from_str(line)?;
    let barcodes = parsed
        .barcodes
        .into_iter()
        .map(|value| match value {
            // Already the decoder's raw string
            Value::String(raw) => raw,
            other => other.to_string(),
        })
        .collect();

    Ok(CapturedFrame {
        after: Duration::from_millis(parsed.after_ms),
        frame: ScanFrame::new(barcodes),
    })
}
