//! # Scanner Configuration
//!
//! Tunables for the debounce cycle and the decoder.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     RAPIDSCAN_RESUME_DELAY_MS=0                                        │
//! │     RAPIDSCAN_REPEAT_POLICY=silent                                     │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/scanner/scanner.toml (Linux)                             │
//! │     ~/Library/Application Support/com.rapidscan.scanner/scanner.toml   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     150 ms resume delay, 2 s transition timeout, all symbologies       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # scanner.toml
//! [debounce]
//! resume_delay_ms = 150
//! transition_timeout_ms = 2000
//! repeat_policy = "notify"  # notify | silent
//!
//! [decoder]
//! symbologies = ["code128", "code39", "qr", "ean8", "upce", "ean13Upca"]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, PipelineResult};
use rapidscan_core::validation::validate_symbology_set;
use rapidscan_core::{ScanDecoder, Symbology};

// =============================================================================
// Repeat Policy
// =============================================================================

/// What the deduplicator does with a repeat of the last accepted scan.
///
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  NOTIFY (Default)                   │  SILENT                           │
/// │  ────────────────                   │  ──────                           │
/// │  • Emits Repeated(scan)             │  • Drops the repeat               │
/// │  • UI shows "Press & Hold to        │  • UI sees nothing                │
/// │    Add More"                        │                                   │
/// │                                                                         │
/// │  Neither policy starts a cooldown or touches the cart.                 │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatPolicy {
    #[default]
    Notify,
    Silent,
}

impl std::fmt::Display for RepeatPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepeatPolicy::Notify => write!(f, "notify"),
            RepeatPolicy::Silent => write!(f, "silent"),
        }
    }
}

impl std::str::FromStr for RepeatPolicy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "notify" | "hold" => Ok(RepeatPolicy::Notify),
            "silent" | "drop" => Ok(RepeatPolicy::Silent),
            other => Err(PipelineError::InvalidConfig(format!(
                "Unknown repeat policy: '{}'. Valid options: notify, silent",
                other
            ))),
        }
    }
}

// =============================================================================
// Debounce Settings
// =============================================================================

/// Timing of the standby/resume cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebounceSettings {
    /// Time spent in standby after an acceptance (milliseconds).
    /// Zero resumes as soon as standby is acknowledged.
    #[serde(default = "default_resume_delay")]
    pub resume_delay_ms: u64,

    /// Upper bound on a single mode change acknowledgement (milliseconds).
    #[serde(default = "default_transition_timeout")]
    pub transition_timeout_ms: u64,

    /// Handling of repeats of the last accepted scan.
    #[serde(default)]
    pub repeat_policy: RepeatPolicy,
}

fn default_resume_delay() -> u64 {
    150
}

fn default_transition_timeout() -> u64 {
    2000
}

impl Default for DebounceSettings {
    fn default() -> Self {
        DebounceSettings {
            resume_delay_ms: default_resume_delay(),
            transition_timeout_ms: default_transition_timeout(),
            repeat_policy: RepeatPolicy::default(),
        }
    }
}

impl DebounceSettings {
    pub fn resume_delay(&self) -> Duration {
        Duration::from_millis(self.resume_delay_ms)
    }

    pub fn transition_timeout(&self) -> Duration {
        Duration::from_millis(self.transition_timeout_ms)
    }
}

// =============================================================================
// Decoder Settings
// =============================================================================

/// Symbologies the decoder reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderSettings {
    #[serde(default = "Symbology::default_enabled")]
    pub symbologies: Vec<Symbology>,
}

impl Default for DecoderSettings {
    fn default() -> Self {
        DecoderSettings {
            symbologies: Symbology::default_enabled(),
        }
    }
}

// =============================================================================
// Main Scanner Configuration
// =============================================================================

/// Complete scanner configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScannerConfig {
    #[serde(default)]
    pub debounce: DebounceSettings,

    #[serde(default)]
    pub decoder: DecoderSettings,
}

impl ScannerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (scanner.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> PipelineResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading scanner config from file");
                config = Self::load_file(&path)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Reads one TOML file, without environment overrides or validation.
    fn load_file(path: &Path) -> PipelineResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load scanner config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> PipelineResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| PipelineError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PipelineError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)
            .map_err(|e| PipelineError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Scanner config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.debounce.transition_timeout_ms == 0 {
            return Err(PipelineError::InvalidConfig(
                "transition_timeout_ms must be greater than 0".into(),
            ));
        }

        validate_symbology_set(&self.decoder.symbologies)
            .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup. Unparseable values are logged
    /// and ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(delay) = lookup("RAPIDSCAN_RESUME_DELAY_MS") {
            match delay.parse::<u64>() {
                Ok(ms) => {
                    debug!(resume_delay_ms = ms, "Overriding resume delay from environment");
                    self.debounce.resume_delay_ms = ms;
                }
                Err(_) => warn!(value = %delay, "Invalid RAPIDSCAN_RESUME_DELAY_MS"),
            }
        }

        if let Some(timeout) = lookup("RAPIDSCAN_TRANSITION_TIMEOUT_MS") {
            match timeout.parse::<u64>() {
                Ok(ms) => self.debounce.transition_timeout_ms = ms,
                Err(_) => warn!(value = %timeout, "Invalid RAPIDSCAN_TRANSITION_TIMEOUT_MS"),
            }
        }

        if let Some(policy) = lookup("RAPIDSCAN_REPEAT_POLICY") {
            match policy.parse() {
                Ok(parsed) => {
                    debug!(policy = %policy, "Overriding repeat policy from environment");
                    self.debounce.repeat_policy = parsed;
                }
                Err(e) => warn!("{}", e),
            }
        }

        // Comma separated, e.g. "qr,ean13"
        if let Some(list) = lookup("RAPIDSCAN_SYMBOLOGIES") {
            let parsed: Result<Vec<Symbology>, _> = list
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(str::parse)
                .collect();
            match parsed {
                Ok(symbologies) => self.decoder.symbologies = symbologies,
                Err(e) => warn!(value = %list, "Invalid RAPIDSCAN_SYMBOLOGIES: {}", e),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "rapidscan", "scanner")
            .map(|dirs| dirs.config_dir().join("scanner.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Builds a decoder for the configured symbologies.
    pub fn decoder(&self) -> ScanDecoder {
        ScanDecoder::new(self.decoder.symbologies.clone())
    }

    pub fn repeat_policy(&self) -> RepeatPolicy {
        self.debounce.repeat_policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ScannerConfig::default();
        assert_eq!(config.debounce.resume_delay_ms, 150);
        assert_eq!(config.debounce.transition_timeout_ms, 2000);
        assert_eq!(config.repeat_policy(), RepeatPolicy::Notify);
        assert_eq!(config.decoder.symbologies, Symbology::ALL.to_vec());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_repeat_policy_parsing() {
        assert_eq!("notify".parse::<RepeatPolicy>().unwrap(), RepeatPolicy::Notify);
        assert_eq!("SILENT".parse::<RepeatPolicy>().unwrap(), RepeatPolicy::Silent);
        assert!("sometimes".parse::<RepeatPolicy>().is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ScannerConfig::default();

        config.debounce.transition_timeout_ms = 0;
        assert!(config.validate().unwrap_err().is_config_error());

        config.debounce.transition_timeout_ms = 500;
        config.decoder.symbologies.clear();
        assert!(config.validate().is_err());

        config.decoder.symbologies = vec![Symbology::Qr, Symbology::Qr];
        assert!(config.validate().is_err());

        // A zero resume delay is allowed
        config.decoder.symbologies = vec![Symbology::Qr];
        config.debounce.resume_delay_ms = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ScannerConfig = toml::from_str(
            r#"
            [debounce]
            resume_delay_ms = 0
            repeat_policy = "silent"
            "#,
        )
        .unwrap();

        assert_eq!(config.debounce.resume_delay_ms, 0);
        assert_eq!(config.debounce.transition_timeout_ms, 2000);
        assert_eq!(config.repeat_policy(), RepeatPolicy::Silent);
        assert_eq!(config.decoder.symbologies.len(), 6);
    }

    #[test]
    fn test_toml_serialization() {
        let config = ScannerConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[debounce]"));
        assert!(toml_str.contains("[decoder]"));
        assert!(toml_str.contains("ean13Upca"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ScannerConfig::default();
        config.apply_overrides(overrides(&[
            ("RAPIDSCAN_RESUME_DELAY_MS", "0"),
            ("RAPIDSCAN_TRANSITION_TIMEOUT_MS", "750"),
            ("RAPIDSCAN_REPEAT_POLICY", "silent"),
            ("RAPIDSCAN_SYMBOLOGIES", "qr, EAN13"),
        ]));

        assert_eq!(config.debounce.resume_delay(), Duration::ZERO);
        assert_eq!(config.debounce.transition_timeout(), Duration::from_millis(750));
        assert_eq!(config.repeat_policy(), RepeatPolicy::Silent);
        assert_eq!(
            config.decoder.symbologies,
            vec![Symbology::Qr, Symbology::Ean13UpcA]
        );
    }

    #[test]
    fn test_bad_env_overrides_are_ignored() {
        let mut config = ScannerConfig::default();
        config.apply_overrides(overrides(&[
            ("RAPIDSCAN_RESUME_DELAY_MS", "soon"),
            ("RAPIDSCAN_REPEAT_POLICY", "loud"),
            ("RAPIDSCAN_SYMBOLOGIES", "qr,pdf417"),
        ]));

        assert_eq!(config.debounce.resume_delay_ms, 150);
        assert_eq!(config.repeat_policy(), RepeatPolicy::Notify);
        assert_eq!(config.decoder.symbologies.len(), 6);
    }

    #[test]
    fn test_save_and_load_roundtrip_file() {
        let path = std::env::temp_dir().join(format!(
            "rapidscan-config-test-{}.toml",
            std::process::id()
        ));
        let mut config = ScannerConfig::default();
        config.debounce.resume_delay_ms = 42;
        config.debounce.repeat_policy = RepeatPolicy::Silent;
        config.decoder.symbologies = vec![Symbology::Code128];
        config.save(Some(path.clone())).unwrap();

        let loaded = ScannerConfig::load_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded.debounce.resume_delay_ms, 42);
        assert_eq!(loaded.debounce.repeat_policy, RepeatPolicy::Silent);
        assert_eq!(
            loaded.debounce.transition_timeout_ms,
            config.debounce.transition_timeout_ms
        );
        assert_eq!(loaded.decoder.symbologies, vec![Symbology::Code128]);
    }

    #[test]
    fn test_load_file_rejects_malformed_toml() {
        let path = std::env::temp_dir().join(format!(
            "rapidscan-config-bad-{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "[debounce]\nresume_delay_ms = \"soon\"\n").unwrap();

        let result = ScannerConfig::load_file(&path);
        std::fs::remove_file(&path).unwrap();

        assert!(result.err().is_some_and(|e| e.is_config_error()));
    }

    #[test]
    fn test_decoder_respects_symbologies() {
        let mut config = ScannerConfig::default();
        config.decoder.symbologies = vec![Symbology::Qr];
        let decoder = config.decoder();
        assert!(decoder.is_enabled(Symbology::Qr));
        assert!(!decoder.is_enabled(Symbology::Ean8));
    }
}
