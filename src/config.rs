//! Configuration management for the content scanner.
//!
//! Loads configuration from TOML files and provides runtime defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub extraction: ExtractionConfig,

    #[serde(default)]
    pub filter: FilterConfig,

    #[serde(default)]
    pub classification: ClassificationConfig,

    #[serde(default)]
    pub thresholds: ThresholdConfig,

    #[serde(default)]
    pub alerts: AlertConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Whether timer and watcher triggered passes run
    #[serde(default = "default_true")]
    pub auto_scan_enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            auto_scan_enabled: true,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Interval between timer-driven passes
    #[serde(default = "default_scan_interval")]
    pub scan_interval_ms: u64,

    /// Debounce time after scroll stops
    #[serde(default = "default_debounce")]
    pub scroll_debounce_ms: u64,

    /// Debounce time after the last batch of inserted nodes
    #[serde(default = "default_debounce")]
    pub mutation_debounce_ms: u64,
}

impl TimingConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn scroll_debounce(&self) -> Duration {
        Duration::from_millis(self.scroll_debounce_ms)
    }

    pub fn mutation_debounce(&self) -> Duration {
        Duration::from_millis(self.mutation_debounce_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: 3000,
            scroll_debounce_ms: 1000,
            mutation_debounce_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Maximum candidates emitted per pass
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Maximum nodes visited per pass
    #[serde(default = "default_max_nodes_visited")]
    pub max_nodes_visited: usize,

    /// Minimum normalized aggregate text length for a fallback candidate
    #[serde(default = "default_min_aggregate_len")]
    pub min_aggregate_len: usize,

    /// Maximum normalized aggregate text length for a fallback candidate
    #[serde(default = "default_max_text_len")]
    pub max_aggregate_len: usize,

    /// Direct text must be strictly longer than this
    #[serde(default = "default_min_direct_len")]
    pub min_direct_len: usize,

    /// Extra space above and below the viewport that still counts as visible
    #[serde(default)]
    pub viewport_margin: f64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_candidates: 50,
            max_nodes_visited: 100,
            min_aggregate_len: 30,
            max_aggregate_len: 2000,
            min_direct_len: 20,
            viewport_margin: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Minimum text length worth analyzing
    #[serde(default = "default_min_text_len")]
    pub min_text_len: usize,

    /// Maximum text length worth analyzing
    #[serde(default = "default_max_text_len")]
    pub max_text_len: usize,

    /// Minimum number of words longer than two characters
    #[serde(default = "default_min_words")]
    pub min_words: usize,

    /// Extra class/id glob patterns to exclude (e.g. "*cookie*")
    #[serde(default)]
    pub excluded_patterns: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_text_len: 15,
            max_text_len: 2000,
            min_words: 3,
            excluded_patterns: Vec::new(),
        }
    }
}

/// How aggressively the user wants content flagged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensitivityTier {
    Low,
    #[default]
    Medium,
    High,
}

impl SensitivityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensitivityTier::Low => "low",
            SensitivityTier::Medium => "medium",
            SensitivityTier::High => "high",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationConfig {
    /// Base address of the classification service
    #[serde(default = "default_service_address")]
    pub service_base_address: String,

    /// Per-call timeout; an expired call counts as a transport failure
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Language code sent with every request
    #[serde(default = "default_language")]
    pub language: String,

    /// Caller tag sent with every request
    #[serde(default = "default_source_tag")]
    pub source_tag: String,

    #[serde(default)]
    pub sensitivity: SensitivityTier,

    /// Calls allowed in flight at once within a pass
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl ClassificationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            service_base_address: default_service_address(),
            timeout_ms: default_timeout_ms(),
            language: default_language(),
            source_tag: default_source_tag(),
            sensitivity: SensitivityTier::default(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

/// Confidence gates applied to classification results
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Danger above this confidence raises a high-priority alert
    #[serde(default = "default_danger_alert")]
    pub danger_alert: f64,

    /// Danger above this confidence is marked
    #[serde(default = "default_danger_marker")]
    pub danger_marker: f64,

    /// Caution above this confidence is marked
    #[serde(default = "default_caution_marker")]
    pub caution_marker: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            danger_alert: 0.5,
            danger_marker: 0.25,
            caution_marker: 0.3,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Speak high-priority alerts aloud
    #[serde(default)]
    pub voice_alerts_enabled: bool,
}

/// Errors raised while reading the config file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_scan_interval() -> u64 {
    3000
}

fn default_debounce() -> u64 {
    1000
}

fn default_max_candidates() -> usize {
    50
}

fn default_max_nodes_visited() -> usize {
    100
}

fn default_min_aggregate_len() -> usize {
    30
}

fn default_min_direct_len() -> usize {
    20
}

fn default_min_text_len() -> usize {
    15
}

fn default_max_text_len() -> usize {
    2000
}

fn default_min_words() -> usize {
    3
}

fn default_service_address() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_concurrent() -> usize {
    8
}

fn default_language() -> String {
    "en".to_string()
}

fn default_source_tag() -> String {
    "content-scanner".to_string()
}

fn default_danger_alert() -> f64 {
    0.5
}

fn default_danger_marker() -> f64 {
    0.25
}

fn default_caution_marker() -> f64 {
    0.3
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Self {
        Self::load_from_path(Self::default_config_path())
    }

    /// Load configuration from a specific path, falling back to defaults
    pub fn load_from_path(path: PathBuf) -> Self {
        match Self::try_load_from_path(&path) {
            Ok(config) => {
                info!("Loaded configuration from {:?}", path);
                config
            }
            Err(ConfigError::Io(_)) => {
                info!("No config file found at {:?}, using defaults", path);
                Self::default()
            }
            Err(e) => {
                warn!("Failed to parse config file: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Load configuration, surfacing read and parse errors
    pub fn try_load_from_path(path: &PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("content-scanner")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.general.auto_scan_enabled);
        assert_eq!(config.timing.scan_interval_ms, 3000);
        assert_eq!(config.extraction.max_candidates, 50);
        assert_eq!(config.extraction.max_nodes_visited, 100);
        assert_eq!(config.thresholds.danger_alert, 0.5);
        assert!(!config.alerts.voice_alerts_enabled);
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
[general]
auto_scan_enabled = false
log_level = "debug"

[timing]
scan_interval_ms = 5000

[classification]
service_base_address = "https://scan.example.net"
sensitivity = "high"

[thresholds]
danger_alert = 0.7
"#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(!config.general.auto_scan_enabled);
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.timing.scan_interval(), Duration::from_secs(5));
        // Unspecified fields keep their defaults
        assert_eq!(config.timing.scroll_debounce_ms, 1000);
        assert_eq!(config.classification.service_base_address, "https://scan.example.net");
        assert_eq!(config.classification.sensitivity, SensitivityTier::High);
        assert_eq!(config.thresholds.danger_alert, 0.7);
        assert_eq!(config.thresholds.danger_marker, 0.25);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[alerts]\nvoice_alerts_enabled = true\n\n[filter]\nexcluded_patterns = [\"*cookie*\"]\n",
        )
        .unwrap();

        let loaded = Config::load_from_path(path);
        assert!(loaded.alerts.voice_alerts_enabled);
        assert_eq!(loaded.filter.excluded_patterns, vec!["*cookie*".to_string()]);
        assert_eq!(loaded.classification.max_concurrent, 8);
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is [not toml").unwrap();

        assert!(matches!(
            Config::try_load_from_path(&path),
            Err(ConfigError::Parse(_))
        ));
        let config = Config::load_from_path(path);
        assert_eq!(config.timing.scan_interval_ms, 3000);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_path(dir.path().join("absent.toml"));
        assert!(config.general.auto_scan_enabled);
    }
}
