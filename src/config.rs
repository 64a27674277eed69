use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uma_capture::{regions, ScreenRegion};
use uma_data::DEFAULT_MIN_SUBSTRING_LEN;
use uma_vision::{DEFAULT_DEDUP_RADIUS, DEFAULT_MIN_WORD_CONFIDENCE};

/// Runtime settings, read from `config.json`. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scenario: String,
    /// Directory holding the knowledge-base tables
    pub data_dir: PathBuf,
    pub priority_path: PathBuf,
    pub marker_template: PathBuf,
    pub choice_region: ScreenRegion,
    pub event_name_region: ScreenRegion,
    /// First-pass existence check threshold
    pub detect_confidence: f64,
    /// Re-check pass threshold, paired with `brightness_threshold`
    pub choice_confidence: f64,
    pub brightness_threshold: f64,
    pub dedup_radius: f64,
    pub min_substring_len: usize,
    pub stabilize_ms: u64,
    pub abort_on_extraction_failure: bool,
    pub debug_dir: PathBuf,
    pub save_debug_images: bool,
    pub ocr_min_word_confidence: f64,
    /// Event name -> fixed ordinal; bypasses lookup and ranking
    pub event_overrides: BTreeMap<String, usize>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scenario: "ura".into(),
            data_dir: PathBuf::from("assets/events"),
            priority_path: PathBuf::from("event_priority.json"),
            marker_template: PathBuf::from("assets/icons/event_choice_1.png"),
            choice_region: regions::event_choices(),
            event_name_region: regions::event_name(),
            detect_confidence: 0.7,
            choice_confidence: 0.45,
            brightness_threshold: 160.0,
            dedup_radius: DEFAULT_DEDUP_RADIUS,
            min_substring_len: DEFAULT_MIN_SUBSTRING_LEN,
            stabilize_ms: 1500,
            abort_on_extraction_failure: false,
            debug_dir: PathBuf::from("debug"),
            save_debug_images: true,
            ocr_min_word_confidence: DEFAULT_MIN_WORD_CONFIDENCE,
            event_overrides: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    pub fn parse(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json.trim_start_matches('\u{feff}'))?)
    }

    /// Load from `path`, or defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Config {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        info!("Loaded config from {} (scenario '{}')", path.display(), config.scenario);
        Ok(config)
    }
}
