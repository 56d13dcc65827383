//! Configuration management for dynamic parameter tuning
//!
//! Runtime configuration loading from JSON files, enabling tuning of the
//! analysis and scheduling parameters without recompilation. Every section
//! falls back to defaults when the file is missing or malformed.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub analysis: AnalysisConfig,
    pub onset: OnsetConfig,
    pub scheduler: SchedulerConfig,
    pub audio: AudioConfig,
    pub remote: RemoteConfig,
}

/// Spectral analysis parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// FFT window size in samples; must be a power of two
    pub fft_size: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self { fft_size: 2048 }
    }
}

/// Onset detection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnsetConfig {
    /// Normalized RMS level an onset must exceed
    pub energy_threshold: f32,
    /// Minimum seconds between two accepted onsets
    pub refractory_gap_s: f64,
}

impl Default for OnsetConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 0.15,
            refractory_gap_s: 0.1,
        }
    }
}

/// Metronome scheduler parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How far into the future beats are scheduled, in seconds
    pub lookahead_s: f64,
    /// Wall-clock poll interval for the scheduling loop, in milliseconds
    pub poll_interval_ms: u64,
    /// Beats per bar; beat 0 of each bar is accented
    pub beats_per_bar: u32,
    /// Click tone length in seconds
    pub click_duration_s: f64,
    /// Accented-beat click frequency in Hz
    pub accent_frequency_hz: f32,
    /// Regular-beat click frequency in Hz
    pub beat_frequency_hz: f32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lookahead_s: 0.1,
            poll_interval_ms: 25,
            beats_per_bar: 4,
            click_duration_s: 0.15,
            accent_frequency_hz: 1000.0,
            beat_frequency_hz: 800.0,
        }
    }
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Number of capture buffers to pre-allocate
    pub buffer_count: usize,
    /// Size of each capture buffer in samples
    pub buffer_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            buffer_count: 16,
            buffer_size: 2048,
        }
    }
}

/// Remote scoring/history endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the scoring service (e.g. "https://api.example.com")
    pub base_url: String,
    /// Bearer token; history endpoints are skipped when absent
    pub token: Option<String>,
    /// Request timeout in seconds
    pub timeout_s: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: None,
            timeout_s: 5,
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file, falling back to defaults when
    /// the file is missing or invalid.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    tracing::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                tracing::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }
}
