//! Configuration file support for the companion.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/companion/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub ppg: PpgConfig,

    #[serde(default)]
    pub motion: MotionConfig,

    #[serde(default)]
    pub stress: StressConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// What to report when peak counting finds no beats
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Surface an inconclusive estimate and keep the previous BPM
    #[default]
    Inconclusive,
    /// Substitute a random value in the resting range
    PlausibleFiller,
}

/// Heart rate estimator parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PpgConfig {
    #[serde(default = "default_capture_fps")]
    pub capture_fps: f64,

    /// Side length of the centered square the red mean is taken over
    #[serde(default = "default_roi_size")]
    pub roi_size: u32,

    #[serde(default = "default_display_window")]
    pub display_window: usize,

    #[serde(default = "default_estimate_after_frames")]
    pub estimate_after_frames: u64,

    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// Samples kept after each estimate
    #[serde(default = "default_retain_samples")]
    pub retain_samples: usize,

    /// Frame counter value after each estimate
    #[serde(default = "default_rewind_frames")]
    pub rewind_frames: u64,

    /// Samples on each side of the detrending window
    #[serde(default = "default_detrend_half_width")]
    pub detrend_half_width: usize,

    #[serde(default = "default_peak_threshold")]
    pub peak_threshold: f64,

    #[serde(default = "default_min_bpm")]
    pub min_bpm: u32,

    #[serde(default = "default_max_bpm")]
    pub max_bpm: u32,

    #[serde(default)]
    pub fallback: FallbackPolicy,
}

impl Default for PpgConfig {
    fn default() -> Self {
        Self {
            capture_fps: default_capture_fps(),
            roi_size: default_roi_size(),
            display_window: default_display_window(),
            estimate_after_frames: default_estimate_after_frames(),
            min_samples: default_min_samples(),
            retain_samples: default_retain_samples(),
            rewind_frames: default_rewind_frames(),
            detrend_half_width: default_detrend_half_width(),
            peak_threshold: default_peak_threshold(),
            min_bpm: default_min_bpm(),
            max_bpm: default_max_bpm(),
            fallback: FallbackPolicy::default(),
        }
    }
}

impl PpgConfig {
    /// Interval between captured frames
    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.capture_fps)
    }

    /// Check the parameters for values the estimator cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.capture_fps.is_nan() || self.capture_fps <= 0.0 {
            return Err(Error::Config(format!(
                "ppg.capture_fps must be positive, got {}",
                self.capture_fps
            )));
        }
        if self.min_bpm > self.max_bpm {
            return Err(Error::Config(format!(
                "ppg.min_bpm ({}) exceeds ppg.max_bpm ({})",
                self.min_bpm, self.max_bpm
            )));
        }
        if self.min_samples < 3 {
            return Err(Error::Config("ppg.min_samples must be at least 3".into()));
        }
        if self.rewind_frames >= self.estimate_after_frames {
            return Err(Error::Config(
                "ppg.rewind_frames must be below ppg.estimate_after_frames".into(),
            ));
        }
        Ok(())
    }
}

/// Fall detection thresholds (m/s², gravity included)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MotionConfig {
    #[serde(default = "default_impact_threshold")]
    pub impact_threshold: f64,

    #[serde(default = "default_free_fall_threshold")]
    pub free_fall_threshold: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            impact_threshold: default_impact_threshold(),
            free_fall_threshold: default_free_fall_threshold(),
        }
    }
}

/// Simulated stress walk parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StressConfig {
    #[serde(default = "default_stress_initial")]
    pub initial_level: f64,

    /// Largest change per sample in either direction
    #[serde(default = "default_stress_max_step")]
    pub max_step: f64,

    /// Seconds between samples when paced in real time
    #[serde(default = "default_stress_interval_secs")]
    pub interval_secs: u64,
}

impl StressConfig {
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs)
    }

    /// Reject levels and steps the random walk cannot sample from
    pub fn validate(&self) -> Result<()> {
        if !self.initial_level.is_finite() {
            return Err(Error::Config(format!(
                "stress.initial_level must be finite, got {}",
                self.initial_level
            )));
        }
        if !self.max_step.is_finite() || self.max_step < 0.0 {
            return Err(Error::Config(format!(
                "stress.max_step must be a finite non-negative number, got {}",
                self.max_step
            )));
        }
        if self.interval_secs == 0 {
            return Err(Error::Config("stress.interval_secs must be at least 1".into()));
        }
        Ok(())
    }
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            initial_level: default_stress_initial(),
            max_step: default_stress_max_step(),
            interval_secs: default_stress_interval_secs(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        std::env::var("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .unwrap_or_else(|_| PathBuf::from("."))
    });
    base.join("companion")
}

fn default_capture_fps() -> f64 {
    30.0
}

fn default_roi_size() -> u32 {
    80
}

fn default_display_window() -> usize {
    60
}

fn default_estimate_after_frames() -> u64 {
    150
}

fn default_min_samples() -> usize {
    100
}

fn default_retain_samples() -> usize {
    60
}

fn default_rewind_frames() -> u64 {
    100
}

fn default_detrend_half_width() -> usize {
    5
}

fn default_peak_threshold() -> f64 {
    0.5
}

fn default_min_bpm() -> u32 {
    50
}

fn default_max_bpm() -> u32 {
    150
}

fn default_impact_threshold() -> f64 {
    25.0
}

fn default_free_fall_threshold() -> f64 {
    2.0
}

fn default_stress_initial() -> f64 {
    25.0
}

fn default_stress_max_step() -> f64 {
    5.0
}

fn default_stress_interval_secs() -> u64 {
    2
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.ppg.validate()?;
        config.stress.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            std::env::var("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|_| PathBuf::from("."))
        });
        base.join("companion").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
