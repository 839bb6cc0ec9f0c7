//! Configuration management for dynamic parameter tuning
//!
//! This module provides runtime configuration loading from JSON files so the
//! averaging window, detection defaults and console addressing can be changed
//! without recompilation. Every section falls back to its defaults when it is
//! missing from the file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::analysis::averager::Retirement;
use crate::console::ValueEncoding;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub console: ConsoleConfig,
}

/// Spectral analysis pipeline parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Number of raw curves in the averaging window
    pub average_frames: usize,
    /// How the averaging window retires curves after each emission
    pub retirement: Retirement,
    /// Consumer polling interval in milliseconds
    pub poll_interval_ms: u64,
    /// Pre-allocated blocks shared by producer and consumer (>= 2)
    pub blocks_in_flight: usize,
    /// Level mapped to 0.0 in the relative magnitude
    pub min_db: f32,
    /// Level mapped to 1.0 in the relative magnitude
    pub max_db: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            average_frames: 20,
            retirement: Retirement::Rolling,
            poll_interval_ms: 50,
            blocks_in_flight: 2,
            min_db: -60.0,
            max_db: -40.0,
        }
    }
}

/// Peak detection and clustering defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Initial peak threshold (0.5-1.0)
    pub threshold: f32,
    /// Initial cluster cap (1-5)
    pub max_clusters: usize,
    /// Largest index gap that still joins two peaks into one cluster
    pub min_distance: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            max_clusters: 5,
            min_distance: 0,
        }
    }
}

/// Console control-plane addressing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Local UDP port the control socket binds to
    pub bind_port: u16,
    /// Console address as `ip:port`
    pub target: String,
    /// How numeric values are written on the wire
    pub value_encoding: ValueEncoding,
    /// Number of EQ slots zeroed by a reset (slots 1..=managed_slots)
    pub managed_slots: usize,
    /// Console slot receiving the first cluster's band
    pub first_band_slot: usize,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            bind_port: 10022,
            target: "169.254.121.37:10023".to_string(),
            value_encoding: ValueEncoding::Text,
            managed_slots: 6,
            first_band_slot: 2,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Returns
    /// The parsed configuration, or the defaults when the file is missing or
    /// invalid (a warning is logged in both cases).
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default asset location
    pub fn load() -> Self {
        Self::load_from_file("assets/rta_config.json")
    }
}
