//! Configuration management for lensgate
//!
//! Device-specific tuning that the platform does not report: which aux
//! cameras to expose, extra or broken frame rates per quality, logical
//! camera zoom breakpoints, plus capture and storage defaults.

use crate::device::ZoomBreakpoint;
use crate::errors::CameraError;
use crate::types::{FlashMode, FrameRate, Quality};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LensgateConfig {
    pub catalog: CatalogConfig,
    pub video: VideoConfig,
    pub zoom: ZoomConfig,
    pub capture: CaptureConfig,
    pub storage: StorageConfig,
}

/// Which internal cameras are offered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Offer cameras other than the first one of each facing
    pub enable_aux_cameras: bool,
    /// Aux camera ids never offered
    pub ignored_aux_camera_ids: Vec<String>,
    /// Drop aux cameras backed by more than one physical sensor
    pub ignore_logical_aux_cameras: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            enable_aux_cameras: true,
            ignored_aux_camera_ids: Vec::new(),
            ignore_logical_aux_cameras: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub additional_configurations: Vec<AdditionalVideoConfiguration>,
}

/// Frame rate corrections for one camera and a set of qualities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditionalVideoConfiguration {
    pub camera_id: String,
    pub qualities: Vec<Quality>,
    #[serde(default)]
    pub added_frame_rates: Vec<FrameRate>,
    #[serde(default)]
    pub removed_frame_rates: Vec<FrameRate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    pub logical_ratios: Vec<LogicalZoomRatio>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalZoomRatio {
    pub camera_id: String,
    pub approximate: f32,
    pub exact: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Record audio along with video
    pub record_audio: bool,
    /// Flash mode used when nothing was persisted yet
    pub default_flash_mode: FlashMode,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            record_audio: true,
            default_flash_mode: FlashMode::Auto,
        }
    }
}

/// Output naming
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub output_directory: String,
    pub photo_prefix: String,
    pub video_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_directory: "./captures".to_string(),
            photo_prefix: "IMG".to_string(),
            video_prefix: "VID".to_string(),
        }
    }
}

/// Frame rates to add and remove for one camera and quality.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameRateAdjustment {
    pub added: BTreeSet<FrameRate>,
    pub removed: BTreeSet<FrameRate>,
}

impl LensgateConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| CameraError::Config(format!("Failed to read config file: {}", e)))?;

        let config: LensgateConfig = toml::from_str(&contents)
            .map_err(|e| CameraError::Config(format!("Failed to parse config file: {}", e)))?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load the file (if any) and overlay `LENSGATE__<SECTION>__<KEY>` environment variables.
    pub fn load_layered<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix("LENSGATE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| CameraError::Config(format!("Failed to build config: {}", e)))?;

        settings
            .try_deserialize()
            .map_err(|e| CameraError::Config(format!("Failed to deserialize config: {}", e)))
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CameraError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CameraError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| CameraError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| CameraError::Config(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("lensgate.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        for entry in &self.video.additional_configurations {
            if entry.qualities.is_empty() {
                return Err(format!(
                    "Additional video configuration for camera {} has no qualities",
                    entry.camera_id
                ));
            }
            let rates = entry
                .added_frame_rates
                .iter()
                .chain(entry.removed_frame_rates.iter());
            for rate in rates {
                if rate.value() == 0 || rate.value() > 240 {
                    return Err(format!("Invalid frame rate {} (must be 1-240)", rate.value()));
                }
            }
        }

        let mut seen: HashSet<(String, u32)> = HashSet::new();
        for ratio in &self.zoom.logical_ratios {
            let valid = |v: f32| v.is_finite() && v > 0.0;
            if !valid(ratio.approximate) || !valid(ratio.exact) {
                return Err(format!(
                    "Zoom ratios for camera {} must be positive",
                    ratio.camera_id
                ));
            }
            if !seen.insert((ratio.camera_id.clone(), ratio.approximate.to_bits())) {
                return Err(format!(
                    "Duplicate approximate zoom ratio {} for camera {}",
                    ratio.approximate, ratio.camera_id
                ));
            }
        }

        if self.storage.output_directory.trim().is_empty() {
            return Err("Output directory must not be empty".to_string());
        }

        Ok(())
    }

    /// Configured breakpoints for a camera, without the implied identity.
    pub fn zoom_breakpoints(&self, camera_id: &str) -> Vec<ZoomBreakpoint> {
        self.zoom
            .logical_ratios
            .iter()
            .filter(|r| r.camera_id == camera_id)
            .map(|r| ZoomBreakpoint::new(r.approximate, r.exact))
            .collect()
    }

    /// Frame rate corrections per quality for a camera.
    pub fn frame_rate_adjustments(&self, camera_id: &str) -> BTreeMap<Quality, FrameRateAdjustment> {
        let mut adjustments: BTreeMap<Quality, FrameRateAdjustment> = BTreeMap::new();
        for entry in self
            .video
            .additional_configurations
            .iter()
            .filter(|c| c.camera_id == camera_id)
        {
            for quality in &entry.qualities {
                let adjustment = adjustments.entry(*quality).or_default();
                adjustment.added.extend(entry.added_frame_rates.iter().copied());
                adjustment
                    .removed
                    .extend(entry.removed_frame_rates.iter().copied());
            }
        }
        adjustments
    }
}
