//! Capability provider backed by a static device profile
//!
//! Profiles describe a phone's cameras in TOML. They back the CLI and the
//! offline tests, and let external cameras be unplugged at runtime.

use super::CapabilityProvider;
use crate::device::{RawDeviceInfo, VideoCapability, ZoomBounds};
use crate::errors::CameraError;
use crate::types::{
    CameraFacing, DynamicRange, ExtensionMode, FrameRate, Quality, StabilizationMode,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use std::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityProfile {
    pub quality: Quality,
    #[serde(default)]
    pub frame_rates: Vec<FrameRate>,
    #[serde(default = "default_dynamic_ranges")]
    pub dynamic_ranges: Vec<DynamicRange>,
}

fn default_dynamic_ranges() -> Vec<DynamicRange> {
    vec![DynamicRange::Sdr]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    #[serde(flatten)]
    pub info: RawDeviceInfo,
    #[serde(default)]
    pub video: Vec<QualityProfile>,
    #[serde(default)]
    pub extension_modes: BTreeSet<ExtensionMode>,
    #[serde(default)]
    pub zoom_bounds: Option<ZoomBounds>,
}

impl DeviceProfile {
    pub fn new(id: impl Into<String>, facing: CameraFacing) -> Self {
        Self {
            info: RawDeviceInfo::new(id, facing),
            video: Vec::new(),
            extension_modes: BTreeSet::new(),
            zoom_bounds: None,
        }
    }

    pub fn with_video(
        mut self,
        quality: Quality,
        frame_rates: &[u32],
        dynamic_ranges: &[DynamicRange],
    ) -> Self {
        self.video.push(QualityProfile {
            quality,
            frame_rates: frame_rates.iter().copied().map(FrameRate).collect(),
            dynamic_ranges: dynamic_ranges.to_vec(),
        });
        self
    }

    pub fn with_flash(mut self) -> Self {
        self.info.has_flash_unit = true;
        self
    }

    pub fn with_physical_ids(mut self, ids: &[&str]) -> Self {
        self.info.physical_camera_ids = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn with_optics(mut self, focal_length: f32, sensor_width_mm: f32) -> Self {
        self.info.focal_lengths = vec![focal_length];
        self.info.sensor_width_mm = Some(sensor_width_mm);
        self
    }

    pub fn with_zoom_bounds(mut self, min: f32, max: f32) -> Self {
        self.zoom_bounds = Some(ZoomBounds::new(min, max));
        self
    }

    pub fn with_stabilization(mut self, modes: &[StabilizationMode]) -> Self {
        self.info.stabilization_modes.extend(modes.iter().copied());
        self
    }

    pub fn with_extensions(mut self, modes: &[ExtensionMode]) -> Self {
        self.extension_modes.extend(modes.iter().copied());
        self
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    devices: Vec<DeviceProfile>,
}

#[derive(Debug, Default)]
pub struct ProfileProvider {
    devices: Vec<DeviceProfile>,
    disconnected: RwLock<HashSet<String>>,
}

impl ProfileProvider {
    pub fn new(devices: Vec<DeviceProfile>) -> Self {
        Self {
            devices,
            disconnected: RwLock::new(HashSet::new()),
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, CameraError> {
        let file: ProfileFile = toml::from_str(contents)
            .map_err(|e| CameraError::Config(format!("Failed to parse device profile: {}", e)))?;
        Ok(Self::new(file.devices))
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            CameraError::Io(format!("Failed to read device profile {:?}: {}", path, e))
        })?;
        let provider = Self::from_toml_str(&contents)?;
        log::info!(
            "Loaded device profile {:?} with {} devices",
            path,
            provider.devices.len()
        );
        Ok(provider)
    }

    /// Simulate plugging or unplugging a device.
    pub fn set_connected(&self, device_id: &str, connected: bool) {
        let mut disconnected = self.disconnected.write().unwrap_or_else(|e| e.into_inner());
        if connected {
            disconnected.remove(device_id);
        } else {
            disconnected.insert(device_id.to_string());
        }
    }

    fn is_connected(&self, device_id: &str) -> bool {
        !self
            .disconnected
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(device_id)
    }

    fn profile(&self, device_id: &str) -> Result<&DeviceProfile, CameraError> {
        if !self.is_connected(device_id) {
            return Err(CameraError::Provider(format!(
                "device {} is disconnected",
                device_id
            )));
        }
        self.devices
            .iter()
            .find(|d| d.info.id == device_id)
            .ok_or_else(|| CameraError::DeviceNotFound(device_id.to_string()))
    }
}

impl CapabilityProvider for ProfileProvider {
    fn list_devices(&self) -> Result<Vec<RawDeviceInfo>, CameraError> {
        Ok(self
            .devices
            .iter()
            .filter(|d| self.is_connected(&d.info.id))
            .map(|d| d.info.clone())
            .collect())
    }

    fn video_capabilities(
        &self,
        device_id: &str,
    ) -> Result<BTreeMap<Quality, VideoCapability>, CameraError> {
        let profile = self.profile(device_id)?;
        let mut capabilities: BTreeMap<Quality, VideoCapability> = BTreeMap::new();
        for entry in &profile.video {
            let capability = capabilities.entry(entry.quality).or_default();
            capability.frame_rates.extend(entry.frame_rates.iter().copied());
            capability
                .dynamic_ranges
                .extend(entry.dynamic_ranges.iter().copied());
        }
        Ok(capabilities)
    }

    fn zoom_bounds(&self, device_id: &str) -> Result<ZoomBounds, CameraError> {
        Ok(self.profile(device_id)?.zoom_bounds.unwrap_or_default())
    }

    fn extension_support(
        &self,
        device_id: &str,
        _facing: CameraFacing,
    ) -> Result<BTreeSet<ExtensionMode>, CameraError> {
        Ok(self.profile(device_id)?.extension_modes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE: &str = r#"
[[devices]]
id = "0"
facing = "back"
has_flash_unit = true
focal_lengths = [4.38]
sensor_width_mm = 6.4
stabilization_modes = ["digital"]
extension_modes = ["night", "hdr"]
zoom_bounds = { min = 1.0, max = 8.0 }

[[devices.video]]
quality = "fhd"
frame_rates = [30, 60]
dynamic_ranges = ["sdr", "hlg10_bit"]

[[devices.video]]
quality = "uhd"
frame_rates = [30]

[[devices]]
id = "1"
facing = "front"
"#;

    #[test]
    fn test_parse_profile() {
        let provider = ProfileProvider::from_toml_str(PROFILE).unwrap();
        let devices = provider.list_devices().unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].facing, CameraFacing::Back);
        assert!(devices[0].has_flash_unit);

        let video = provider.video_capabilities("0").unwrap();
        assert_eq!(video.len(), 2);
        assert!(video[&Quality::Fhd].frame_rates.contains(&FrameRate::FPS_60));
        assert!(video[&Quality::Fhd]
            .dynamic_ranges
            .contains(&DynamicRange::Hlg10Bit));
        assert_eq!(
            video[&Quality::Uhd].dynamic_ranges.iter().next(),
            Some(&DynamicRange::Sdr)
        );
        assert_eq!(provider.zoom_bounds("0").unwrap().max, 8.0);
    }

    #[test]
    fn test_disconnected_device_fails_soft() {
        let provider = ProfileProvider::from_toml_str(PROFILE).unwrap();
        provider.set_connected("1", false);

        assert_eq!(provider.list_devices().unwrap().len(), 1);
        assert!(provider.video_capabilities("1").is_err());

        provider.set_connected("1", true);
        assert_eq!(provider.list_devices().unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_profile() {
        assert!(ProfileProvider::from_toml_str("devices = 3").is_err());
    }
}
