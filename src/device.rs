//! Camera device model
//!
//! A [`Device`] is assembled once by the catalog from the provider's raw
//! report plus configuration, and never mutated afterwards. Equality and
//! hashing use the device id only.

use crate::types::{
    CameraFacing, CameraMode, CameraType, DynamicRange, ExtensionMode, FlashMode, FrameRate,
    Quality, StabilizationMode,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

/// Width of a full-frame 35mm sensor in millimetres.
const FULL_FRAME_WIDTH_MM: f32 = 36.0;

/// Device description as reported by a [`CapabilityProvider`](crate::platform::CapabilityProvider).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDeviceInfo {
    pub id: String,
    pub facing: CameraFacing,
    #[serde(default)]
    pub physical_camera_ids: Vec<String>,
    /// Available focal lengths in millimetres, main one first.
    #[serde(default)]
    pub focal_lengths: Vec<f32>,
    #[serde(default)]
    pub sensor_width_mm: Option<f32>,
    #[serde(default)]
    pub has_flash_unit: bool,
    #[serde(default)]
    pub exposure_compensation_range: (i32, i32),
    #[serde(default)]
    pub stabilization_modes: BTreeSet<StabilizationMode>,
}

impl RawDeviceInfo {
    pub fn new(id: impl Into<String>, facing: CameraFacing) -> Self {
        Self {
            id: id.into(),
            facing,
            physical_camera_ids: Vec::new(),
            focal_lengths: Vec::new(),
            sensor_width_mm: None,
            has_flash_unit: false,
            exposure_compensation_range: (0, 0),
            stabilization_modes: BTreeSet::new(),
        }
    }

    /// 35mm-equivalent focal length of the main lens, when the optics are known.
    pub fn mm35_focal_length(&self) -> Option<f32> {
        let sensor_width = self.sensor_width_mm.filter(|w| *w > 0.0)?;
        let focal_length = self.focal_lengths.first().copied()?;
        Some(mm35_focal_length(focal_length, sensor_width))
    }
}

pub fn mm35_focal_length(focal_length: f32, sensor_width_mm: f32) -> f32 {
    (FULL_FRAME_WIDTH_MM / sensor_width_mm) * focal_length
}

/// Frame rates and dynamic ranges supported for one quality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoCapability {
    #[serde(default)]
    pub frame_rates: BTreeSet<FrameRate>,
    #[serde(default)]
    pub dynamic_ranges: BTreeSet<DynamicRange>,
}

impl VideoCapability {
    pub fn new(
        frame_rates: impl IntoIterator<Item = FrameRate>,
        dynamic_ranges: impl IntoIterator<Item = DynamicRange>,
    ) -> Self {
        Self {
            frame_rates: frame_rates.into_iter().collect(),
            dynamic_ranges: dynamic_ranges.into_iter().collect(),
        }
    }
}

/// Approximate (user facing) to exact zoom ratio pair of a logical camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomBreakpoint {
    pub approximate: f32,
    pub exact: f32,
}

impl ZoomBreakpoint {
    pub const IDENTITY: ZoomBreakpoint = ZoomBreakpoint {
        approximate: 1.0,
        exact: 1.0,
    };

    pub fn new(approximate: f32, exact: f32) -> Self {
        Self { approximate, exact }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomBounds {
    pub min: f32,
    pub max: f32,
}

impl ZoomBounds {
    pub fn new(min: f32, max: f32) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn clamp(&self, ratio: f32) -> f32 {
        if ratio.is_nan() {
            return self.min;
        }
        ratio.clamp(self.min, self.max)
    }
}

impl Default for ZoomBounds {
    fn default() -> Self {
        Self { min: 1.0, max: 1.0 }
    }
}

/// Everything the catalog gathers before constructing a [`Device`].
#[derive(Debug, Clone)]
pub struct DeviceParts {
    pub raw: RawDeviceInfo,
    pub video_capabilities: BTreeMap<Quality, VideoCapability>,
    pub extension_modes: BTreeSet<ExtensionMode>,
    pub zoom_bounds: ZoomBounds,
    pub zoom_breakpoints: Vec<ZoomBreakpoint>,
    pub intrinsic_zoom_ratio: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Device {
    id: String,
    facing: CameraFacing,
    physical_camera_ids: Vec<String>,
    has_flash_unit: bool,
    exposure_compensation_range: (i32, i32),
    stabilization_modes: BTreeSet<StabilizationMode>,
    extension_modes: BTreeSet<ExtensionMode>,
    video_capabilities: BTreeMap<Quality, VideoCapability>,
    zoom_bounds: ZoomBounds,
    zoom_breakpoints: Vec<ZoomBreakpoint>,
    intrinsic_zoom_ratio: f32,
}

impl Device {
    pub fn new(parts: DeviceParts) -> Self {
        let DeviceParts {
            raw,
            video_capabilities,
            mut extension_modes,
            zoom_bounds,
            zoom_breakpoints,
            intrinsic_zoom_ratio,
        } = parts;

        let mut stabilization_modes = raw.stabilization_modes;
        stabilization_modes.insert(StabilizationMode::Off);
        extension_modes.insert(ExtensionMode::None);

        // only a logical camera has sensors to switch between
        let zoom_breakpoints = if raw.physical_camera_ids.len() > 1 {
            normalize_breakpoints(zoom_breakpoints)
        } else {
            if !zoom_breakpoints.is_empty() {
                log::debug!(
                    "Ignoring zoom breakpoints for non-logical camera {}",
                    raw.id
                );
            }
            vec![ZoomBreakpoint::IDENTITY]
        };

        Self {
            id: raw.id,
            facing: raw.facing,
            physical_camera_ids: raw.physical_camera_ids,
            has_flash_unit: raw.has_flash_unit,
            exposure_compensation_range: raw.exposure_compensation_range,
            stabilization_modes,
            extension_modes,
            video_capabilities,
            zoom_bounds,
            zoom_breakpoints,
            intrinsic_zoom_ratio: if intrinsic_zoom_ratio.is_finite() && intrinsic_zoom_ratio > 0.0 {
                intrinsic_zoom_ratio
            } else {
                1.0
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn facing(&self) -> CameraFacing {
        self.facing
    }

    pub fn camera_type(&self) -> CameraType {
        self.facing.camera_type()
    }

    pub fn physical_camera_ids(&self) -> &[String] {
        &self.physical_camera_ids
    }

    /// Backed by more than one physical sensor.
    pub fn is_logical(&self) -> bool {
        self.physical_camera_ids.len() > 1
    }

    pub fn has_flash_unit(&self) -> bool {
        self.has_flash_unit
    }

    pub fn exposure_compensation_range(&self) -> (i32, i32) {
        self.exposure_compensation_range
    }

    pub fn stabilization_modes(&self) -> &BTreeSet<StabilizationMode> {
        &self.stabilization_modes
    }

    pub fn supports_stabilization_mode(&self, mode: StabilizationMode) -> bool {
        self.stabilization_modes.contains(&mode)
    }

    pub fn extension_modes(&self) -> &BTreeSet<ExtensionMode> {
        &self.extension_modes
    }

    pub fn supports_extension_mode(&self, mode: ExtensionMode) -> bool {
        self.extension_modes.contains(&mode)
    }

    pub fn video_capabilities(&self) -> &BTreeMap<Quality, VideoCapability> {
        &self.video_capabilities
    }

    pub fn video_capability(&self, quality: Quality) -> Option<&VideoCapability> {
        self.video_capabilities.get(&quality)
    }

    /// Supported qualities in fallback order.
    pub fn supported_qualities(&self) -> impl Iterator<Item = Quality> + '_ {
        self.video_capabilities.keys().copied()
    }

    pub fn supports_video_recording(&self) -> bool {
        !self.video_capabilities.is_empty()
    }

    pub fn supports_camera_mode(&self, mode: CameraMode) -> bool {
        match mode {
            CameraMode::Video => self.supports_video_recording(),
            CameraMode::Photo | CameraMode::Qr => true,
        }
    }

    /// Flash modes the hardware can honour, regardless of camera mode.
    pub fn supported_flash_modes(&self) -> Vec<FlashMode> {
        if self.has_flash_unit {
            vec![FlashMode::Off, FlashMode::Auto, FlashMode::On, FlashMode::Torch]
        } else if self.facing == CameraFacing::Front {
            vec![FlashMode::Off, FlashMode::Screen]
        } else {
            vec![FlashMode::Off]
        }
    }

    /// Flash modes offered in `mode`, in cycling order.
    pub fn flash_modes_for(&self, mode: CameraMode) -> Vec<FlashMode> {
        let supported = self.supported_flash_modes();
        FlashMode::allowed_in(mode)
            .iter()
            .copied()
            .filter(|flash| supported.contains(flash))
            .collect()
    }

    pub fn zoom_bounds(&self) -> ZoomBounds {
        self.zoom_bounds
    }

    /// Breakpoints sorted by approximate ratio, always containing `(1.0, 1.0)`.
    pub fn zoom_breakpoints(&self) -> &[ZoomBreakpoint] {
        &self.zoom_breakpoints
    }

    pub fn intrinsic_zoom_ratio(&self) -> f32 {
        self.intrinsic_zoom_ratio
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Device {}

impl Hash for Device {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Sort by approximate ratio, keep the first occurrence of each approximate
/// ratio and make sure the identity breakpoint is present.
fn normalize_breakpoints(mut breakpoints: Vec<ZoomBreakpoint>) -> Vec<ZoomBreakpoint> {
    breakpoints.retain(|b| b.approximate.is_finite() && b.exact.is_finite());
    if !breakpoints.iter().any(|b| b.approximate == 1.0) {
        breakpoints.push(ZoomBreakpoint::IDENTITY);
    }
    // stable sort keeps configuration order for equal keys, the last one wins
    breakpoints.sort_by(|a, b| a.approximate.total_cmp(&b.approximate));
    let mut normalized: Vec<ZoomBreakpoint> = Vec::with_capacity(breakpoints.len());
    for breakpoint in breakpoints {
        match normalized.last_mut() {
            Some(last) if last.approximate == breakpoint.approximate => *last = breakpoint,
            _ => normalized.push(breakpoint),
        }
    }
    normalized
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn parts(id: &str, facing: CameraFacing) -> DeviceParts {
        DeviceParts {
            raw: RawDeviceInfo::new(id, facing),
            video_capabilities: BTreeMap::new(),
            extension_modes: BTreeSet::new(),
            zoom_bounds: ZoomBounds::default(),
            zoom_breakpoints: Vec::new(),
            intrinsic_zoom_ratio: 1.0,
        }
    }

    #[test]
    fn test_equality_by_id() {
        let mut a = parts("0", CameraFacing::Back);
        a.raw.has_flash_unit = true;
        let b = parts("0", CameraFacing::Front);
        assert_eq!(Device::new(a), Device::new(b));
    }

    #[test]
    fn test_always_offers_off_and_none() {
        let device = Device::new(parts("0", CameraFacing::Back));
        assert!(device.supports_stabilization_mode(StabilizationMode::Off));
        assert!(device.supports_extension_mode(ExtensionMode::None));
        assert!(!device.supports_video_recording());
        assert!(device.supports_camera_mode(CameraMode::Photo));
        assert!(!device.supports_camera_mode(CameraMode::Video));
    }

    #[test]
    fn test_logical_needs_two_sensors() {
        let mut single = parts("0", CameraFacing::Back);
        single.raw.physical_camera_ids = vec!["2".to_string()];
        assert!(!Device::new(single).is_logical());

        let mut multi = parts("1", CameraFacing::Back);
        multi.raw.physical_camera_ids = vec!["2".to_string(), "3".to_string()];
        assert!(Device::new(multi).is_logical());
    }

    #[test]
    fn test_breakpoints_normalized() {
        let mut p = parts("0", CameraFacing::Back);
        p.raw.physical_camera_ids = vec!["2".to_string(), "3".to_string()];
        p.zoom_breakpoints = vec![
            ZoomBreakpoint::new(5.0, 4.6),
            ZoomBreakpoint::new(2.0, 1.8),
            ZoomBreakpoint::new(2.0, 1.9),
        ];
        let device = Device::new(p);
        // later configuration entries override earlier ones
        assert_eq!(
            device.zoom_breakpoints(),
            &[
                ZoomBreakpoint::IDENTITY,
                ZoomBreakpoint::new(2.0, 1.9),
                ZoomBreakpoint::new(5.0, 4.6)
            ]
        );
    }

    #[test]
    fn test_breakpoints_dropped_for_single_sensor() {
        let mut p = parts("0", CameraFacing::Back);
        p.zoom_breakpoints = vec![ZoomBreakpoint::new(2.0, 1.8)];
        let device = Device::new(p);
        assert!(!device.is_logical());
        assert_eq!(device.zoom_breakpoints(), &[ZoomBreakpoint::IDENTITY]);
    }

    #[test]
    fn test_flash_modes() {
        let mut back = parts("0", CameraFacing::Back);
        back.raw.has_flash_unit = true;
        let back = Device::new(back);
        assert_eq!(
            back.flash_modes_for(CameraMode::Video),
            vec![FlashMode::Off, FlashMode::Torch]
        );

        let front = Device::new(parts("1", CameraFacing::Front));
        assert_eq!(
            front.flash_modes_for(CameraMode::Photo),
            vec![FlashMode::Off, FlashMode::Screen]
        );
        assert_eq!(front.flash_modes_for(CameraMode::Video), vec![FlashMode::Off]);
    }

    #[test]
    fn test_mm35_focal_length() {
        let mut raw = RawDeviceInfo::new("0", CameraFacing::Back);
        raw.focal_lengths = vec![4.0];
        raw.sensor_width_mm = Some(6.0);
        assert_eq!(raw.mm35_focal_length(), Some(24.0));

        raw.sensor_width_mm = None;
        assert_eq!(raw.mm35_focal_length(), None);
    }

    #[test]
    fn test_zoom_bounds_clamp() {
        let bounds = ZoomBounds::new(8.0, 0.5);
        assert_eq!(bounds.min, 0.5);
        assert_eq!(bounds.clamp(10.0), 8.0);
        assert_eq!(bounds.clamp(f32::NAN), 0.5);
    }
}
