//! Capability negotiation
//!
//! Every resolve function is pure and total: an unsupported request is
//! never an error, it falls back to the nearest legal value. [`resolve`]
//! re-validates the whole configuration tuple, because changing one axis
//! (most often the device) can invalidate all the others at once.
//!
//! [`resolve`]: CapabilityNegotiator::resolve

use crate::catalog::DeviceCatalog;
use crate::check_invariant;
use crate::device::Device;
use crate::types::{
    CameraFacing, CameraMode, DynamicRange, ExtensionMode, FlashMode, FrameRate, Quality,
    StabilizationMode,
};
use serde::{Deserialize, Serialize};

/// What the user (or the store) asked for. Any field may be unsupported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigurationRequest {
    pub device_id: Option<String>,
    pub facing: CameraFacing,
    pub mode: CameraMode,
    pub quality: Option<Quality>,
    pub frame_rate: Option<FrameRate>,
    pub dynamic_range: Option<DynamicRange>,
    pub zoom_ratio: f32,
    pub flash_mode: FlashMode,
    pub extension_mode: ExtensionMode,
    pub stabilization_mode: StabilizationMode,
}

impl Default for ConfigurationRequest {
    fn default() -> Self {
        Self {
            device_id: None,
            facing: CameraFacing::Back,
            mode: CameraMode::Photo,
            quality: None,
            frame_rate: None,
            dynamic_range: None,
            zoom_ratio: 1.0,
            flash_mode: FlashMode::Auto,
            extension_mode: ExtensionMode::None,
            stabilization_mode: StabilizationMode::Off,
        }
    }
}

/// A configuration the selected device can actually deliver.
///
/// The video axes are `None` when the device cannot record video at all.
/// `frame_rate` is also `None` when the platform picks the rate.
#[derive(Debug, Clone, Serialize)]
pub struct SelectedConfiguration {
    pub device: Device,
    pub mode: CameraMode,
    pub quality: Option<Quality>,
    pub frame_rate: Option<FrameRate>,
    pub dynamic_range: Option<DynamicRange>,
    pub zoom_ratio: f32,
    pub flash_mode: FlashMode,
    pub extension_mode: ExtensionMode,
    pub stabilization_mode: StabilizationMode,
}

impl SelectedConfiguration {
    pub fn to_request(&self) -> ConfigurationRequest {
        ConfigurationRequest {
            device_id: Some(self.device.id().to_string()),
            facing: self.device.facing(),
            mode: self.mode,
            quality: self.quality,
            frame_rate: self.frame_rate,
            dynamic_range: self.dynamic_range,
            zoom_ratio: self.zoom_ratio,
            flash_mode: self.flash_mode,
            extension_mode: self.extension_mode,
            stabilization_mode: self.stabilization_mode,
        }
    }
}

/// Quality used when the request leaves it open.
pub const DEFAULT_QUALITY: Quality = Quality::Fhd;

pub struct CapabilityNegotiator;

impl CapabilityNegotiator {
    /// Keep `requested` if supported, else the first supported quality in
    /// the fixed `[SD, HD, FHD, UHD]` order. `None` when the device has no
    /// video support.
    pub fn resolve_quality(device: &Device, requested: Quality) -> Option<Quality> {
        if device.video_capability(requested).is_some() {
            return Some(requested);
        }
        let fallback = Quality::ALL
            .into_iter()
            .find(|q| device.video_capability(*q).is_some());
        if let Some(fallback) = fallback {
            log::debug!(
                "Quality {} unsupported on camera {}, using {}",
                requested,
                device.id(),
                fallback
            );
        }
        fallback
    }

    /// Highest supported rate not above `requested`, otherwise the lowest
    /// supported rate above it. `None` requests stay automatic.
    pub fn resolve_frame_rate(
        device: &Device,
        quality: Quality,
        requested: Option<FrameRate>,
    ) -> Option<FrameRate> {
        let requested = requested?;
        let rates = &device.video_capability(quality)?.frame_rates;

        let resolved = rates
            .range(..=requested)
            .next_back()
            .or_else(|| rates.range(requested..).next())
            .copied();

        if resolved != Some(requested) {
            log::debug!(
                "Frame rate {} unsupported on camera {} at {}, using {:?}",
                requested,
                device.id(),
                quality,
                resolved
            );
        }
        resolved
    }

    /// Keep `requested` if supported, else the first supported dynamic range
    /// in enumeration order.
    pub fn resolve_dynamic_range(
        device: &Device,
        quality: Quality,
        requested: DynamicRange,
    ) -> Option<DynamicRange> {
        let ranges = &device.video_capability(quality)?.dynamic_ranges;
        if ranges.contains(&requested) {
            return Some(requested);
        }
        let fallback = ranges.iter().next().copied();
        log::debug!(
            "Dynamic range {:?} unsupported on camera {} at {}, using {:?}",
            requested,
            device.id(),
            quality,
            fallback
        );
        fallback
    }

    /// Extensions only apply to photo capture.
    pub fn resolve_extension_mode(
        device: &Device,
        mode: CameraMode,
        requested: ExtensionMode,
    ) -> ExtensionMode {
        if mode == CameraMode::Photo && device.supports_extension_mode(requested) {
            return requested;
        }
        if requested != ExtensionMode::None {
            log::debug!(
                "Extension {:?} unavailable on camera {} in {:?} mode",
                requested,
                device.id(),
                mode
            );
        }
        ExtensionMode::None
    }

    /// Degrade towards `Off`, never to a stronger mode than requested.
    pub fn resolve_stabilization_mode(
        requested: StabilizationMode,
        device: &Device,
        mode: CameraMode,
    ) -> StabilizationMode {
        if device.supports_stabilization_mode(requested) {
            return requested;
        }

        let digital = device.supports_stabilization_mode(StabilizationMode::Digital);
        let resolved = match requested {
            StabilizationMode::Hybrid if digital => StabilizationMode::Digital,
            StabilizationMode::Optical if digital && mode == CameraMode::Video => {
                StabilizationMode::Digital
            }
            _ => StabilizationMode::Off,
        };

        log::debug!(
            "Stabilization {:?} unsupported on camera {}, using {:?}",
            requested,
            device.id(),
            resolved
        );
        resolved
    }

    /// Keep `requested` if the device offers it in `mode`, else `Off`.
    pub fn resolve_flash_mode(device: &Device, mode: CameraMode, requested: FlashMode) -> FlashMode {
        if device.flash_modes_for(mode).contains(&requested) {
            requested
        } else {
            log::debug!(
                "Flash {:?} unavailable on camera {} in {:?} mode",
                requested,
                device.id(),
                mode
            );
            FlashMode::Off
        }
    }

    /// Pick the device for a request.
    ///
    /// The requested device wins when it exists and supports the mode. QR
    /// scanning goes to the back main camera. Otherwise the facing's main
    /// camera, or the first camera in cycling order that supports the mode.
    pub fn resolve_device<'a>(
        catalog: &'a DeviceCatalog,
        request: &ConfigurationRequest,
    ) -> Option<&'a Device> {
        let requested = request
            .device_id
            .as_deref()
            .and_then(|id| catalog.device(id));

        if let Some(device) = requested {
            if request.mode != CameraMode::Qr && device.supports_camera_mode(request.mode) {
                return Some(device);
            }
        }

        let facing = match (request.mode, requested) {
            (CameraMode::Qr, _) => CameraFacing::Back,
            (_, Some(device)) => device.facing(),
            (_, None) => request.facing,
        };
        let resolved = catalog.camera_of_facing_or_first_available(facing, request.mode);

        if let Some(device) = resolved {
            if request.device_id.as_deref() != Some(device.id()) {
                log::debug!(
                    "Requested camera {:?} unavailable for {:?} mode, using {}",
                    request.device_id,
                    request.mode,
                    device.id()
                );
            }
        }
        resolved
    }

    /// Resolve a full configuration.
    ///
    /// When no camera supports the requested mode (video with no recording
    /// capable camera) the mode degrades to photo. `None` only when the
    /// catalog has no usable camera.
    ///
    /// `zoomed_device` is the camera the request's zoom ratio was set on.
    /// Any other resolved camera starts unzoomed.
    pub fn resolve(
        catalog: &DeviceCatalog,
        request: &ConfigurationRequest,
        zoomed_device: Option<&str>,
    ) -> Option<SelectedConfiguration> {
        let (device, mode) = match Self::resolve_device(catalog, request) {
            Some(device) => (device, request.mode),
            None => {
                let fallback = ConfigurationRequest {
                    mode: CameraMode::Photo,
                    ..request.clone()
                };
                let device = Self::resolve_device(catalog, &fallback)?;
                log::debug!("{:?} mode unavailable, falling back to photo", request.mode);
                (device, CameraMode::Photo)
            }
        };

        let quality =
            Self::resolve_quality(device, request.quality.unwrap_or(DEFAULT_QUALITY));
        let frame_rate =
            quality.and_then(|q| Self::resolve_frame_rate(device, q, request.frame_rate));
        let dynamic_range = quality.and_then(|q| {
            Self::resolve_dynamic_range(
                device,
                q,
                request.dynamic_range.unwrap_or(DynamicRange::Sdr),
            )
        });

        let zoom_ratio = if zoomed_device != Some(device.id()) {
            device.zoom_bounds().clamp(1.0)
        } else {
            device.zoom_bounds().clamp(request.zoom_ratio)
        };

        let selected = SelectedConfiguration {
            device: device.clone(),
            mode,
            quality,
            frame_rate,
            dynamic_range,
            zoom_ratio,
            flash_mode: Self::resolve_flash_mode(device, mode, request.flash_mode),
            extension_mode: Self::resolve_extension_mode(device, mode, request.extension_mode),
            stabilization_mode: Self::resolve_stabilization_mode(
                request.stabilization_mode,
                device,
                mode,
            ),
        };

        verify(&selected);
        Some(selected)
    }
}

fn verify(selected: &SelectedConfiguration) {
    const CONTEXT: &str = "negotiation::resolve";
    let device = &selected.device;

    check_invariant!(
        device.supports_camera_mode(selected.mode),
        "Selected device supports the selected mode",
        CONTEXT
    );

    let capability = selected.quality.and_then(|q| device.video_capability(q));
    check_invariant!(
        selected.mode != CameraMode::Video || capability.is_some(),
        "Video mode has a supported quality",
        CONTEXT
    );
    check_invariant!(
        match (selected.frame_rate, capability) {
            (Some(rate), Some(capability)) => capability.frame_rates.contains(&rate),
            (Some(_), None) => false,
            (None, _) => true,
        },
        "Frame rate is supported at the selected quality",
        CONTEXT
    );
    check_invariant!(
        match capability {
            Some(capability) => selected
                .dynamic_range
                .is_some_and(|dr| capability.dynamic_ranges.contains(&dr)),
            None => selected.dynamic_range.is_none(),
        },
        "Dynamic range is supported at the selected quality",
        CONTEXT
    );
    check_invariant!(
        device.flash_modes_for(selected.mode).contains(&selected.flash_mode),
        "Flash mode is offered in the selected mode",
        CONTEXT
    );
    check_invariant!(
        device.zoom_bounds().clamp(selected.zoom_ratio) == selected.zoom_ratio,
        "Zoom ratio lies within the device bounds",
        CONTEXT
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LensgateConfig;
    use crate::device::tests::parts;
    use crate::device::VideoCapability;
    use crate::invariants::{clear_invariant_log, contract_test};
    use crate::platform::{DeviceProfile, ProfileProvider};
    use std::sync::Arc;

    fn video_device(qualities: &[(Quality, &[u32], &[DynamicRange])]) -> Device {
        let mut parts = parts("0", CameraFacing::Back);
        for (quality, rates, ranges) in qualities {
            parts.video_capabilities.insert(
                *quality,
                VideoCapability::new(
                    rates.iter().copied().map(FrameRate),
                    ranges.iter().copied(),
                ),
            );
        }
        Device::new(parts)
    }

    fn catalog(profiles: Vec<DeviceProfile>) -> DeviceCatalog {
        DeviceCatalog::build(
            Arc::new(ProfileProvider::new(profiles)),
            LensgateConfig::default(),
        )
    }

    #[test]
    fn test_quality_fixed_order_fallback() {
        let device = video_device(&[
            (Quality::Hd, &[30], &[DynamicRange::Sdr]),
            (Quality::Uhd, &[30], &[DynamicRange::Sdr]),
        ]);
        assert_eq!(
            CapabilityNegotiator::resolve_quality(&device, Quality::Uhd),
            Some(Quality::Uhd)
        );
        // FHD is closer to UHD, but the fixed order wins
        assert_eq!(
            CapabilityNegotiator::resolve_quality(&device, Quality::Fhd),
            Some(Quality::Hd)
        );
        let photo_only = Device::new(parts("1", CameraFacing::Front));
        assert_eq!(
            CapabilityNegotiator::resolve_quality(&photo_only, Quality::Fhd),
            None
        );
    }

    #[test]
    fn test_frame_rate_prefers_lower_or_equal() {
        let device = video_device(&[(Quality::Fhd, &[24, 30, 60], &[DynamicRange::Sdr])]);
        let resolve = |fps| {
            CapabilityNegotiator::resolve_frame_rate(&device, Quality::Fhd, Some(FrameRate(fps)))
        };
        assert_eq!(resolve(45), Some(FrameRate::FPS_30));
        assert_eq!(resolve(60), Some(FrameRate::FPS_60));
        assert_eq!(resolve(120), Some(FrameRate::FPS_60));
        assert_eq!(resolve(10), Some(FrameRate::FPS_24));
        assert_eq!(
            CapabilityNegotiator::resolve_frame_rate(&device, Quality::Fhd, None),
            None
        );
        assert_eq!(
            CapabilityNegotiator::resolve_frame_rate(&device, Quality::Uhd, Some(FrameRate(30))),
            None
        );
    }

    #[test]
    fn test_dynamic_range_first_in_enumeration_order() {
        let device = video_device(&[(
            Quality::Fhd,
            &[30],
            &[DynamicRange::DolbyVision8Bit, DynamicRange::Hlg10Bit],
        )]);
        assert_eq!(
            CapabilityNegotiator::resolve_dynamic_range(
                &device,
                Quality::Fhd,
                DynamicRange::DolbyVision8Bit
            ),
            Some(DynamicRange::DolbyVision8Bit)
        );
        assert_eq!(
            CapabilityNegotiator::resolve_dynamic_range(&device, Quality::Fhd, DynamicRange::Sdr),
            Some(DynamicRange::Hlg10Bit)
        );
    }

    #[test]
    fn test_extension_only_in_photo_mode() {
        let mut parts = parts("0", CameraFacing::Back);
        parts.extension_modes.insert(ExtensionMode::Night);
        let device = Device::new(parts);

        assert_eq!(
            CapabilityNegotiator::resolve_extension_mode(
                &device,
                CameraMode::Photo,
                ExtensionMode::Night
            ),
            ExtensionMode::Night
        );
        assert_eq!(
            CapabilityNegotiator::resolve_extension_mode(
                &device,
                CameraMode::Video,
                ExtensionMode::Night
            ),
            ExtensionMode::None
        );
        assert_eq!(
            CapabilityNegotiator::resolve_extension_mode(
                &device,
                CameraMode::Photo,
                ExtensionMode::Bokeh
            ),
            ExtensionMode::None
        );
    }

    #[test]
    fn test_stabilization_degradation() {
        let mut digital = parts("0", CameraFacing::Back);
        digital.raw.stabilization_modes.insert(StabilizationMode::Digital);
        let digital = Device::new(digital);
        let none = Device::new(parts("1", CameraFacing::Back));

        let resolve = CapabilityNegotiator::resolve_stabilization_mode;
        assert_eq!(
            resolve(StabilizationMode::Hybrid, &digital, CameraMode::Photo),
            StabilizationMode::Digital
        );
        assert_eq!(
            resolve(StabilizationMode::Optical, &digital, CameraMode::Video),
            StabilizationMode::Digital
        );
        assert_eq!(
            resolve(StabilizationMode::Optical, &digital, CameraMode::Photo),
            StabilizationMode::Off
        );
        assert_eq!(
            resolve(StabilizationMode::Hybrid, &none, CameraMode::Video),
            StabilizationMode::Off
        );
        assert_eq!(
            resolve(StabilizationMode::Off, &digital, CameraMode::Video),
            StabilizationMode::Off
        );
    }

    #[test]
    fn test_flash_fallback() {
        let front = Device::new(parts("1", CameraFacing::Front));
        assert_eq!(
            CapabilityNegotiator::resolve_flash_mode(&front, CameraMode::Photo, FlashMode::Screen),
            FlashMode::Screen
        );
        assert_eq!(
            CapabilityNegotiator::resolve_flash_mode(&front, CameraMode::Video, FlashMode::Screen),
            FlashMode::Off
        );
        let mut back = parts("0", CameraFacing::Back);
        back.raw.has_flash_unit = true;
        let back = Device::new(back);
        assert_eq!(
            CapabilityNegotiator::resolve_flash_mode(&back, CameraMode::Video, FlashMode::Auto),
            FlashMode::Off
        );
        assert_eq!(
            CapabilityNegotiator::resolve_flash_mode(&back, CameraMode::Video, FlashMode::Torch),
            FlashMode::Torch
        );
    }

    #[test]
    fn test_resolve_revalidates_whole_tuple_on_device_change() {
        let catalog = catalog(vec![
            DeviceProfile::new("0", CameraFacing::Back)
                .with_video(Quality::Uhd, &[30, 60], &[DynamicRange::Sdr, DynamicRange::Hlg10Bit])
                .with_zoom_bounds(1.0, 10.0),
            DeviceProfile::new("1", CameraFacing::Front)
                .with_video(Quality::Hd, &[24, 30], &[DynamicRange::Sdr])
                .with_zoom_bounds(1.0, 2.0),
        ]);
        let request = ConfigurationRequest {
            device_id: Some("0".to_string()),
            mode: CameraMode::Video,
            quality: Some(Quality::Uhd),
            frame_rate: Some(FrameRate::FPS_60),
            dynamic_range: Some(DynamicRange::Hlg10Bit),
            zoom_ratio: 5.0,
            ..ConfigurationRequest::default()
        };
        let on_back = CapabilityNegotiator::resolve(&catalog, &request, Some("0")).unwrap();
        assert_eq!(on_back.quality, Some(Quality::Uhd));
        assert_eq!(on_back.frame_rate, Some(FrameRate::FPS_60));
        assert_eq!(on_back.zoom_ratio, 5.0);

        let switched = ConfigurationRequest {
            device_id: Some("1".to_string()),
            ..on_back.to_request()
        };
        let on_front =
            CapabilityNegotiator::resolve(&catalog, &switched, Some(on_back.device.id())).unwrap();
        assert_eq!(on_front.device.id(), "1");
        assert_eq!(on_front.quality, Some(Quality::Hd));
        assert_eq!(on_front.frame_rate, Some(FrameRate::FPS_30));
        assert_eq!(on_front.dynamic_range, Some(DynamicRange::Sdr));
        assert_eq!(on_front.zoom_ratio, 1.0);
    }

    #[test]
    fn test_qr_mode_uses_back_camera() {
        let catalog = catalog(vec![
            DeviceProfile::new("0", CameraFacing::Back),
            DeviceProfile::new("1", CameraFacing::Front),
        ]);
        let request = ConfigurationRequest {
            device_id: Some("1".to_string()),
            facing: CameraFacing::Front,
            mode: CameraMode::Qr,
            ..ConfigurationRequest::default()
        };
        let selected =
            CapabilityNegotiator::resolve(&catalog, &request, request.device_id.as_deref()).unwrap();
        assert_eq!(selected.device.id(), "0");
        assert_eq!(selected.zoom_ratio, 1.0);
    }

    #[test]
    fn test_video_without_capable_camera_falls_back_to_photo() {
        let catalog = catalog(vec![DeviceProfile::new("0", CameraFacing::Back)]);
        let request = ConfigurationRequest {
            mode: CameraMode::Video,
            ..ConfigurationRequest::default()
        };
        let selected =
            CapabilityNegotiator::resolve(&catalog, &request, request.device_id.as_deref()).unwrap();
        assert_eq!(selected.mode, CameraMode::Photo);
        assert_eq!(selected.quality, None);
        assert_eq!(selected.dynamic_range, None);
    }

    #[test]
    fn test_empty_catalog_resolves_nothing() {
        let catalog = catalog(Vec::new());
        assert!(
            CapabilityNegotiator::resolve(&catalog, &ConfigurationRequest::default(), None).is_none()
        );
    }

    #[test]
    fn contract_resolve_checks_invariants() {
        clear_invariant_log();
        let catalog = catalog(vec![DeviceProfile::new("0", CameraFacing::Back)
            .with_video(Quality::Fhd, &[30], &[])]);
        CapabilityNegotiator::resolve(&catalog, &ConfigurationRequest::default(), None).unwrap();
        contract_test(
            "negotiation",
            &[
                "Selected device supports the selected mode",
                "Video mode has a supported quality",
                "Frame rate is supported at the selected quality",
                "Dynamic range is supported at the selected quality",
                "Flash mode is offered in the selected mode",
                "Zoom ratio lies within the device bounds",
            ],
        );
    }
}
