//! Testing utilities for lensgate
//!
//! A scriptable [`MockCaptureSink`] and device profiles modelled on real
//! phones, so sessions can be driven end to end without hardware.

pub mod mock;

pub use mock::{HandleCall, MockCaptureSink};

use crate::platform::{DeviceProfile, ProfileProvider};
use crate::types::{CameraFacing, DynamicRange, ExtensionMode, Quality, StabilizationMode};
use std::sync::Arc;

/// Back main with flash and HDR video, an ultrawide and a logical tele on
/// the back, and a photo-and-HD front camera.
pub fn sample_phone_profiles() -> Vec<DeviceProfile> {
    vec![
        DeviceProfile::new("0", CameraFacing::Back)
            .with_flash()
            .with_optics(4.38, 6.4)
            .with_zoom_bounds(1.0, 8.0)
            .with_stabilization(&[StabilizationMode::Digital, StabilizationMode::Optical])
            .with_extensions(&[ExtensionMode::Night, ExtensionMode::Hdr])
            .with_video(Quality::Hd, &[30, 60], &[DynamicRange::Sdr])
            .with_video(
                Quality::Fhd,
                &[24, 30, 60],
                &[DynamicRange::Sdr, DynamicRange::Hlg10Bit],
            )
            .with_video(Quality::Uhd, &[24, 30], &[DynamicRange::Sdr]),
        DeviceProfile::new("1", CameraFacing::Front)
            .with_optics(2.5, 4.0)
            .with_zoom_bounds(1.0, 4.0)
            .with_video(Quality::Hd, &[30], &[DynamicRange::Sdr]),
        DeviceProfile::new("2", CameraFacing::Back)
            .with_optics(2.2, 6.4)
            .with_zoom_bounds(1.0, 2.0),
        DeviceProfile::new("3", CameraFacing::Back)
            .with_optics(13.14, 6.4)
            .with_physical_ids(&["4", "5"])
            .with_zoom_bounds(1.0, 10.0),
    ]
}

/// Back camera that records FHD and a front camera that only takes photos.
pub fn minimal_profiles() -> Vec<DeviceProfile> {
    vec![
        DeviceProfile::new("0", CameraFacing::Back).with_video(
            Quality::Fhd,
            &[30],
            &[DynamicRange::Sdr],
        ),
        DeviceProfile::new("1", CameraFacing::Front),
    ]
}

pub fn provider(profiles: Vec<DeviceProfile>) -> Arc<ProfileProvider> {
    Arc::new(ProfileProvider::new(profiles))
}
