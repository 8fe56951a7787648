//! Core value types shared by the catalog, negotiator and session

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction a lens points, as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    Unknown,
    Front,
    Back,
    External,
}

impl CameraFacing {
    pub fn camera_type(self) -> CameraType {
        match self {
            CameraFacing::External => CameraType::External,
            _ => CameraType::Internal,
        }
    }
}

/// Whether a camera is bundled with the device or hot-pluggable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraType {
    Internal,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraMode {
    Photo,
    Video,
    Qr,
}

impl CameraMode {
    pub const ALL: [CameraMode; 3] = [CameraMode::Photo, CameraMode::Video, CameraMode::Qr];
}

/// Video quality. The declaration order is the fallback priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Sd,
    Hd,
    Fhd,
    Uhd,
}

impl Quality {
    pub const ALL: [Quality; 4] = [Quality::Sd, Quality::Hd, Quality::Fhd, Quality::Uhd];

    pub fn parse(value: &str) -> Option<Quality> {
        match value.to_ascii_lowercase().as_str() {
            "sd" => Some(Quality::Sd),
            "hd" => Some(Quality::Hd),
            "fhd" => Some(Quality::Fhd),
            "uhd" => Some(Quality::Uhd),
            _ => None,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Quality::Sd => "SD",
            Quality::Hd => "HD",
            Quality::Fhd => "FHD",
            Quality::Uhd => "UHD",
        };
        write!(f, "{}", s)
    }
}

/// Video frame rate in frames per second.
///
/// Platforms only report the fixed rates in [`FrameRate::KNOWN`], but user
/// requests may carry any value and are resolved against the supported set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameRate(pub u32);

impl FrameRate {
    pub const FPS_24: FrameRate = FrameRate(24);
    pub const FPS_30: FrameRate = FrameRate(30);
    pub const FPS_60: FrameRate = FrameRate(60);
    pub const FPS_120: FrameRate = FrameRate(120);

    pub const KNOWN: [FrameRate; 4] = [
        FrameRate::FPS_24,
        FrameRate::FPS_30,
        FrameRate::FPS_60,
        FrameRate::FPS_120,
    ];

    pub fn value(self) -> u32 {
        self.0
    }

    /// Map a reported value to a known rate.
    pub fn from_value(value: u32) -> Option<FrameRate> {
        Self::KNOWN.into_iter().find(|rate| rate.0 == value)
    }

    /// Only fixed ranges (`lower == upper`) describe a selectable frame rate.
    pub fn from_range(lower: u32, upper: u32) -> Option<FrameRate> {
        if lower == upper {
            Self::from_value(upper)
        } else {
            None
        }
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} fps", self.0)
    }
}

/// Video dynamic range. Declaration order is the enumeration order used for fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynamicRange {
    Sdr,
    Hlg10Bit,
    Hdr10_10Bit,
    Hdr10Plus10Bit,
    DolbyVision10Bit,
    DolbyVision8Bit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StabilizationMode {
    Off,
    Digital,
    Optical,
    Hybrid,
}

/// Vendor post-processing pipeline selectable for photo capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionMode {
    None,
    Bokeh,
    Hdr,
    Night,
    FaceRetouch,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashMode {
    /// Flash will not be fired.
    Off,
    /// Flash will be fired automatically when required.
    Auto,
    /// Flash will always be fired during snapshot.
    On,
    /// Constant emission of light during preview, focus and snapshot.
    Torch,
    /// Display brightness used as flash substitute on front cameras.
    Screen,
}

impl FlashMode {
    pub const PHOTO_ALLOWED: [FlashMode; 5] = [
        FlashMode::Off,
        FlashMode::Auto,
        FlashMode::On,
        FlashMode::Torch,
        FlashMode::Screen,
    ];

    pub const VIDEO_ALLOWED: [FlashMode; 2] = [FlashMode::Off, FlashMode::Torch];

    /// Modes usable in the given camera mode, before device support is considered.
    pub fn allowed_in(mode: CameraMode) -> &'static [FlashMode] {
        match mode {
            CameraMode::Photo => &Self::PHOTO_ALLOWED,
            CameraMode::Video | CameraMode::Qr => &Self::VIDEO_ALLOWED,
        }
    }
}

/// Capture lifecycle state owned by the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CaptureState {
    #[default]
    Idle,
    TakingPhoto,
    PreRecordingVideo,
    RecordingVideo,
    RecordingVideoPaused,
}

impl CaptureState {
    pub fn is_recording_video(self) -> bool {
        matches!(
            self,
            CaptureState::RecordingVideo | CaptureState::RecordingVideoPaused
        )
    }
}
