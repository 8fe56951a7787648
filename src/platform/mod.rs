//! Collaborator interfaces consumed by the core
//!
//! The core never talks to camera hardware. It queries a
//! [`CapabilityProvider`], drives a [`CaptureSink`] and persists through a
//! [`ConfigurationStore`]; implementations live outside the crate except for
//! the profile-backed provider and the in-memory store.

pub mod device_monitor;
pub mod profile;
pub mod store;

pub use device_monitor::{DeviceEvent, DeviceMonitor};
pub use profile::{DeviceProfile, ProfileProvider, QualityProfile};
pub use store::MemoryConfigurationStore;

use crate::device::{RawDeviceInfo, VideoCapability, ZoomBounds};
use crate::errors::{CameraError, CaptureError};
use crate::negotiation::ConfigurationRequest;
use crate::types::{CameraFacing, ExtensionMode, Quality};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Read-only oracle describing the cameras present on the platform.
pub trait CapabilityProvider: Send + Sync {
    fn list_devices(&self) -> Result<Vec<RawDeviceInfo>, CameraError>;

    fn video_capabilities(
        &self,
        device_id: &str,
    ) -> Result<BTreeMap<Quality, VideoCapability>, CameraError>;

    fn zoom_bounds(&self, device_id: &str) -> Result<ZoomBounds, CameraError>;

    fn extension_support(
        &self,
        device_id: &str,
        facing: CameraFacing,
    ) -> Result<BTreeSet<ExtensionMode>, CameraError>;
}

/// Where a capture gets written.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputTarget {
    pub path: PathBuf,
}

impl OutputTarget {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioConfig {
    pub enabled: bool,
}

/// Events a recording reports while it runs.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordEvent {
    Start,
    Pause,
    Resume,
    Status { recorded: Duration },
    /// Terminal event. `error` is `None` when the output was saved.
    Finalize {
        output: OutputTarget,
        error: Option<CaptureError>,
    },
}

pub type PhotoCallback = Box<dyn FnOnce(Result<OutputTarget, CaptureError>) + Send>;
pub type RecordEventCallback = Arc<dyn Fn(RecordEvent) + Send + Sync>;

/// Executes captures. Completion is reported through the callbacks, possibly
/// from another thread, never synchronously required.
pub trait CaptureSink: Send {
    fn take_photo(&mut self, target: OutputTarget, on_result: PhotoCallback);

    fn start_recording(
        &mut self,
        target: OutputTarget,
        audio: AudioConfig,
        on_event: RecordEventCallback,
    ) -> Result<Box<dyn RecordingHandle>, CameraError>;

    fn supports_pause(&self) -> bool {
        true
    }
}

/// Control surface of a running recording.
pub trait RecordingHandle: Send {
    fn pause(&mut self);
    fn resume(&mut self);
    /// Requests finalization; the recording ends when the sink reports `Finalize`.
    fn stop(&mut self);
}

/// Persistence of the last used configuration.
pub trait ConfigurationStore: Send {
    fn load(&self) -> ConfigurationRequest;
    fn save(&mut self, request: &ConfigurationRequest);
}
