//! Camera session controller
//!
//! [`CameraSession`] is the single owner of the selected configuration and
//! the capture state. Every mutation goes through it: configuration changes
//! are negotiated against the catalog and gated on the state machine, and
//! sink callbacks are drained from a channel on the owner's context.

pub mod events;
pub mod state_machine;

pub use events::{CaptureStats, SessionEvent, SessionNotice};
pub use state_machine::CaptureStateMachine;

use crate::catalog::DeviceCatalog;
use crate::config::{CaptureConfig, StorageConfig};
use crate::cyclic::{cyclic_step, Direction};
use crate::errors::{CameraError, CaptureError};
use crate::negotiation::{CapabilityNegotiator, ConfigurationRequest, SelectedConfiguration};
use crate::platform::{AudioConfig, CaptureSink, ConfigurationStore, DeviceEvent, OutputTarget};
use crate::types::{
    CameraMode, CaptureState, DynamicRange, ExtensionMode, FlashMode, FrameRate, Quality,
    StabilizationMode,
};
use crate::zoom::{LensOptions, ZoomGate, ZoomGuard, ZoomRatioMapper};
use chrono::Local;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;

pub struct CameraSession {
    catalog: DeviceCatalog,
    selected: SelectedConfiguration,
    machine: CaptureStateMachine,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    sink: Box<dyn CaptureSink>,
    store: Box<dyn ConfigurationStore>,
    zoom_gate: ZoomGate,
    capture_config: CaptureConfig,
    storage_config: StorageConfig,
}

impl CameraSession {
    /// Start a session from the last stored configuration.
    pub fn new(
        catalog: DeviceCatalog,
        sink: Box<dyn CaptureSink>,
        mut store: Box<dyn ConfigurationStore>,
    ) -> Result<Self, CameraError> {
        let capture_config = catalog.config().capture.clone();
        let storage_config = catalog.config().storage.clone();

        let mut request = store.load();
        if request.device_id.is_none() {
            request.flash_mode = capture_config.default_flash_mode;
        }

        let selected =
            CapabilityNegotiator::resolve(&catalog, &request, request.device_id.as_deref())
                .ok_or(CameraError::NoCameraAvailable)?;
        store.save(&selected.to_request());
        log::info!(
            "Camera session started on {} in {:?} mode",
            selected.device.id(),
            selected.mode
        );

        let (tx, rx) = mpsc::unbounded_channel();
        Ok(Self {
            catalog,
            selected,
            machine: CaptureStateMachine::new(tx),
            events: rx,
            sink,
            store,
            zoom_gate: ZoomGate::new(),
            capture_config,
            storage_config,
        })
    }

    pub fn selected(&self) -> &SelectedConfiguration {
        &self.selected
    }

    pub fn catalog(&self) -> &DeviceCatalog {
        &self.catalog
    }

    pub fn state(&self) -> CaptureState {
        self.machine.state()
    }

    pub fn stats(&self) -> CaptureStats {
        self.machine.stats()
    }

    pub fn can_reconfigure(&self) -> bool {
        self.machine.can_reconfigure()
    }

    pub fn recorded_duration(&self) -> Option<Duration> {
        self.machine.recorded_duration()
    }

    pub fn zoom_gate(&self) -> ZoomGate {
        self.zoom_gate.clone()
    }

    pub fn lens_options(&self) -> LensOptions {
        LensOptions::for_device(&self.catalog, &self.selected.device)
    }

    // Configuration

    pub fn select_device(&mut self, device_id: &str) -> bool {
        let device_id = device_id.to_string();
        self.reconfigure(|r| r.device_id = Some(device_id))
    }

    /// Switch to the next camera in cycling order.
    ///
    /// `false` when the camera stays the same: QR scanning is pinned to the
    /// back camera, and a single usable camera has nowhere to go.
    pub fn flip_camera(&mut self) -> bool {
        if !self.guard_reconfigure("flip camera") {
            return false;
        }
        if self.selected.mode == CameraMode::Qr {
            log::debug!("Ignoring flip camera in QR mode");
            return false;
        }
        let current = self.selected.device.id().to_string();
        let next = self
            .catalog
            .cycle_next(&self.selected.device, self.selected.mode)
            .map(|d| d.id().to_string());
        match next {
            Some(id) if id != current => self.reconfigure(|r| r.device_id = Some(id)),
            _ => false,
        }
    }

    pub fn set_mode(&mut self, mode: CameraMode) -> bool {
        self.reconfigure(|r| r.mode = mode)
    }

    pub fn set_quality(&mut self, quality: Quality) -> bool {
        self.reconfigure(|r| r.quality = Some(quality))
    }

    pub fn set_frame_rate(&mut self, frame_rate: Option<FrameRate>) -> bool {
        self.reconfigure(|r| r.frame_rate = frame_rate)
    }

    pub fn set_dynamic_range(&mut self, dynamic_range: DynamicRange) -> bool {
        self.reconfigure(|r| r.dynamic_range = Some(dynamic_range))
    }

    pub fn set_extension_mode(&mut self, extension_mode: ExtensionMode) -> bool {
        self.reconfigure(|r| r.extension_mode = extension_mode)
    }

    pub fn set_stabilization_mode(&mut self, stabilization_mode: StabilizationMode) -> bool {
        self.reconfigure(|r| r.stabilization_mode = stabilization_mode)
    }

    /// Step to the next video quality the camera supports.
    pub fn cycle_quality(&mut self) -> bool {
        let qualities: Vec<Quality> = self.selected.device.supported_qualities().collect();
        let current = match self.selected.quality {
            Some(quality) => quality,
            None => return false,
        };
        match cyclic_step(&qualities, &current, Direction::Next) {
            Some(next) if next != current => self.set_quality(next),
            _ => false,
        }
    }

    /// Step through automatic frame rate followed by every rate supported at
    /// the current quality.
    pub fn cycle_frame_rate(&mut self) -> bool {
        let Some(capability) = self
            .selected
            .quality
            .and_then(|q| self.selected.device.video_capability(q))
        else {
            return false;
        };
        let rates: Vec<Option<FrameRate>> = std::iter::once(None)
            .chain(capability.frame_rates.iter().copied().map(Some))
            .collect();
        match cyclic_step(&rates, &self.selected.frame_rate, Direction::Next) {
            Some(next) if next != self.selected.frame_rate => self.set_frame_rate(next),
            _ => false,
        }
    }

    /// Step through the camera's photo extensions, `None` included.
    pub fn cycle_extension_mode(&mut self) -> bool {
        if self.selected.mode != CameraMode::Photo {
            return false;
        }
        let modes: Vec<ExtensionMode> =
            self.selected.device.extension_modes().iter().copied().collect();
        match cyclic_step(&modes, &self.selected.extension_mode, Direction::Next) {
            Some(next) if next != self.selected.extension_mode => self.set_extension_mode(next),
            _ => false,
        }
    }

    /// Flash may change mid-capture (torch toggling). Returns the mode in effect.
    pub fn set_flash_mode(&mut self, flash_mode: FlashMode) -> FlashMode {
        let resolved = CapabilityNegotiator::resolve_flash_mode(
            &self.selected.device,
            self.selected.mode,
            flash_mode,
        );
        self.selected.flash_mode = resolved;
        self.persist();
        resolved
    }

    pub fn cycle_flash_mode(&mut self) -> FlashMode {
        let modes = self.selected.device.flash_modes_for(self.selected.mode);
        let next = cyclic_step(&modes, &self.selected.flash_mode, Direction::Next)
            .unwrap_or(FlashMode::Off);
        self.set_flash_mode(next)
    }

    // Zoom

    /// Apply a user-facing zoom ratio. Returns the exact ratio in effect.
    pub fn set_zoom_ratio(&mut self, approximate: f32) -> f32 {
        let device = &self.selected.device;
        let exact = ZoomRatioMapper::exact_ratio_for(device, approximate);
        self.selected.zoom_ratio = device.zoom_bounds().clamp(exact);
        self.persist();
        self.selected.zoom_ratio
    }

    /// Zoom in one octave. `None` while another zoom animation holds the
    /// gate; otherwise the guard must live until the animation ends.
    pub fn zoom_in(&mut self) -> Option<ZoomGuard> {
        let guard = self.zoom_gate.try_acquire()?;
        self.selected.zoom_ratio =
            ZoomRatioMapper::zoom_in(&self.selected.device, self.selected.zoom_ratio);
        self.persist();
        Some(guard)
    }

    pub fn zoom_out(&mut self) -> Option<ZoomGuard> {
        let guard = self.zoom_gate.try_acquire()?;
        self.selected.zoom_ratio =
            ZoomRatioMapper::zoom_out(&self.selected.device, self.selected.zoom_ratio);
        self.persist();
        Some(guard)
    }

    /// Pick entry `index` of [`Self::lens_options`].
    pub fn select_lens(&mut self, index: usize) -> bool {
        if !self.guard_reconfigure("select lens") {
            return false;
        }
        match self.lens_options() {
            LensOptions::Breakpoints(breakpoints) => match breakpoints.get(index) {
                Some(breakpoint) => {
                    self.set_zoom_ratio(breakpoint.approximate);
                    true
                }
                None => false,
            },
            LensOptions::Cameras(ids) => match ids.get(index) {
                Some(id) => {
                    let id = id.clone();
                    self.select_device(&id)
                }
                None => false,
            },
        }
    }

    // Capture

    pub fn take_photo(&mut self) -> bool {
        if self.selected.mode != CameraMode::Photo {
            log::warn!("Ignoring photo request in {:?} mode", self.selected.mode);
            return false;
        }
        let target = self.output_target(CameraMode::Photo);
        self.machine.take_photo(self.sink.as_mut(), target)
    }

    pub fn start_recording(&mut self) -> Result<bool, CameraError> {
        if self.selected.mode != CameraMode::Video {
            log::warn!("Ignoring record request in {:?} mode", self.selected.mode);
            return Ok(false);
        }
        let target = self.output_target(CameraMode::Video);
        let audio = self.audio_config();
        self.machine
            .start_recording(self.sink.as_mut(), &self.selected.device, target, audio)
    }

    pub fn toggle_recording(&mut self) -> Result<bool, CameraError> {
        if self.selected.mode != CameraMode::Video {
            return Ok(false);
        }
        let target = self.output_target(CameraMode::Video);
        let audio = self.audio_config();
        self.machine
            .toggle_recording(self.sink.as_mut(), &self.selected.device, target, audio)
    }

    pub fn pause_recording(&mut self) -> bool {
        self.machine.pause()
    }

    pub fn resume_recording(&mut self) -> bool {
        self.machine.resume()
    }

    pub fn stop_recording(&mut self) -> bool {
        self.machine.stop_recording()
    }

    // Events

    /// Apply every queued sink event without waiting.
    pub fn process_pending_events(&mut self) -> Vec<SessionNotice> {
        let mut notices = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            notices.extend(self.machine.handle_event(event));
        }
        notices
    }

    /// Wait for sink events until one produces a notice.
    pub async fn next_notice(&mut self) -> Option<SessionNotice> {
        while let Some(event) = self.events.recv().await {
            if let Some(notice) = self.machine.handle_event(event) {
                return Some(notice);
            }
        }
        None
    }

    /// Apply an error raised outside any single capture.
    pub fn report_platform_error(&mut self, error: CaptureError) -> Option<SessionNotice> {
        self.machine.handle_event(SessionEvent::PlatformError(error))
    }

    /// Refresh external cameras after a hot-plug event.
    ///
    /// A session bound to a camera that vanished is forced idle and moved
    /// to the next available camera.
    pub fn handle_device_event(&mut self, event: &DeviceEvent) -> Vec<SessionNotice> {
        log::info!("Device event: {:?}", event);
        self.catalog.refresh_external();

        let current = self.selected.device.id().to_string();
        if self.catalog.device(&current).is_some() {
            return Vec::new();
        }

        let mut notices = Vec::new();
        if self.machine.state() != CaptureState::Idle {
            notices.extend(self.report_platform_error(CaptureError::disconnected(&current)));
        }

        let mut request = self.selected.to_request();
        request.device_id = self
            .catalog
            .cycle_next(&self.selected.device, self.selected.mode)
            .map(|d| d.id().to_string());

        match CapabilityNegotiator::resolve(&self.catalog, &request, Some(current.as_str())) {
            Some(selected) => {
                log::info!(
                    "Camera {} vanished, switching to {}",
                    current,
                    selected.device.id()
                );
                notices.push(SessionNotice::DeviceRedirected {
                    from: current,
                    to: selected.device.id().to_string(),
                });
                self.selected = selected;
                self.persist();
            }
            None => {
                log::error!("Camera {} vanished and no camera is left", current);
                notices.push(SessionNotice::Fatal(CaptureError::disconnected(&current)));
            }
        }
        notices
    }

    fn guard_reconfigure(&self, action: &str) -> bool {
        if self.machine.can_reconfigure() {
            true
        } else {
            log::warn!("Ignoring {} while in {:?}", action, self.machine.state());
            false
        }
    }

    fn reconfigure(&mut self, change: impl FnOnce(&mut ConfigurationRequest)) -> bool {
        if !self.guard_reconfigure("reconfiguration") {
            return false;
        }
        let mut request = self.selected.to_request();
        change(&mut request);

        let zoomed_device = self.selected.device.id();
        match CapabilityNegotiator::resolve(&self.catalog, &request, Some(zoomed_device)) {
            Some(selected) => {
                self.selected = selected;
                self.persist();
                true
            }
            None => false,
        }
    }

    fn persist(&mut self) {
        self.store.save(&self.selected.to_request());
    }

    fn audio_config(&self) -> AudioConfig {
        AudioConfig {
            enabled: self.capture_config.record_audio,
        }
    }

    fn output_target(&self, mode: CameraMode) -> OutputTarget {
        let (prefix, extension) = match mode {
            CameraMode::Video => (&self.storage_config.video_prefix, "mp4"),
            CameraMode::Photo | CameraMode::Qr => (&self.storage_config.photo_prefix, "jpg"),
        };
        let timestamp = Local::now().format("%Y%m%d_%H%M%S_%3f");
        OutputTarget::new(
            Path::new(&self.storage_config.output_directory)
                .join(format!("{}_{}.{}", prefix, timestamp, extension)),
        )
    }
}
