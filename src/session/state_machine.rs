//! Capture lifecycle
//!
//! ```text
//! Idle -> TakingPhoto -> Idle
//! Idle -> PreRecordingVideo -> RecordingVideo <-> RecordingVideoPaused -> Idle
//! ```
//!
//! Requests that the current state forbids are no-ops returning `false`.
//! Transitions triggered by the sink arrive as [`SessionEvent`]s and are
//! only applied when their id matches the active capture.

use super::events::{CaptureStats, SessionEvent, SessionNotice};
use crate::check_invariant;
use crate::device::Device;
use crate::errors::{CameraError, CaptureError, CaptureErrorKind};
use crate::platform::{
    AudioConfig, CaptureSink, OutputTarget, RecordEvent, RecordingHandle,
};
use crate::types::CaptureState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

struct ActiveRecording {
    id: Uuid,
    handle: Box<dyn RecordingHandle>,
    supports_pause: bool,
    stop_requested: bool,
    recorded: Duration,
}

pub struct CaptureStateMachine {
    state: CaptureState,
    events: mpsc::UnboundedSender<SessionEvent>,
    active_photo: Option<Uuid>,
    active_recording: Option<ActiveRecording>,
    stats: CaptureStats,
}

impl CaptureStateMachine {
    /// Sink callbacks created by this machine deliver into `events`.
    pub fn new(events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            state: CaptureState::Idle,
            events,
            active_photo: None,
            active_recording: None,
            stats: CaptureStats::default(),
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    /// Device, mode and quality may only change while idle.
    pub fn can_reconfigure(&self) -> bool {
        self.state == CaptureState::Idle
    }

    /// Last duration the sink reported for the running recording.
    pub fn recorded_duration(&self) -> Option<Duration> {
        self.active_recording.as_ref().map(|r| r.recorded)
    }

    pub fn stop_requested(&self) -> bool {
        self.active_recording
            .as_ref()
            .is_some_and(|r| r.stop_requested)
    }

    pub fn take_photo(&mut self, sink: &mut dyn CaptureSink, target: OutputTarget) -> bool {
        if self.state != CaptureState::Idle {
            log::warn!("Ignoring photo request in state {:?}", self.state);
            return false;
        }

        let request = Uuid::new_v4();
        self.active_photo = Some(request);
        self.transition(CaptureState::TakingPhoto);
        log::info!("Taking photo to {:?}", target.path());

        let events = self.events.clone();
        sink.take_photo(
            target,
            Box::new(move |result| {
                let _ = events.send(SessionEvent::Photo { request, result });
            }),
        );
        true
    }

    /// Ask the sink to start recording.
    ///
    /// `Ok(false)` when the state or the device forbids it. A sink failure
    /// leaves the machine idle.
    pub fn start_recording(
        &mut self,
        sink: &mut dyn CaptureSink,
        device: &Device,
        target: OutputTarget,
        audio: AudioConfig,
    ) -> Result<bool, CameraError> {
        if self.state != CaptureState::Idle {
            log::warn!("Ignoring record request in state {:?}", self.state);
            return Ok(false);
        }
        if !device.supports_video_recording() {
            log::warn!("Camera {} cannot record video", device.id());
            return Ok(false);
        }

        let recording = Uuid::new_v4();
        self.transition(CaptureState::PreRecordingVideo);
        log::info!("Starting recording {} to {:?}", recording, target.path());

        let events = self.events.clone();
        let on_event = Arc::new(move |event: RecordEvent| {
            let _ = events.send(SessionEvent::Record { recording, event });
        });

        match sink.start_recording(target, audio, on_event) {
            Ok(handle) => {
                self.active_recording = Some(ActiveRecording {
                    id: recording,
                    handle,
                    supports_pause: sink.supports_pause(),
                    stop_requested: false,
                    recorded: Duration::ZERO,
                });
                Ok(true)
            }
            Err(e) => {
                log::error!("Failed to start recording: {}", e);
                self.stats.recordings_failed += 1;
                self.transition(CaptureState::Idle);
                Err(e)
            }
        }
    }

    /// Shutter button in video mode: start from idle, stop while recording.
    pub fn toggle_recording(
        &mut self,
        sink: &mut dyn CaptureSink,
        device: &Device,
        target: OutputTarget,
        audio: AudioConfig,
    ) -> Result<bool, CameraError> {
        match self.state {
            CaptureState::Idle => self.start_recording(sink, device, target, audio),
            CaptureState::RecordingVideo | CaptureState::RecordingVideoPaused => {
                Ok(self.stop_recording())
            }
            CaptureState::PreRecordingVideo | CaptureState::TakingPhoto => Ok(false),
        }
    }

    pub fn pause(&mut self) -> bool {
        if self.state != CaptureState::RecordingVideo {
            return false;
        }
        let Some(recording) = self.active_recording.as_mut() else {
            return false;
        };
        if !recording.supports_pause || recording.stop_requested {
            return false;
        }
        recording.handle.pause();
        self.transition(CaptureState::RecordingVideoPaused);
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.state != CaptureState::RecordingVideoPaused {
            return false;
        }
        let Some(recording) = self.active_recording.as_mut() else {
            return false;
        };
        if recording.stop_requested {
            return false;
        }
        recording.handle.resume();
        self.transition(CaptureState::RecordingVideo);
        true
    }

    /// Request finalization. The state stays put until the sink reports
    /// `Finalize`; repeated requests are no-ops.
    pub fn stop_recording(&mut self) -> bool {
        if !matches!(
            self.state,
            CaptureState::RecordingVideo | CaptureState::RecordingVideoPaused
        ) {
            return false;
        }
        let Some(recording) = self.active_recording.as_mut() else {
            return false;
        };
        if recording.stop_requested {
            log::debug!("Stop already requested for recording {}", recording.id);
            return false;
        }
        log::info!("Stopping recording {}", recording.id);
        recording.stop_requested = true;
        recording.handle.stop();
        true
    }

    /// Abandon any capture in flight and return to idle.
    ///
    /// Abandoned captures count as failed; their late events are dropped.
    pub fn force_idle(&mut self) {
        if self.active_photo.take().is_some() {
            self.stats.photos_failed += 1;
        }
        if let Some(mut recording) = self.active_recording.take() {
            if !recording.stop_requested {
                recording.handle.stop();
            }
            self.stats.recordings_failed += 1;
        }
        if self.state != CaptureState::Idle {
            log::warn!("Forcing capture state {:?} to Idle", self.state);
        }
        self.transition(CaptureState::Idle);
    }

    pub fn handle_event(&mut self, event: SessionEvent) -> Option<SessionNotice> {
        match event {
            SessionEvent::Photo { request, result } => self.on_photo_result(request, result),
            SessionEvent::Record { recording, event } => self.on_record_event(recording, event),
            SessionEvent::PlatformError(error) => Some(self.on_platform_error(error)),
        }
    }

    fn on_photo_result(
        &mut self,
        request: Uuid,
        result: Result<OutputTarget, CaptureError>,
    ) -> Option<SessionNotice> {
        if self.active_photo != Some(request) {
            log::debug!("Dropping result of inactive photo request {}", request);
            return None;
        }
        self.active_photo = None;
        self.transition(CaptureState::Idle);

        match result {
            Ok(output) => {
                self.stats.photos_taken += 1;
                log::info!("Photo saved to {:?}", output.path());
                Some(SessionNotice::PhotoSaved(output))
            }
            Err(error) => {
                self.stats.photos_failed += 1;
                Some(self.classify(error))
            }
        }
    }

    fn on_record_event(&mut self, id: Uuid, event: RecordEvent) -> Option<SessionNotice> {
        let recording = match self.active_recording.as_mut() {
            Some(recording) if recording.id == id => recording,
            _ => {
                log::debug!("Dropping {:?} for inactive recording {}", event, id);
                return None;
            }
        };

        match event {
            RecordEvent::Start => {
                if self.state == CaptureState::PreRecordingVideo {
                    self.transition(CaptureState::RecordingVideo);
                    return Some(SessionNotice::RecordingStarted);
                }
                None
            }
            // pause/resume already transitioned when requested; these only
            // reconcile a sink that changed on its own
            RecordEvent::Pause => {
                if self.state == CaptureState::RecordingVideo {
                    self.transition(CaptureState::RecordingVideoPaused);
                }
                None
            }
            RecordEvent::Resume => {
                if self.state == CaptureState::RecordingVideoPaused {
                    self.transition(CaptureState::RecordingVideo);
                }
                None
            }
            RecordEvent::Status { recorded } => {
                recording.recorded = recorded;
                None
            }
            RecordEvent::Finalize { output, error } => {
                let duration = recording.recorded;
                self.active_recording = None;
                self.transition(CaptureState::Idle);

                match error {
                    None => {
                        self.stats.recordings_completed += 1;
                        log::info!("Recording saved to {:?} ({:?})", output.path(), duration);
                        Some(SessionNotice::RecordingSaved { output, duration })
                    }
                    Some(error) if error.kind == CaptureErrorKind::NoValidData => {
                        self.stats.recordings_failed += 1;
                        log::warn!("Recording produced no valid data, nothing saved");
                        Some(SessionNotice::RecordingDiscarded)
                    }
                    Some(error) => {
                        self.stats.recordings_failed += 1;
                        Some(self.classify(error))
                    }
                }
            }
        }
    }

    fn on_platform_error(&mut self, error: CaptureError) -> SessionNotice {
        self.force_idle();
        self.classify(error)
    }

    fn classify(&self, error: CaptureError) -> SessionNotice {
        if error.is_fatal() {
            log::error!("Fatal capture error: {}", error);
            SessionNotice::Fatal(error)
        } else {
            log::warn!("Capture failed: {}", error);
            SessionNotice::CaptureFailed(error)
        }
    }

    fn transition(&mut self, to: CaptureState) {
        const CONTEXT: &str = "session::transition";
        check_invariant!(
            !(self.state == CaptureState::RecordingVideo && to == CaptureState::TakingPhoto),
            "No photo capture while recording",
            CONTEXT
        );
        check_invariant!(
            to != CaptureState::TakingPhoto || self.active_photo.is_some(),
            "Taking a photo has an active request",
            CONTEXT
        );
        if self.state != to {
            log::debug!("Capture state {:?} -> {:?}", self.state, to);
        }
        self.state = to;
    }
}
