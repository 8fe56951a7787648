//! Scriptable capture sink
//!
//! Clones share state, so a test hands one clone to the session and keeps
//! another to complete photos and emit record events.

use crate::errors::{CameraError, CaptureError};
use crate::platform::{
    AudioConfig, CaptureSink, OutputTarget, PhotoCallback, RecordEvent, RecordEventCallback,
    RecordingHandle,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleCall {
    Pause,
    Resume,
    Stop,
}

struct MockRecording {
    target: OutputTarget,
    audio: AudioConfig,
    on_event: RecordEventCallback,
    calls: Arc<Mutex<Vec<HandleCall>>>,
}

struct MockSinkState {
    pending_photos: VecDeque<(OutputTarget, PhotoCallback)>,
    photo_targets: Vec<OutputTarget>,
    recordings: Vec<MockRecording>,
    supports_pause: bool,
    fail_next_recording: bool,
}

#[derive(Clone)]
pub struct MockCaptureSink {
    state: Arc<Mutex<MockSinkState>>,
}

impl Default for MockCaptureSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCaptureSink {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockSinkState {
                pending_photos: VecDeque::new(),
                photo_targets: Vec::new(),
                recordings: Vec::new(),
                supports_pause: true,
                fail_next_recording: false,
            })),
        }
    }

    /// A sink whose recordings cannot be paused.
    pub fn without_pause() -> Self {
        let sink = Self::new();
        sink.lock().supports_pause = false;
        sink
    }

    pub fn fail_next_recording(&self) {
        self.lock().fail_next_recording = true;
    }

    pub fn pending_photos(&self) -> usize {
        self.lock().pending_photos.len()
    }

    /// Every target a photo was requested for, in order.
    pub fn photo_targets(&self) -> Vec<OutputTarget> {
        self.lock().photo_targets.clone()
    }

    /// Complete the oldest pending photo. `false` when none is pending.
    pub fn complete_photo(&self, result: Result<(), CaptureError>) -> bool {
        // release the lock before the callback runs
        let pending = self.lock().pending_photos.pop_front();
        match pending {
            Some((target, callback)) => {
                callback(result.map(|_| target));
                true
            }
            None => false,
        }
    }

    /// Number of recording handles handed out.
    pub fn handles_created(&self) -> usize {
        self.lock().recordings.len()
    }

    pub fn recording_target(&self, index: usize) -> Option<OutputTarget> {
        self.lock().recordings.get(index).map(|r| r.target.clone())
    }

    pub fn recording_audio(&self, index: usize) -> Option<AudioConfig> {
        self.lock().recordings.get(index).map(|r| r.audio)
    }

    pub fn handle_calls(&self, index: usize) -> Vec<HandleCall> {
        self.lock()
            .recordings
            .get(index)
            .map(|r| r.calls.lock().unwrap_or_else(|e| e.into_inner()).clone())
            .unwrap_or_default()
    }

    /// Deliver `event` to the most recent recording.
    pub fn emit(&self, event: RecordEvent) -> bool {
        let index = self.handles_created().checked_sub(1);
        match index {
            Some(index) => self.emit_to(index, event),
            None => false,
        }
    }

    pub fn emit_to(&self, index: usize, event: RecordEvent) -> bool {
        let callback = self.lock().recordings.get(index).map(|r| r.on_event.clone());
        match callback {
            Some(callback) => {
                callback(event);
                true
            }
            None => false,
        }
    }

    /// Finalize the most recent recording into its own target.
    pub fn finalize(&self, error: Option<CaptureError>) -> bool {
        let index = self.handles_created().checked_sub(1);
        let target = index.and_then(|i| self.recording_target(i));
        match target {
            Some(output) => self.emit(RecordEvent::Finalize { output, error }),
            None => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockSinkState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CaptureSink for MockCaptureSink {
    fn take_photo(&mut self, target: OutputTarget, on_result: PhotoCallback) {
        let mut state = self.lock();
        state.photo_targets.push(target.clone());
        state.pending_photos.push_back((target, on_result));
    }

    fn start_recording(
        &mut self,
        target: OutputTarget,
        audio: AudioConfig,
        on_event: RecordEventCallback,
    ) -> Result<Box<dyn RecordingHandle>, CameraError> {
        let mut state = self.lock();
        if state.fail_next_recording {
            state.fail_next_recording = false;
            return Err(CameraError::Sink("mock recorder refused to start".to_string()));
        }

        let calls = Arc::new(Mutex::new(Vec::new()));
        state.recordings.push(MockRecording {
            target,
            audio,
            on_event,
            calls: calls.clone(),
        });
        Ok(Box::new(MockRecordingHandle { calls }))
    }

    fn supports_pause(&self) -> bool {
        self.lock().supports_pause
    }
}

struct MockRecordingHandle {
    calls: Arc<Mutex<Vec<HandleCall>>>,
}

impl MockRecordingHandle {
    fn record(&self, call: HandleCall) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }
}

impl RecordingHandle for MockRecordingHandle {
    fn pause(&mut self) {
        self.record(HandleCall::Pause);
    }

    fn resume(&mut self) {
        self.record(HandleCall::Resume);
    }

    fn stop(&mut self) {
        self.record(HandleCall::Stop);
    }
}
