use crate::errors::CaptureError;
use crate::platform::{OutputTarget, RecordEvent};
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// Sink callbacks marshaled onto the session's single logical context.
///
/// Every event carries the id of the capture it belongs to; events for a
/// capture that is no longer active are discarded.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Photo {
        request: Uuid,
        result: Result<OutputTarget, CaptureError>,
    },
    Record {
        recording: Uuid,
        event: RecordEvent,
    },
    /// Error outside any single capture, e.g. the camera went away.
    PlatformError(CaptureError),
}

/// What the collaborator layer gets told after an event is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    PhotoSaved(OutputTarget),
    RecordingStarted,
    RecordingSaved {
        output: OutputTarget,
        duration: Duration,
    },
    /// The recording produced nothing worth keeping.
    RecordingDiscarded,
    /// Recoverable; the session is idle and the user may retry.
    CaptureFailed(CaptureError),
    /// Unrecoverable; the session was forced idle.
    Fatal(CaptureError),
    DeviceRedirected {
        from: String,
        to: String,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CaptureStats {
    pub photos_taken: u64,
    pub photos_failed: u64,
    pub recordings_completed: u64,
    pub recordings_failed: u64,
}
