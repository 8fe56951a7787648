//! Error types for lensgate
//!
//! Negotiation never fails: unsupported requests resolve to a fallback.
//! These types cover construction, I/O and the asynchronous capture path.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("Capability provider error: {0}")]
    Provider(String),
    #[error("Camera device not found: {0}")]
    DeviceNotFound(String),
    #[error("No camera available for the requested mode")]
    NoCameraAvailable,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Capture sink error: {0}")]
    Sink(String),
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for CameraError {
    fn from(err: std::io::Error) -> Self {
        CameraError::Io(err.to_string())
    }
}

/// Classification of errors reported by the capture sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptureErrorKind {
    CaptureFailed,
    FileIo,
    InsufficientStorage,
    /// The recording finished without producing any usable data.
    NoValidData,
    Encoding,
    CameraDisconnected,
    SessionFatal,
}

/// Error delivered asynchronously by a [`CaptureSink`](crate::platform::CaptureSink).
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct CaptureError {
    pub kind: CaptureErrorKind,
    pub message: String,
}

impl CaptureError {
    pub fn new(kind: CaptureErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn capture_failed(message: impl Into<String>) -> Self {
        Self::new(CaptureErrorKind::CaptureFailed, message)
    }

    pub fn no_valid_data() -> Self {
        Self::new(CaptureErrorKind::NoValidData, "recording contains no valid data")
    }

    pub fn disconnected(device_id: &str) -> Self {
        Self::new(
            CaptureErrorKind::CameraDisconnected,
            format!("camera {device_id} disconnected"),
        )
    }

    /// Fatal errors end the session's capture ability; the UI decides what to do next.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            CaptureErrorKind::CameraDisconnected | CaptureErrorKind::SessionFatal
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_error_display() {
        let error = CameraError::DeviceNotFound("7".to_string());
        assert_eq!(error.to_string(), "Camera device not found: 7");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let error: CameraError = io.into();
        assert!(matches!(error, CameraError::Io(_)));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(CaptureError::disconnected("0").is_fatal());
        assert!(CaptureError::new(CaptureErrorKind::SessionFatal, "boom").is_fatal());
        assert!(!CaptureError::capture_failed("blur").is_fatal());
        assert!(!CaptureError::no_valid_data().is_fatal());
    }
}
