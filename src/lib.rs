//! Lensgate: camera capability negotiation and capture-session state management
//!
//! The crate sits between a camera UI and a platform camera stack. It
//! classifies the cameras a platform reports, negotiates a configuration the
//! selected camera can actually deliver, maps user-facing zoom levels to
//! exact ratios, and runs the capture lifecycle against an asynchronous
//! capture sink.
//!
//! # Features
//! - Device catalog with main/aux lens classification and hot-plug refresh
//! - Total, side-effect free capability negotiation with deterministic fallbacks
//! - Logical camera zoom breakpoints and octave zoom stepping
//! - Single-owner capture state machine fed by a tokio channel
//!
//! # Usage
//! ```rust,ignore
//! use lensgate::{CameraSession, DeviceCatalog, LensgateConfig};
//! use lensgate::platform::{MemoryConfigurationStore, ProfileProvider};
//! use std::sync::Arc;
//!
//! let provider = Arc::new(ProfileProvider::load_from_file("phone.toml")?);
//! let catalog = DeviceCatalog::build(provider, LensgateConfig::load_or_default());
//! let mut session = CameraSession::new(
//!     catalog,
//!     Box::new(my_sink),
//!     Box::new(MemoryConfigurationStore::default()),
//! )?;
//! session.take_photo();
//! for notice in session.process_pending_events() {
//!     println!("{:?}", notice);
//! }
//! ```
pub mod catalog;
pub mod config;
pub mod cyclic;
pub mod device;
pub mod errors;
pub mod invariants;
pub mod negotiation;
pub mod platform;
pub mod session;
pub mod types;
pub mod zoom;

// Testing utilities - mock sink and sample profiles for offline testing
pub mod testing;

// Re-exports for convenience
pub use catalog::DeviceCatalog;
pub use config::LensgateConfig;
pub use device::{Device, VideoCapability, ZoomBounds, ZoomBreakpoint};
pub use errors::{CameraError, CaptureError, CaptureErrorKind};
pub use negotiation::{CapabilityNegotiator, ConfigurationRequest, SelectedConfiguration};
pub use session::{CameraSession, CaptureStateMachine, SessionEvent, SessionNotice};
pub use types::{
    CameraFacing, CameraMode, CameraType, CaptureState, DynamicRange, ExtensionMode, FlashMode,
    FrameRate, Quality, StabilizationMode,
};
pub use zoom::{LensOptions, ZoomGate, ZoomRatioMapper};

/// Initialize logging for lensgate
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "lensgate=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}
