//! End-to-end negotiation and capture scenarios
//!
//! Run with: cargo test --test scenarios

use lensgate::device::{DeviceParts, RawDeviceInfo};
use lensgate::platform::{DeviceProfile, MemoryConfigurationStore, RecordEvent};
use lensgate::testing::{provider, MockCaptureSink};
use lensgate::{
    CameraFacing, CameraMode, CameraSession, CapabilityNegotiator, CaptureState,
    ConfigurationRequest, Device, DeviceCatalog, DynamicRange, FrameRate, LensgateConfig,
    Quality, SessionNotice, VideoCapability, ZoomBounds, ZoomBreakpoint, ZoomRatioMapper,
};
use std::collections::{BTreeMap, BTreeSet};

fn scenario_catalog() -> DeviceCatalog {
    DeviceCatalog::build(
        provider(vec![
            DeviceProfile::new("back", CameraFacing::Back).with_video(
                Quality::Fhd,
                &[30],
                &[DynamicRange::Sdr],
            ),
            DeviceProfile::new("front", CameraFacing::Front),
        ]),
        LensgateConfig::default(),
    )
}

fn session() -> (CameraSession, MockCaptureSink) {
    let sink = MockCaptureSink::new();
    let session = CameraSession::new(
        scenario_catalog(),
        Box::new(sink.clone()),
        Box::new(MemoryConfigurationStore::default()),
    )
    .unwrap();
    (session, sink)
}

#[test]
fn scenario_a_video_on_front_redirects_to_back() {
    let catalog = scenario_catalog();
    let request = ConfigurationRequest {
        device_id: Some("front".to_string()),
        facing: CameraFacing::Front,
        mode: CameraMode::Video,
        ..ConfigurationRequest::default()
    };

    let selected =
        CapabilityNegotiator::resolve(&catalog, &request, request.device_id.as_deref()).unwrap();
    assert_eq!(selected.device.id(), "back");
    assert_eq!(selected.mode, CameraMode::Video);
    assert_eq!(selected.quality, Some(Quality::Fhd));
}

#[test]
fn scenario_b_frame_rate_45_resolves_to_30() {
    let mut video_capabilities = BTreeMap::new();
    video_capabilities.insert(
        Quality::Fhd,
        VideoCapability::new(
            [FrameRate::FPS_24, FrameRate::FPS_30, FrameRate::FPS_60],
            [DynamicRange::Sdr],
        ),
    );
    let device = Device::new(DeviceParts {
        raw: RawDeviceInfo::new("0", CameraFacing::Back),
        video_capabilities,
        extension_modes: BTreeSet::new(),
        zoom_bounds: ZoomBounds::default(),
        zoom_breakpoints: Vec::new(),
        intrinsic_zoom_ratio: 1.0,
    });

    assert_eq!(
        CapabilityNegotiator::resolve_frame_rate(&device, Quality::Fhd, Some(FrameRate(45))),
        Some(FrameRate::FPS_30)
    );
}

#[test]
fn scenario_c_active_breakpoint_below_second_exact_ratio() {
    let mut raw = RawDeviceInfo::new("0", CameraFacing::Back);
    raw.physical_camera_ids = vec!["2".to_string(), "3".to_string()];
    let device = Device::new(DeviceParts {
        raw,
        video_capabilities: BTreeMap::new(),
        extension_modes: BTreeSet::new(),
        zoom_bounds: ZoomBounds::new(1.0, 10.0),
        zoom_breakpoints: vec![ZoomBreakpoint::new(1.0, 1.0), ZoomBreakpoint::new(2.0, 1.8)],
        intrinsic_zoom_ratio: 1.0,
    });

    assert_eq!(
        ZoomRatioMapper::active_breakpoint(&device, 1.5),
        ZoomBreakpoint::new(1.0, 1.0)
    );
}

#[test]
fn scenario_d_double_start_recording_creates_one_handle() {
    let (mut session, sink) = session();
    assert!(session.set_mode(CameraMode::Video));

    assert!(session.start_recording().unwrap());
    assert_eq!(session.state(), CaptureState::PreRecordingVideo);
    assert!(!session.start_recording().unwrap());

    assert_eq!(sink.handles_created(), 1);
    assert_eq!(session.state(), CaptureState::PreRecordingVideo);
}

#[test]
fn duplicate_finalize_is_idempotent() {
    let (mut session, sink) = session();
    session.set_mode(CameraMode::Video);
    session.start_recording().unwrap();

    sink.emit(RecordEvent::Start);
    session.process_pending_events();
    assert_eq!(session.state(), CaptureState::RecordingVideo);
    assert!(session.stop_recording());
    // still waiting for finalize
    assert!(!session.stop_recording());
    assert_eq!(session.state(), CaptureState::RecordingVideo);

    sink.finalize(None);
    let once = session.process_pending_events();
    let stats_once = session.stats();
    let state_once = session.state();

    sink.finalize(None);
    let twice = session.process_pending_events();

    assert_eq!(once.len(), 1);
    assert!(matches!(once[0], SessionNotice::RecordingSaved { .. }));
    assert!(twice.is_empty());
    assert_eq!(session.stats(), stats_once);
    assert_eq!(session.state(), state_once);
    assert_eq!(session.state(), CaptureState::Idle);
    assert_eq!(session.stats().recordings_completed, 1);
}

#[test]
fn can_reconfigure_only_when_idle() {
    let (mut session, sink) = session();
    assert!(session.can_reconfigure());

    session.take_photo();
    assert!(!session.can_reconfigure());
    sink.complete_photo(Ok(()));
    session.process_pending_events();
    assert!(session.can_reconfigure());

    session.set_mode(CameraMode::Video);
    session.start_recording().unwrap();
    assert!(!session.can_reconfigure());
    sink.emit(RecordEvent::Start);
    session.process_pending_events();
    assert!(!session.can_reconfigure());
    session.pause_recording();
    assert_eq!(session.state(), CaptureState::RecordingVideoPaused);
    assert!(!session.can_reconfigure());
}

#[test]
fn photo_is_never_taken_from_recording() {
    let (mut session, sink) = session();
    session.set_mode(CameraMode::Video);
    session.start_recording().unwrap();
    sink.emit(RecordEvent::Start);
    session.process_pending_events();

    // even switching back to photo is refused mid-recording
    assert!(!session.set_mode(CameraMode::Photo));
    assert!(!session.take_photo());
    assert_eq!(session.state(), CaptureState::RecordingVideo);
    assert_eq!(sink.pending_photos(), 0);
}
