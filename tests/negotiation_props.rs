//! Property-Based Tests for negotiation and zoom mapping
//!
//! These tests verify the fallback contracts over generated devices and
//! requests using proptest for input generation and shrinking.
//!
//! Run with: cargo test --test negotiation_props

use lensgate::device::{DeviceParts, RawDeviceInfo};
use lensgate::zoom::{next_power_of_two, previous_power_of_two};
use lensgate::{
    CameraFacing, CameraMode, CapabilityNegotiator, Device, DynamicRange, FrameRate, Quality,
    StabilizationMode, VideoCapability, ZoomBounds, ZoomBreakpoint, ZoomRatioMapper,
};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

fn quality() -> impl Strategy<Value = Quality> {
    prop::sample::select(Quality::ALL.to_vec())
}

fn stabilization() -> impl Strategy<Value = StabilizationMode> {
    prop::sample::select(vec![
        StabilizationMode::Off,
        StabilizationMode::Digital,
        StabilizationMode::Optical,
        StabilizationMode::Hybrid,
    ])
}

fn mode() -> impl Strategy<Value = CameraMode> {
    prop::sample::select(CameraMode::ALL.to_vec())
}

fn video_capabilities() -> impl Strategy<Value = BTreeMap<Quality, VideoCapability>> {
    prop::collection::btree_map(
        quality(),
        (
            prop::collection::btree_set(1u32..=240, 0..5),
            prop::collection::btree_set(
                prop::sample::select(vec![
                    DynamicRange::Sdr,
                    DynamicRange::Hlg10Bit,
                    DynamicRange::Hdr10_10Bit,
                    DynamicRange::DolbyVision8Bit,
                ]),
                1..3,
            ),
        )
            .prop_map(|(rates, ranges)| {
                VideoCapability::new(rates.into_iter().map(FrameRate), ranges)
            }),
        0..4,
    )
}

fn device_with(
    video_capabilities: BTreeMap<Quality, VideoCapability>,
    stabilization_modes: BTreeSet<StabilizationMode>,
    zoom_breakpoints: Vec<ZoomBreakpoint>,
) -> Device {
    let mut raw = RawDeviceInfo::new("0", CameraFacing::Back);
    raw.stabilization_modes = stabilization_modes;
    raw.physical_camera_ids = vec!["2".to_string(), "3".to_string()];
    Device::new(DeviceParts {
        raw,
        video_capabilities,
        extension_modes: BTreeSet::new(),
        zoom_bounds: ZoomBounds::new(1.0, 10.0),
        zoom_breakpoints,
        intrinsic_zoom_ratio: 1.0,
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// NEGOTIATION INVARIANTS
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    /// INVARIANT: a resolved quality is supported, and a supported request is a fixed point
    #[test]
    fn quality_resolution_is_supported_fixed_point(
        capabilities in video_capabilities(),
        requested in quality(),
    ) {
        let supported: Vec<Quality> = capabilities.keys().copied().collect();
        let device = device_with(capabilities, BTreeSet::new(), Vec::new());

        match CapabilityNegotiator::resolve_quality(&device, requested) {
            Some(resolved) => {
                prop_assert!(supported.contains(&resolved));
                if supported.contains(&requested) {
                    prop_assert_eq!(resolved, requested);
                } else {
                    prop_assert_eq!(Some(resolved), supported.first().copied());
                }
            }
            None => prop_assert!(supported.is_empty()),
        }
    }

    /// INVARIANT: a resolved frame rate is always in the supported set
    #[test]
    fn frame_rate_resolution_stays_in_supported_set(
        capabilities in video_capabilities(),
        requested in quality(),
        fps in 1u32..=300,
    ) {
        let device = device_with(capabilities, BTreeSet::new(), Vec::new());
        let Some(quality) = CapabilityNegotiator::resolve_quality(&device, requested) else {
            return Ok(());
        };
        let rates = device.video_capability(quality).unwrap().frame_rates.clone();

        let resolved =
            CapabilityNegotiator::resolve_frame_rate(&device, quality, Some(FrameRate(fps)));
        match resolved {
            Some(rate) => {
                prop_assert!(rates.contains(&rate));
                if rates.contains(&FrameRate(fps)) {
                    prop_assert_eq!(rate, FrameRate(fps));
                }
                // never above the request when something lower exists
                if rates.iter().any(|r| r.value() <= fps) {
                    prop_assert!(rate.value() <= fps);
                }
            }
            None => prop_assert!(rates.is_empty()),
        }
    }

    /// INVARIANT: stabilization never escalates and always lands on a supported mode
    #[test]
    fn stabilization_never_escalates(
        supported in prop::collection::btree_set(stabilization(), 0..4),
        requested in stabilization(),
        mode in mode(),
    ) {
        let device = device_with(BTreeMap::new(), supported, Vec::new());
        let resolved = CapabilityNegotiator::resolve_stabilization_mode(requested, &device, mode);

        prop_assert!(resolved <= requested);
        prop_assert!(device.supports_stabilization_mode(resolved));
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ZOOM INVARIANTS
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    /// INVARIANT: octave steps are strict
    #[test]
    fn power_of_two_steps_are_strict(x in 0.001f32..10_000.0) {
        prop_assert!(next_power_of_two(x) > x);
        prop_assert!(previous_power_of_two(x) < x);
    }

    /// INVARIANT: next(previous(next(x))) settles immediately
    #[test]
    fn power_of_two_round_trip_stabilizes(x in 0.001f32..10_000.0) {
        let up = next_power_of_two(x);
        let settled = next_power_of_two(previous_power_of_two(up));
        prop_assert_eq!(settled, up);
        prop_assert_eq!(next_power_of_two(previous_power_of_two(settled)), settled);
    }

    /// INVARIANT: a larger current ratio never selects an earlier breakpoint
    #[test]
    fn active_breakpoint_is_monotonic(
        pairs in prop::collection::vec((0.5f32..10.0, 0.5f32..10.0), 0..6),
        a in 0.0f32..12.0,
        b in 0.0f32..12.0,
    ) {
        let breakpoints = pairs
            .into_iter()
            .map(|(approximate, exact)| ZoomBreakpoint::new(approximate, exact))
            .collect();
        let device = device_with(BTreeMap::new(), BTreeSet::new(), breakpoints);
        let (low, high) = if a <= b { (a, b) } else { (b, a) };

        prop_assert!(
            ZoomRatioMapper::active_breakpoint_index(&device, low)
                <= ZoomRatioMapper::active_breakpoint_index(&device, high)
        );
    }
}
