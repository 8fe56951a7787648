//! Zoom ratio mapping
//!
//! Logical cameras switch physical sensors at breakpoints. The user sees
//! approximate ratios (1x, 2x, 5x); the platform needs the exact ratio at
//! which the switch happens. Discrete zoom buttons step by octaves.

use crate::catalog::DeviceCatalog;
use crate::device::{Device, ZoomBreakpoint};
use crate::types::CameraFacing;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct ZoomRatioMapper;

impl ZoomRatioMapper {
    /// Exact platform ratio for a user-facing approximate ratio. Ratios
    /// without a configured breakpoint pass through unchanged.
    pub fn exact_ratio_for(device: &Device, approximate: f32) -> f32 {
        let breakpoints = device.zoom_breakpoints();
        breakpoints
            .binary_search_by(|b| b.approximate.total_cmp(&approximate))
            .map(|index| breakpoints[index].exact)
            .unwrap_or(approximate)
    }

    /// Highest breakpoint whose exact ratio is at or below `current_exact`.
    /// Ratios below every breakpoint select the first one.
    pub fn active_breakpoint(device: &Device, current_exact: f32) -> ZoomBreakpoint {
        let breakpoints = device.zoom_breakpoints();
        breakpoints
            .iter()
            .rev()
            .find(|b| b.exact <= current_exact)
            .or_else(|| breakpoints.first())
            .copied()
            .unwrap_or(ZoomBreakpoint::IDENTITY)
    }

    /// Index of [`Self::active_breakpoint`] within the device's breakpoints.
    pub fn active_breakpoint_index(device: &Device, current_exact: f32) -> usize {
        device
            .zoom_breakpoints()
            .iter()
            .rposition(|b| b.exact <= current_exact)
            .unwrap_or(0)
    }

    /// Ratio shown to the user, relative to the facing's main lens.
    pub fn display_ratio(device: &Device, exact: f32) -> f32 {
        exact * device.intrinsic_zoom_ratio()
    }

    /// Zoom in by one octave, clamped to the device bounds.
    pub fn zoom_in(device: &Device, current: f32) -> f32 {
        device.zoom_bounds().clamp(next_power_of_two(current))
    }

    /// Zoom out by one octave, clamped to the device bounds.
    pub fn zoom_out(device: &Device, current: f32) -> f32 {
        device.zoom_bounds().clamp(previous_power_of_two(current))
    }
}

/// Smallest power of two strictly greater than `x`; 0 for `x <= 0`.
pub fn next_power_of_two(x: f32) -> f32 {
    if x.is_nan() || x <= 0.0 {
        return 0.0;
    }
    let power = x.log2().ceil().exp2();
    if power <= x {
        power * 2.0
    } else {
        power
    }
}

/// Largest power of two strictly less than `x`; 0 for `x <= 0`.
pub fn previous_power_of_two(x: f32) -> f32 {
    if x.is_nan() || x <= 0.0 {
        return 0.0;
    }
    let power = x.log2().floor().exp2();
    if power >= x {
        power / 2.0
    } else {
        power
    }
}

/// What the lens selector offers for the current camera.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "options", rename_all = "snake_case")]
pub enum LensOptions {
    /// Breakpoints of a logical camera that is alone on its facing.
    Breakpoints(Vec<ZoomBreakpoint>),
    /// Ids of the facing's cameras ordered by intrinsic zoom ratio.
    Cameras(Vec<String>),
}

impl LensOptions {
    pub fn for_device(catalog: &DeviceCatalog, device: &Device) -> LensOptions {
        let facing = match device.facing() {
            CameraFacing::Unknown => return LensOptions::Cameras(vec![device.id().to_string()]),
            facing => facing,
        };

        let mut cameras = catalog.devices_of_facing(facing);
        if device.is_logical() && cameras.len() <= 1 {
            return LensOptions::Breakpoints(device.zoom_breakpoints().to_vec());
        }

        cameras.sort_by(|a, b| a.intrinsic_zoom_ratio().total_cmp(&b.intrinsic_zoom_ratio()));
        LensOptions::Cameras(cameras.iter().map(|d| d.id().to_string()).collect())
    }

    pub fn len(&self) -> usize {
        match self {
            LensOptions::Breakpoints(b) => b.len(),
            LensOptions::Cameras(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Mutual exclusion for zoom animations.
///
/// A step request while an animation holds the gate is dropped, not queued.
#[derive(Debug, Clone, Default)]
pub struct ZoomGate {
    busy: Arc<AtomicBool>,
}

impl ZoomGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<ZoomGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ZoomGuard {
                busy: self.busy.clone(),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Held for the duration of a zoom animation; releases the gate on drop.
#[derive(Debug)]
pub struct ZoomGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for ZoomGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::tests::parts;
    use crate::device::ZoomBounds;

    fn logical(breakpoints: &[(f32, f32)]) -> Device {
        let mut parts = parts("0", CameraFacing::Back);
        parts.raw.physical_camera_ids = vec!["2".to_string(), "3".to_string()];
        parts.zoom_bounds = ZoomBounds::new(0.5, 10.0);
        parts.zoom_breakpoints = breakpoints
            .iter()
            .map(|(a, e)| ZoomBreakpoint::new(*a, *e))
            .collect();
        Device::new(parts)
    }

    #[test]
    fn test_exact_ratio_lookup() {
        let device = logical(&[(2.0, 1.8), (5.0, 4.6)]);
        assert_eq!(ZoomRatioMapper::exact_ratio_for(&device, 1.0), 1.0);
        assert_eq!(ZoomRatioMapper::exact_ratio_for(&device, 2.0), 1.8);
        assert_eq!(ZoomRatioMapper::exact_ratio_for(&device, 5.0), 4.6);
        assert_eq!(ZoomRatioMapper::exact_ratio_for(&device, 3.0), 3.0);
    }

    #[test]
    fn test_exact_ratio_without_breakpoints() {
        let device = Device::new(parts("0", CameraFacing::Back));
        assert_eq!(ZoomRatioMapper::exact_ratio_for(&device, 1.0), 1.0);
        assert_eq!(ZoomRatioMapper::exact_ratio_for(&device, 2.5), 2.5);
    }

    #[test]
    fn test_single_sensor_camera_passes_ratio_through() {
        let mut parts = parts("0", CameraFacing::Back);
        parts.zoom_bounds = ZoomBounds::new(1.0, 10.0);
        parts.zoom_breakpoints = vec![ZoomBreakpoint::new(2.0, 1.8)];
        let device = Device::new(parts);
        assert_eq!(ZoomRatioMapper::exact_ratio_for(&device, 2.0), 2.0);
        assert_eq!(
            ZoomRatioMapper::active_breakpoint(&device, 1.9),
            ZoomBreakpoint::IDENTITY
        );
    }

    #[test]
    fn test_active_breakpoint_selection() {
        let device = logical(&[(0.5, 0.6), (2.0, 1.8)]);
        let active = |x| ZoomRatioMapper::active_breakpoint(&device, x).approximate;
        assert_eq!(active(0.1), 0.5);
        assert_eq!(active(0.6), 0.5);
        assert_eq!(active(1.5), 1.0);
        assert_eq!(active(1.8), 2.0);
        assert_eq!(active(9.0), 2.0);
        assert_eq!(ZoomRatioMapper::active_breakpoint_index(&device, 9.0), 2);
    }

    #[test]
    fn test_power_of_two_strict() {
        assert_eq!(next_power_of_two(1.0), 2.0);
        assert_eq!(next_power_of_two(1.5), 2.0);
        assert_eq!(next_power_of_two(0.3), 0.5);
        assert_eq!(previous_power_of_two(2.0), 1.0);
        assert_eq!(previous_power_of_two(3.0), 2.0);
        assert_eq!(previous_power_of_two(0.5), 0.25);
        assert_eq!(next_power_of_two(0.0), 0.0);
        assert_eq!(previous_power_of_two(-4.0), 0.0);
        assert_eq!(next_power_of_two(f32::NAN), 0.0);
    }

    #[test]
    fn test_zoom_steps_clamped() {
        let device = logical(&[]);
        assert_eq!(ZoomRatioMapper::zoom_in(&device, 6.0), 8.0);
        assert_eq!(ZoomRatioMapper::zoom_in(&device, 8.0), 10.0);
        assert_eq!(ZoomRatioMapper::zoom_out(&device, 1.0), 0.5);
        assert_eq!(ZoomRatioMapper::zoom_out(&device, 0.5), 0.5);
    }

    #[test]
    fn test_display_ratio_uses_intrinsic_zoom() {
        let mut tele = parts("2", CameraFacing::Back);
        tele.intrinsic_zoom_ratio = 3.0;
        let tele = Device::new(tele);
        assert_eq!(ZoomRatioMapper::display_ratio(&tele, 2.0), 6.0);
    }

    #[test]
    fn test_zoom_gate_drops_concurrent_requests() {
        let gate = ZoomGate::new();
        let guard = gate.try_acquire();
        assert!(guard.is_some());
        assert!(gate.is_busy());
        assert!(gate.clone().try_acquire().is_none());

        drop(guard);
        assert!(!gate.is_busy());
        assert!(gate.try_acquire().is_some());
    }
}
