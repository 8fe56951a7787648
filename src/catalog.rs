//! Camera enumeration and classification
//!
//! The catalog turns the provider's raw report into immutable [`Device`]s,
//! groups them into internal (back/front, main + aux) and external cameras,
//! and answers the "which camera next" questions the session asks.

use crate::config::LensgateConfig;
use crate::cyclic::{cyclic_step, Direction};
use crate::device::{Device, DeviceParts, RawDeviceInfo, VideoCapability};
use crate::errors::CameraError;
use crate::platform::{CapabilityProvider, DeviceEvent};
use crate::types::{CameraFacing, CameraMode, CameraType, DynamicRange, Quality};
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct DeviceCatalog {
    provider: Arc<dyn CapabilityProvider>,
    config: LensgateConfig,
    /// All internal devices sorted by id, including unknown facings.
    internal: Vec<Device>,
    back: Vec<Device>,
    front: Vec<Device>,
    external: Vec<Device>,
}

impl DeviceCatalog {
    /// Query the provider and classify every device.
    ///
    /// Never fails: a provider error leaves the affected device (or the whole
    /// list) out of the catalog.
    pub fn build(provider: Arc<dyn CapabilityProvider>, config: LensgateConfig) -> Self {
        let mut catalog = Self {
            provider,
            config,
            internal: Vec::new(),
            back: Vec::new(),
            front: Vec::new(),
            external: Vec::new(),
        };

        let raws = catalog.list_raw();
        let (internal_raw, external_raw): (Vec<_>, Vec<_>) = raws
            .into_iter()
            .partition(|raw| raw.facing.camera_type() == CameraType::Internal);

        catalog.internal = catalog.assemble_internal(internal_raw);
        catalog.back = catalog.prepare_facing_list(CameraFacing::Back);
        catalog.front = catalog.prepare_facing_list(CameraFacing::Front);
        catalog.external = catalog.assemble_external(external_raw);

        log::info!(
            "Camera catalog built: {} back, {} front, {} external",
            catalog.back.len(),
            catalog.front.len(),
            catalog.external.len()
        );
        catalog
    }

    pub fn config(&self) -> &LensgateConfig {
        &self.config
    }

    /// Every usable device: internal ones sorted by id, then external ones.
    pub fn enumerate(&self) -> Vec<Device> {
        self.internal
            .iter()
            .chain(self.external.iter())
            .cloned()
            .collect()
    }

    pub fn device(&self, id: &str) -> Option<&Device> {
        self.internal
            .iter()
            .chain(self.external.iter())
            .find(|d| d.id() == id)
    }

    /// Re-query external devices and report what changed.
    ///
    /// Internal cameras are never re-queried.
    pub fn refresh_external(&mut self) -> Vec<DeviceEvent> {
        let external_raw: Vec<RawDeviceInfo> = self
            .list_raw()
            .into_iter()
            .filter(|raw| raw.facing.camera_type() == CameraType::External)
            .collect();
        let refreshed = self.assemble_external(external_raw);

        let mut events = Vec::new();
        for old in &self.external {
            if !refreshed.contains(old) {
                log::info!("External camera {} removed from catalog", old.id());
                events.push(DeviceEvent::Disconnected(old.id().to_string()));
            }
        }
        for new in &refreshed {
            if !self.external.contains(new) {
                log::info!("External camera {} added to catalog", new.id());
                events.push(DeviceEvent::Connected(new.id().to_string()));
            }
        }

        self.external = refreshed;
        events
    }

    /// First internal device of the facing. For `External` this is the first
    /// connected external camera.
    pub fn main_device(&self, facing: CameraFacing) -> Option<&Device> {
        match facing {
            CameraFacing::Back => self.back.first(),
            CameraFacing::Front => self.front.first(),
            CameraFacing::External => self.external.first(),
            CameraFacing::Unknown => None,
        }
    }

    /// Internal devices of the facing after the main one, filtered by configuration.
    pub fn aux_devices(&self, facing: CameraFacing) -> Vec<&Device> {
        match facing {
            CameraFacing::Back => self.back.iter().skip(1).collect(),
            CameraFacing::Front => self.front.iter().skip(1).collect(),
            CameraFacing::External | CameraFacing::Unknown => Vec::new(),
        }
    }

    /// Main plus aux devices of a facing, or all external devices.
    pub fn devices_of_facing(&self, facing: CameraFacing) -> Vec<&Device> {
        match facing {
            CameraFacing::Back => self.back.iter().collect(),
            CameraFacing::Front => self.front.iter().collect(),
            CameraFacing::External => self.external.iter().collect(),
            CameraFacing::Unknown => Vec::new(),
        }
    }

    pub fn devices_supporting(&self, mode: CameraMode, facing: CameraFacing) -> Vec<&Device> {
        self.devices_of_facing(facing)
            .into_iter()
            .filter(|d| d.supports_camera_mode(mode))
            .collect()
    }

    /// Cycling order: main back, main front, then external devices in
    /// enumeration order, restricted to devices supporting `mode`.
    pub fn cycle_list(&self, mode: CameraMode) -> Vec<&Device> {
        self.back
            .first()
            .into_iter()
            .chain(self.front.first())
            .chain(self.external.iter())
            .filter(|d| d.supports_camera_mode(mode))
            .collect()
    }

    /// Camera following `current` in the cycling order.
    ///
    /// Aux cameras resolve to their facing's main camera first. A device no
    /// longer in the list (an unplugged external camera) yields the first
    /// entry. `None` only when no camera supports the mode.
    pub fn cycle_next(&self, current: &Device, mode: CameraMode) -> Option<&Device> {
        let cameras = self.cycle_list(mode);
        let anchor = match current.facing() {
            CameraFacing::Back | CameraFacing::Front => self.main_device(current.facing()),
            CameraFacing::External => self.external.iter().find(|d| *d == current),
            CameraFacing::Unknown => None,
        };
        match anchor {
            Some(anchor) => cyclic_step(&cameras, &anchor, Direction::Next),
            None => cameras.first().copied(),
        }
    }

    /// The facing's main camera when it supports `mode`, otherwise the first
    /// camera in cycling order that does.
    pub fn camera_of_facing_or_first_available(
        &self,
        facing: CameraFacing,
        mode: CameraMode,
    ) -> Option<&Device> {
        self.main_device(facing)
            .filter(|d| d.supports_camera_mode(mode))
            .or_else(|| self.cycle_list(mode).first().copied())
    }

    pub fn video_recording_available(&self) -> bool {
        !self.cycle_list(CameraMode::Video).is_empty()
    }

    fn list_raw(&self) -> Vec<RawDeviceInfo> {
        match self.provider.list_devices() {
            Ok(mut raws) => {
                raws.sort_by(|a, b| a.id.cmp(&b.id));
                raws
            }
            Err(e) => {
                log::warn!("Failed to list cameras: {}", e);
                Vec::new()
            }
        }
    }

    fn assemble_internal(&self, raws: Vec<RawDeviceInfo>) -> Vec<Device> {
        // intrinsic zoom is relative to the first camera of the same facing
        let mut main_focal: BTreeMap<CameraFacing, Option<f32>> = BTreeMap::new();
        for raw in &raws {
            main_focal
                .entry(raw.facing)
                .or_insert_with(|| raw.mm35_focal_length());
        }

        raws.into_iter()
            .filter_map(|raw| {
                let main = main_focal.get(&raw.facing).copied().flatten();
                let intrinsic = match (raw.mm35_focal_length(), main) {
                    (Some(own), Some(main)) if main > 0.0 => own / main,
                    _ => 1.0,
                };
                self.assemble(raw, intrinsic)
            })
            .collect()
    }

    fn assemble_external(&self, raws: Vec<RawDeviceInfo>) -> Vec<Device> {
        raws.into_iter()
            .filter_map(|raw| self.assemble(raw, 1.0))
            .collect()
    }

    fn assemble(&self, raw: RawDeviceInfo, intrinsic_zoom_ratio: f32) -> Option<Device> {
        match self.try_assemble(raw, intrinsic_zoom_ratio) {
            Ok(device) => Some(device),
            Err(e) => {
                log::warn!("Excluding camera from catalog: {}", e);
                None
            }
        }
    }

    fn try_assemble(
        &self,
        raw: RawDeviceInfo,
        intrinsic_zoom_ratio: f32,
    ) -> Result<Device, CameraError> {
        let id = raw.id.clone();
        let platform_video = self.provider.video_capabilities(&id)?;
        let zoom_bounds = self.provider.zoom_bounds(&id)?;
        let extension_modes = self.provider.extension_support(&id, raw.facing)?;

        let video_capabilities = self.apply_video_adjustments(&id, platform_video);
        let zoom_breakpoints = self.config.zoom_breakpoints(&id);

        log::debug!(
            "Camera {} ({:?}): qualities {:?}, intrinsic zoom {:.2}",
            id,
            raw.facing,
            video_capabilities.keys().collect::<Vec<_>>(),
            intrinsic_zoom_ratio
        );

        Ok(Device::new(DeviceParts {
            raw,
            video_capabilities,
            extension_modes,
            zoom_bounds,
            zoom_breakpoints,
            intrinsic_zoom_ratio,
        }))
    }

    /// Apply configured frame rate additions/removals to the qualities the
    /// platform reports. A quality the platform does not report stays absent.
    fn apply_video_adjustments(
        &self,
        camera_id: &str,
        mut capabilities: BTreeMap<Quality, VideoCapability>,
    ) -> BTreeMap<Quality, VideoCapability> {
        let adjustments = self.config.frame_rate_adjustments(camera_id);
        for (quality, capability) in capabilities.iter_mut() {
            if let Some(adjustment) = adjustments.get(quality) {
                capability.frame_rates.extend(adjustment.added.iter().copied());
                capability
                    .frame_rates
                    .retain(|rate| !adjustment.removed.contains(rate));
            }
            if capability.dynamic_ranges.is_empty() {
                capability.dynamic_ranges.insert(DynamicRange::Sdr);
            }
        }
        capabilities
    }

    fn prepare_facing_list(&self, facing: CameraFacing) -> Vec<Device> {
        let mut facing_cameras = self.internal.iter().filter(|d| d.facing() == facing);

        let main = match facing_cameras.next() {
            Some(main) => main.clone(),
            None => return Vec::new(),
        };

        if !self.config.catalog.enable_aux_cameras {
            return vec![main];
        }

        let catalog_config = &self.config.catalog;
        let aux = facing_cameras
            .filter(|d| !catalog_config.ignored_aux_camera_ids.iter().any(|id| id == d.id()))
            .filter(|d| !catalog_config.ignore_logical_aux_cameras || !d.is_logical())
            .cloned();

        std::iter::once(main).chain(aux).collect()
    }
}
