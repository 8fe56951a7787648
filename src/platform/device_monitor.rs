//! Device monitoring and hot-plug detection
//!
//! Internal cameras are assumed stable for the process lifetime, so only
//! external devices are watched. The monitor polls the capability provider,
//! diffs the result by device id and reports changes over a channel.

use super::CapabilityProvider;
use crate::device::RawDeviceInfo;
use crate::errors::CameraError;
use crate::types::CameraType;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;

/// Device event types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Connected(String),    // Device ID
    Disconnected(String), // Device ID
}

impl DeviceEvent {
    pub fn device_id(&self) -> &str {
        match self {
            DeviceEvent::Connected(id) | DeviceEvent::Disconnected(id) => id,
        }
    }
}

/// Device monitor for detecting external camera changes
pub struct DeviceMonitor {
    provider: Arc<dyn CapabilityProvider>,
    active_devices: Arc<RwLock<HashMap<String, RawDeviceInfo>>>,
    event_sender: mpsc::UnboundedSender<DeviceEvent>,
    event_receiver: Arc<RwLock<mpsc::UnboundedReceiver<DeviceEvent>>>,
    is_monitoring: Arc<RwLock<bool>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DeviceMonitor {
    /// Create a new device monitor
    pub fn new(provider: Arc<dyn CapabilityProvider>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        Self {
            provider,
            active_devices: Arc::new(RwLock::new(HashMap::new())),
            event_sender: tx,
            event_receiver: Arc::new(RwLock::new(rx)),
            is_monitoring: Arc::new(RwLock::new(false)),
            task: Mutex::new(None),
        }
    }

    /// Start polling for device changes every `interval`.
    ///
    /// The initial scan only records the devices already present; it emits
    /// no events.
    pub async fn start_monitoring(&self, interval: Duration) -> Result<(), CameraError> {
        let mut is_monitoring = self.is_monitoring.write().await;
        if *is_monitoring {
            return Ok(());
        }

        log::info!("Starting external camera monitoring every {:?}", interval);

        let initial = scan_external(self.provider.as_ref())?;
        {
            let mut active = self.active_devices.write().await;
            active.clear();
            active.extend(initial.into_iter().map(|d| (d.id.clone(), d)));
        }

        let provider = self.provider.clone();
        let active_devices = self.active_devices.clone();
        let event_sender = self.event_sender.clone();
        let monitoring = self.is_monitoring.clone();

        *is_monitoring = true;
        drop(is_monitoring);

        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if !*monitoring.read().await {
                    break;
                }
                match scan_external(provider.as_ref()) {
                    Ok(devices) => {
                        let mut active = active_devices.write().await;
                        diff_devices(&mut active, devices, &event_sender);
                    }
                    Err(e) => log::warn!("External camera scan failed: {}", e),
                }
            }
            log::debug!("External camera monitoring task exited");
        });

        // a stopped loop may still be sleeping
        if let Some(previous) = self.task.lock().await.replace(handle) {
            previous.abort();
        }

        Ok(())
    }

    /// Stop monitoring for device changes
    pub async fn stop_monitoring(&self) -> Result<(), CameraError> {
        let mut is_monitoring = self.is_monitoring.write().await;
        if !*is_monitoring {
            return Ok(());
        }

        log::info!("Stopping external camera monitoring");
        *is_monitoring = false;
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }

    pub async fn is_monitoring(&self) -> bool {
        *self.is_monitoring.read().await
    }

    /// Scan once and emit events for any change since the last scan.
    pub async fn scan_now(&self) -> Result<(), CameraError> {
        let devices = scan_external(self.provider.as_ref())?;
        let mut active = self.active_devices.write().await;
        diff_devices(&mut active, devices, &self.event_sender);
        Ok(())
    }

    /// Get next device event (non-blocking)
    pub async fn poll_event(&self) -> Option<DeviceEvent> {
        let mut rx = self.event_receiver.write().await;
        rx.try_recv().ok()
    }

    /// Wait for next device event
    pub async fn wait_for_event(&self) -> Option<DeviceEvent> {
        let mut rx = self.event_receiver.write().await;
        rx.recv().await
    }

    /// Get list of currently connected external devices
    pub async fn get_active_devices(&self) -> Vec<RawDeviceInfo> {
        let devices = self.active_devices.read().await;
        let mut list: Vec<RawDeviceInfo> = devices.values().cloned().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }
}

fn scan_external(provider: &dyn CapabilityProvider) -> Result<Vec<RawDeviceInfo>, CameraError> {
    Ok(provider
        .list_devices()?
        .into_iter()
        .filter(|d| d.facing.camera_type() == CameraType::External)
        .collect())
}

fn diff_devices(
    active: &mut HashMap<String, RawDeviceInfo>,
    new_devices: Vec<RawDeviceInfo>,
    event_sender: &mpsc::UnboundedSender<DeviceEvent>,
) {
    let mut old_ids: Vec<String> = active.keys().cloned().collect();
    old_ids.sort();
    let new_ids: Vec<String> = new_devices.iter().map(|d| d.id.clone()).collect();

    // Detect disconnections
    for old_id in &old_ids {
        if !new_ids.contains(old_id) {
            log::info!("Device disconnected: {}", old_id);
            let _ = event_sender.send(DeviceEvent::Disconnected(old_id.clone()));
        }
    }

    // Detect connections
    for device in new_devices {
        if !old_ids.contains(&device.id) {
            log::info!("Device connected: {}", device.id);
            let _ = event_sender.send(DeviceEvent::Connected(device.id.clone()));
        }
        active.insert(device.id.clone(), device);
    }

    // Remove disconnected devices
    active.retain(|id, _| new_ids.contains(id));
}
