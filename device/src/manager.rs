use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use snafu::ensure;

use crate::device::ComputeDevice;
use crate::error::{InvalidDeviceSnafu, Result, TooManyDevicesSnafu};
use crate::host::HostDevice;

/// Upper bound on the number of devices a manager can hold.
pub const MAX_DEVICES: usize = 16;

/// Global manager configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Number of host reference devices to register.
    pub host_devices: usize,
    /// Device made active at startup.
    pub active_device: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self { host_devices: 1, active_device: 0 }
    }
}

impl ManagerConfig {
    /// Read configuration from `BILAT_HOST_DEVICES` and `BILAT_DEVICE`.
    ///
    /// Unparsable values fall back to the defaults; the host device count is
    /// clamped to `1..=MAX_DEVICES`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let host_devices = std::env::var("BILAT_HOST_DEVICES")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .map_or(defaults.host_devices, |n| n.clamp(1, MAX_DEVICES));
        let active_device = std::env::var("BILAT_DEVICE")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(defaults.active_device);
        Self { host_devices, active_device }
    }
}

/// Owns the registered devices and tracks which one is active.
///
/// Device identifiers are dense: the n-th registered device has id `n`.
#[derive(Debug, Default)]
pub struct DeviceManager {
    devices: RwLock<Vec<Arc<dyn ComputeDevice>>>,
    active: AtomicUsize,
}

impl DeviceManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager with `count` host reference devices.
    pub fn with_host_devices(count: usize) -> Result<Self> {
        let manager = Self::new();
        for id in 0..count {
            manager.register(Arc::new(HostDevice::new(id)))?;
        }
        Ok(manager)
    }

    /// Build a manager from configuration.
    ///
    /// An out-of-range `active_device` leaves device 0 active.
    pub fn from_config(config: &ManagerConfig) -> Result<Self> {
        let manager = Self::with_host_devices(config.host_devices)?;
        if let Err(error) = manager.set_active_device(config.active_device) {
            tracing::warn!(%error, "ignoring configured active device");
        }
        Ok(manager)
    }

    /// Register a device. Its id must equal the next free slot.
    pub fn register(&self, device: Arc<dyn ComputeDevice>) -> Result<usize> {
        let mut devices = self.devices.write();
        ensure!(devices.len() < MAX_DEVICES, TooManyDevicesSnafu { max: MAX_DEVICES });
        let id = devices.len();
        ensure!(device.id() == id, InvalidDeviceSnafu { id: device.id(), count: id });
        tracing::debug!(device.id = id, device.name = device.name(), "registered device");
        devices.push(device);
        Ok(id)
    }

    pub fn device_count(&self) -> usize {
        self.devices.read().len()
    }

    /// Look up a device by id.
    pub fn device(&self, id: usize) -> Result<Arc<dyn ComputeDevice>> {
        let devices = self.devices.read();
        devices.get(id).cloned().ok_or_else(|| InvalidDeviceSnafu { id, count: devices.len() }.build())
    }

    pub fn set_active_device(&self, id: usize) -> Result<()> {
        let count = self.device_count();
        ensure!(id < count, InvalidDeviceSnafu { id, count });
        self.active.store(id, Ordering::Release);
        Ok(())
    }

    pub fn active_device_id(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn active_device(&self) -> Result<Arc<dyn ComputeDevice>> {
        self.device(self.active_device_id())
    }
}

static MANAGER: Lazy<DeviceManager> = Lazy::new(|| {
    let config = ManagerConfig::from_env();
    DeviceManager::from_config(&config).unwrap_or_else(|error| {
        tracing::error!(%error, "falling back to a single host device");
        DeviceManager::from_config(&ManagerConfig::default()).unwrap_or_default()
    })
});

/// Get the global device manager.
pub fn manager() -> &'static DeviceManager {
    &MANAGER
}
