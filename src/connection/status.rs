// Device liveness status shared between the owner of a device and its handles

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    Disconnected = 0,
    Connected = 1,
    /// The last send failed; the device may come back
    Error = 2,
    /// Closed by its owner; terminal
    Closed = 3,
}

impl From<u8> for DeviceStatus {
    fn from(value: u8) -> Self {
        match value {
            1 => DeviceStatus::Connected,
            2 => DeviceStatus::Error,
            3 => DeviceStatus::Closed,
            _ => DeviceStatus::Disconnected,
        }
    }
}

/// Atomic status cell, cloned into every handle of the same device
#[derive(Debug, Clone)]
pub struct AtomicDeviceStatus {
    inner: Arc<AtomicU8>,
}

impl AtomicDeviceStatus {
    pub fn new(status: DeviceStatus) -> Self {
        Self {
            inner: Arc::new(AtomicU8::new(status as u8)),
        }
    }

    pub fn get(&self) -> DeviceStatus {
        DeviceStatus::from(self.inner.load(Ordering::Acquire))
    }

    /// Closed is sticky: once a device is closed no later store revives it
    pub fn set(&self, status: DeviceStatus) {
        let _ = self
            .inner
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if current == DeviceStatus::Closed as u8 {
                    None
                } else {
                    Some(status as u8)
                }
            });
    }
}

impl Default for AtomicDeviceStatus {
    fn default() -> Self {
        Self::new(DeviceStatus::Disconnected)
    }
}
