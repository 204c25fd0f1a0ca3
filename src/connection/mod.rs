// Connection module - device liveness shared between owner and handles

pub mod status;

pub use status::{AtomicDeviceStatus, DeviceStatus};
