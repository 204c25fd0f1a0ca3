// MIDI devices - port listing, output sinks and revocable output handles

use crate::connection::status::{AtomicDeviceStatus, DeviceStatus};
use crate::midi::event::MidiMessage;
use midir::{MidiInput as MidirInput, MidiOutput as MidirOutput, MidiOutputConnection};
use std::sync::{Arc, Mutex, Weak};
use std::time::Instant;

const CLIENT_NAME: &str = "keystyle";

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("MIDI initialisation failed: {0}")]
    Init(String),

    #[error("no MIDI port named '{0}'")]
    PortNotFound(String),

    #[error("no MIDI port available")]
    NoPort,

    #[error("MIDI connection failed: {0}")]
    Connect(String),

    #[error("MIDI send failed: {0}")]
    Send(String),

    #[error("output device is closed")]
    Closed,
}

#[derive(Clone, Debug)]
pub struct MidiDeviceInfo {
    pub id: String,
    pub name: String,
    pub is_default: bool,
}

/// Enumerates the MIDI ports of the host
pub struct MidiDeviceManager;

impl MidiDeviceManager {
    pub fn new() -> Self {
        Self
    }

    pub fn list_input_ports(&self) -> Vec<MidiDeviceInfo> {
        let Ok(midi_in) = MidirInput::new(CLIENT_NAME) else {
            return Vec::new();
        };
        midi_in
            .ports()
            .iter()
            .enumerate()
            .filter_map(|(index, port)| {
                midi_in.port_name(port).ok().map(|name| MidiDeviceInfo {
                    id: format!("midi_in_{}", index),
                    name,
                    is_default: index == 0,
                })
            })
            .collect()
    }

    pub fn list_output_ports(&self) -> Vec<MidiDeviceInfo> {
        let Ok(midi_out) = MidirOutput::new(CLIENT_NAME) else {
            return Vec::new();
        };
        midi_out
            .ports()
            .iter()
            .enumerate()
            .filter_map(|(index, port)| {
                midi_out.port_name(port).ok().map(|name| MidiDeviceInfo {
                    id: format!("midi_out_{}", index),
                    name,
                    is_default: index == 0,
                })
            })
            .collect()
    }
}

impl Default for MidiDeviceManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Anything that accepts channel messages "now"
pub trait MidiOutput: Send {
    fn send(&mut self, message: &MidiMessage) -> Result<(), DeviceError>;

    fn all_notes_off(&mut self, channel: u8) -> Result<(), DeviceError> {
        self.send(&MidiMessage::all_notes_off(channel))
    }

    fn name(&self) -> &str;
}

/// Output port opened through midir
pub struct MidirOutputPort {
    name: String,
    connection: MidiOutputConnection,
}

impl MidirOutputPort {
    /// Open the port with the given name, or the first port when `None`
    pub fn open(port_name: Option<&str>) -> Result<Self, DeviceError> {
        let midi_out =
            MidirOutput::new(CLIENT_NAME).map_err(|e| DeviceError::Init(e.to_string()))?;
        let ports = midi_out.ports();

        let port = match port_name {
            Some(wanted) => ports
                .iter()
                .find(|p| {
                    midi_out
                        .port_name(p)
                        .map(|name| name == wanted)
                        .unwrap_or(false)
                })
                .ok_or_else(|| DeviceError::PortNotFound(wanted.to_string()))?,
            None => ports.first().ok_or(DeviceError::NoPort)?,
        };

        let name = midi_out
            .port_name(port)
            .unwrap_or_else(|_| "Unknown".to_string());
        let connection = midi_out
            .connect(port, "keystyle-output")
            .map_err(|e| DeviceError::Connect(e.to_string()))?;

        tracing::info!(port = %name, "MIDI output connected");
        Ok(Self { name, connection })
    }
}

impl MidiOutput for MidirOutputPort {
    fn send(&mut self, message: &MidiMessage) -> Result<(), DeviceError> {
        self.connection
            .send(&message.to_bytes())
            .map_err(|e| DeviceError::Send(e.to_string()))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// One message seen by a [`CaptureOutput`]
#[derive(Debug, Clone, Copy)]
pub struct CapturedMessage {
    pub message: MidiMessage,
    pub at: Instant,
}

/// In-memory sink recording everything it receives
///
/// Clones share the same log, so a test can keep one clone while the engine
/// owns the other.
#[derive(Clone, Default)]
pub struct CaptureOutput {
    log: Arc<Mutex<Vec<CapturedMessage>>>,
}

impl CaptureOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<MidiMessage> {
        self.captured().into_iter().map(|c| c.message).collect()
    }

    pub fn captured(&self) -> Vec<CapturedMessage> {
        match self.log.lock() {
            Ok(log) => log.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn clear(&self) {
        if let Ok(mut log) = self.log.lock() {
            log.clear();
        }
    }
}

impl MidiOutput for CaptureOutput {
    fn send(&mut self, message: &MidiMessage) -> Result<(), DeviceError> {
        let mut log = self.log.lock().map_err(|_| DeviceError::Closed)?;
        log.push(CapturedMessage {
            message: *message,
            at: Instant::now(),
        });
        Ok(())
    }

    fn name(&self) -> &str {
        "capture"
    }
}

type SharedOutput = Arc<Mutex<Box<dyn MidiOutput>>>;

/// Owner of an output device
///
/// Engines never hold this; they get an [`OutputHandle`] which stops working
/// as soon as the owner closes or drops the device.
pub struct OutputDevice {
    inner: Option<SharedOutput>,
    status: AtomicDeviceStatus,
}

impl OutputDevice {
    pub fn new(output: impl MidiOutput + 'static) -> Self {
        let output: Box<dyn MidiOutput> = Box::new(output);
        Self {
            inner: Some(Arc::new(Mutex::new(output))),
            status: AtomicDeviceStatus::new(DeviceStatus::Connected),
        }
    }

    pub fn handle(&self) -> OutputHandle {
        OutputHandle {
            inner: self.inner.as_ref().map(Arc::downgrade).unwrap_or_default(),
            status: self.status.clone(),
        }
    }

    pub fn status(&self) -> DeviceStatus {
        self.status.get()
    }

    /// Close the device; every handle fails from now on
    pub fn close(&mut self) {
        self.status.set(DeviceStatus::Closed);
        if let Some(inner) = self.inner.take() {
            tracing::info!("MIDI output closed");
            drop(inner);
        }
    }
}

impl Drop for OutputDevice {
    fn drop(&mut self) {
        self.status.set(DeviceStatus::Closed);
    }
}

/// Non-owning, revocable handle to an output device
///
/// Liveness is checked before every use; a dead handle reports
/// [`DeviceError::Closed`] instead of touching the device.
#[derive(Clone)]
pub struct OutputHandle {
    inner: Weak<Mutex<Box<dyn MidiOutput>>>,
    status: AtomicDeviceStatus,
}

impl OutputHandle {
    /// A handle that was never attached to a device
    pub fn detached() -> Self {
        Self {
            inner: Weak::<Mutex<Box<dyn MidiOutput>>>::new(),
            status: AtomicDeviceStatus::new(DeviceStatus::Disconnected),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.status.get() != DeviceStatus::Closed && self.inner.strong_count() > 0
    }

    pub fn send(&self, message: &MidiMessage) -> Result<(), DeviceError> {
        self.with_device(|device| device.send(message))
    }

    /// "All notes off" on channels 1-16
    pub fn all_notes_off(&self) -> Result<(), DeviceError> {
        self.with_device(|device| (1..=16).try_for_each(|channel| device.all_notes_off(channel)))
    }

    fn with_device<R>(
        &self,
        f: impl FnOnce(&mut dyn MidiOutput) -> Result<R, DeviceError>,
    ) -> Result<R, DeviceError> {
        if self.status.get() == DeviceStatus::Closed {
            return Err(DeviceError::Closed);
        }
        let device = self.inner.upgrade().ok_or(DeviceError::Closed)?;
        let mut guard = device.lock().map_err(|_| DeviceError::Closed)?;
        let result = f(&mut **guard);
        match &result {
            Ok(_) => self.status.set(DeviceStatus::Connected),
            Err(e) => {
                tracing::warn!(error = %e, "MIDI output failed");
                self.status.set(DeviceStatus::Error);
            }
        }
        result
    }
}

impl Default for OutputHandle {
    fn default() -> Self {
        Self::detached()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note_on() -> MidiMessage {
        MidiMessage::NoteOn {
            channel: 2,
            note: 60,
            velocity: 100,
        }
    }

    #[test]
    fn test_handle_reaches_device() {
        let capture = CaptureOutput::new();
        let device = OutputDevice::new(capture.clone());
        let handle = device.handle();

        assert!(handle.is_alive());
        handle.send(&note_on()).unwrap();
        assert_eq!(capture.messages(), vec![note_on()]);
    }

    #[test]
    fn test_handle_fails_after_close() {
        let capture = CaptureOutput::new();
        let mut device = OutputDevice::new(capture.clone());
        let handle = device.handle();

        device.close();

        assert!(!handle.is_alive());
        assert!(matches!(handle.send(&note_on()), Err(DeviceError::Closed)));
        assert!(capture.messages().is_empty());
    }

    #[test]
    fn test_handle_fails_after_drop() {
        let device = OutputDevice::new(CaptureOutput::new());
        let handle = device.handle();
        drop(device);

        assert!(!handle.is_alive());
        assert!(handle.all_notes_off().is_err());
    }

    #[test]
    fn test_detached_handle() {
        let handle = OutputHandle::detached();
        assert!(!handle.is_alive());
        assert!(matches!(handle.send(&note_on()), Err(DeviceError::Closed)));
    }

    #[test]
    fn test_all_notes_off_covers_sixteen_channels() {
        let capture = CaptureOutput::new();
        let device = OutputDevice::new(capture.clone());
        device.handle().all_notes_off().unwrap();

        let channels: Vec<u8> = capture.messages().iter().map(|m| m.channel()).collect();
        assert_eq!(channels, (1..=16).collect::<Vec<u8>>());
    }
}
