// MIDI Input - incoming keyboard messages forwarded to a callback

use crate::midi::device::DeviceError;
use crate::midi::event::MidiMessage;
use midir::{MidiInput as MidirInput, MidiInputConnection};

/// Open input connection; dropping it closes the port
pub struct MidiInput {
    port_name: String,
    _connection: MidiInputConnection<()>,
}

impl MidiInput {
    /// Connect to the port with the given name, or the first port when `None`.
    ///
    /// The callback runs on midir's thread; it receives every message that
    /// parses as a channel voice message.
    pub fn connect<F>(port_name: Option<&str>, mut callback: F) -> Result<Self, DeviceError>
    where
        F: FnMut(MidiMessage) + Send + 'static,
    {
        let mut midi_in =
            MidirInput::new("keystyle").map_err(|e| DeviceError::Init(e.to_string()))?;
        midi_in.ignore(midir::Ignore::All);

        let ports = midi_in.ports();
        for (i, port) in ports.iter().enumerate() {
            if let Ok(name) = midi_in.port_name(port) {
                tracing::debug!(index = i, port = %name, "MIDI input port available");
            }
        }

        let port = match port_name {
            Some(wanted) => ports
                .iter()
                .find(|p| {
                    midi_in
                        .port_name(p)
                        .map(|name| name == wanted)
                        .unwrap_or(false)
                })
                .ok_or_else(|| DeviceError::PortNotFound(wanted.to_string()))?,
            None => ports.first().ok_or(DeviceError::NoPort)?,
        };

        let name = midi_in
            .port_name(port)
            .unwrap_or_else(|_| "Unknown".to_string());

        let connection = midi_in
            .connect(
                port,
                "keystyle-input",
                move |_timestamp, bytes, _| {
                    if let Some(message) = MidiMessage::from_bytes(bytes) {
                        callback(message);
                    }
                },
                (),
            )
            .map_err(|e| DeviceError::Connect(e.to_string()))?;

        tracing::info!(port = %name, "MIDI input connected");

        Ok(Self {
            port_name: name,
            _connection: connection,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}
