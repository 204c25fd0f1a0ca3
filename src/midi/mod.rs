// MIDI boundary: messages, devices and keyboard input

pub mod device;
pub mod event;
pub mod input;

pub use device::{
    CaptureOutput, CapturedMessage, DeviceError, MidiDeviceInfo, MidiDeviceManager, MidiOutput,
    MidirOutputPort, OutputDevice, OutputHandle,
};
pub use event::{CC_ALL_NOTES_OFF, CC_CHANNEL_VOLUME, MidiMessage, PERCUSSION_CHANNEL};
pub use input::MidiInput;
