// MIDI message types - channel-addressed messages exchanged with devices and sequences

/// MIDI channel reserved for percussion (General MIDI drum kit), 1-based
pub const PERCUSSION_CHANNEL: u8 = 10;

/// Controller number for channel volume
pub const CC_CHANNEL_VOLUME: u8 = 7;

/// Controller number for "all notes off"
pub const CC_ALL_NOTES_OFF: u8 = 123;

/// A channel voice message.
///
/// Channels are 1-based (1..=16) everywhere in this crate, matching the way
/// musicians and the track catalog talk about them. Conversion to the 4-bit
/// wire nibble happens only in `from_bytes` / `to_bytes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    PitchBend { channel: u8, value: i16 },
}

impl MidiMessage {
    /// Parse a raw MIDI message
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (&status, data) = bytes.split_first()?;
        if status < 0x80 {
            return None;
        }

        let channel = (status & 0x0F) + 1;
        let message_type = status & 0xF0;

        match message_type {
            0x90 => {
                let &[note, velocity, ..] = data else {
                    return None;
                };
                // Velocity 0 = Note Off
                if velocity == 0 {
                    Some(MidiMessage::NoteOff {
                        channel,
                        note,
                        velocity: 0,
                    })
                } else {
                    Some(MidiMessage::NoteOn {
                        channel,
                        note,
                        velocity,
                    })
                }
            }
            0x80 => {
                let &[note, velocity, ..] = data else {
                    return None;
                };
                Some(MidiMessage::NoteOff {
                    channel,
                    note,
                    velocity,
                })
            }
            0xB0 => {
                let &[controller, value, ..] = data else {
                    return None;
                };
                Some(MidiMessage::ControlChange {
                    channel,
                    controller,
                    value,
                })
            }
            0xC0 => {
                let program = *data.first()?;
                Some(MidiMessage::ProgramChange { channel, program })
            }
            0xE0 => {
                let &[lsb, msb, ..] = data else {
                    return None;
                };
                let value = ((msb as i16) << 7) | lsb as i16;
                Some(MidiMessage::PitchBend { channel, value })
            }
            _ => None,
        }
    }

    /// Encode to raw bytes, ready for an output port
    pub fn to_bytes(&self) -> Vec<u8> {
        let nibble = |channel: u8| channel.clamp(1, 16) - 1;
        match *self {
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => vec![0x90 | nibble(channel), note & 0x7F, velocity & 0x7F],
            MidiMessage::NoteOff {
                channel,
                note,
                velocity,
            } => vec![0x80 | nibble(channel), note & 0x7F, velocity & 0x7F],
            MidiMessage::ControlChange {
                channel,
                controller,
                value,
            } => vec![0xB0 | nibble(channel), controller & 0x7F, value & 0x7F],
            MidiMessage::ProgramChange { channel, program } => {
                vec![0xC0 | nibble(channel), program & 0x7F]
            }
            MidiMessage::PitchBend { channel, value } => {
                let value = value.clamp(0, 0x3FFF) as u16;
                vec![
                    0xE0 | nibble(channel),
                    (value & 0x7F) as u8,
                    ((value >> 7) & 0x7F) as u8,
                ]
            }
        }
    }

    /// "All notes off" controller message for one channel
    pub fn all_notes_off(channel: u8) -> Self {
        MidiMessage::ControlChange {
            channel,
            controller: CC_ALL_NOTES_OFF,
            value: 0,
        }
    }

    pub fn channel(&self) -> u8 {
        match *self {
            MidiMessage::NoteOn { channel, .. }
            | MidiMessage::NoteOff { channel, .. }
            | MidiMessage::ControlChange { channel, .. }
            | MidiMessage::ProgramChange { channel, .. }
            | MidiMessage::PitchBend { channel, .. } => channel,
        }
    }

    /// Same message, readdressed to another channel
    pub fn with_channel(self, new_channel: u8) -> Self {
        match self {
            MidiMessage::NoteOn { note, velocity, .. } => MidiMessage::NoteOn {
                channel: new_channel,
                note,
                velocity,
            },
            MidiMessage::NoteOff { note, velocity, .. } => MidiMessage::NoteOff {
                channel: new_channel,
                note,
                velocity,
            },
            MidiMessage::ControlChange {
                controller, value, ..
            } => MidiMessage::ControlChange {
                channel: new_channel,
                controller,
                value,
            },
            MidiMessage::ProgramChange { program, .. } => MidiMessage::ProgramChange {
                channel: new_channel,
                program,
            },
            MidiMessage::PitchBend { value, .. } => MidiMessage::PitchBend {
                channel: new_channel,
                value,
            },
        }
    }

    /// `from_bytes` already folds velocity-0 note-ons into `NoteOff`, so the
    /// variant alone decides
    pub fn is_note_on(&self) -> bool {
        matches!(self, MidiMessage::NoteOn { .. })
    }

    pub fn is_note_off(&self) -> bool {
        matches!(self, MidiMessage::NoteOff { .. })
    }

    /// Note on or note off
    pub fn is_note(&self) -> bool {
        matches!(self, MidiMessage::NoteOn { .. } | MidiMessage::NoteOff { .. })
    }

    pub fn is_program_change(&self) -> bool {
        matches!(self, MidiMessage::ProgramChange { .. })
    }

    pub fn note_number(&self) -> Option<u8> {
        match *self {
            MidiMessage::NoteOn { note, .. } | MidiMessage::NoteOff { note, .. } => Some(note),
            _ => None,
        }
    }

    pub fn velocity(&self) -> Option<u8> {
        match *self {
            MidiMessage::NoteOn { velocity, .. } | MidiMessage::NoteOff { velocity, .. } => {
                Some(velocity)
            }
            _ => None,
        }
    }

    /// Rewrite the note number; no-op for non-note messages
    pub fn set_note_number(&mut self, new_note: u8) {
        if let MidiMessage::NoteOn { note, .. } | MidiMessage::NoteOff { note, .. } = self {
            *note = new_note.min(127);
        }
    }

    /// Rewrite the velocity; no-op for non-note messages
    pub fn set_velocity(&mut self, new_velocity: u8) {
        if let MidiMessage::NoteOn { velocity, .. } | MidiMessage::NoteOff { velocity, .. } = self
        {
            *velocity = new_velocity.min(127);
        }
    }
}
