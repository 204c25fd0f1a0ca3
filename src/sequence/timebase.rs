// Time-base conversion - standard MIDI files (ticks) to absolute seconds

use crate::midi::event::{MidiMessage, PERCUSSION_CHANNEL};
use crate::sequence::event::MidiSequence;
use crate::track::entry::TrackType;
use midly::num::{u4, u7, u14, u15, u24, u28};
use midly::{Format, Header, MetaMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Tempo assumed when a file carries no usable tempo meta-event
pub const DEFAULT_BPM: f64 = 120.0;

/// Resolution assumed when a file reports a non-positive one
pub const DEFAULT_TICKS_PER_QUARTER: u16 = 960;

#[derive(Debug, thiserror::Error)]
pub enum MidiFileError {
    #[error("cannot read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed MIDI file: {0}")]
    Parse(String),

    #[error("SMPTE timecode timing is not supported")]
    UnsupportedTiming,

    #[error("cannot write MIDI file: {0}")]
    Write(String),
}

/// A channel message at an absolute tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickEvent {
    pub message: MidiMessage,
    pub tick: u64,
}

/// Tick-based events of one file track, in file order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickSequence {
    events: Vec<TickEvent>,
}

impl TickSequence {
    pub fn new(events: Vec<TickEvent>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[TickEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn has_notes(&self) -> bool {
        self.events.iter().any(|e| e.message.is_note())
    }
}

/// One track of a parsed file
#[derive(Debug, Clone)]
pub struct TickTrack {
    /// Index of the track inside the file
    pub index: usize,
    pub name: Option<String>,
    pub events: Arc<TickSequence>,
    pub track_type: TrackType,
}

/// A parsed file, still in ticks
#[derive(Debug, Clone)]
pub struct MidiFileData {
    pub ticks_per_quarter: u16,
    pub original_bpm: f64,
    pub tracks: Vec<TickTrack>,
}

impl MidiFileData {
    /// Tracks carrying at least one note
    pub fn note_tracks(&self) -> impl Iterator<Item = &TickTrack> {
        self.tracks.iter().filter(|t| t.events.has_notes())
    }

    pub fn track(&self, index: usize) -> Option<&TickTrack> {
        self.tracks.iter().find(|t| t.index == index)
    }
}

pub fn load_midi_file(path: impl AsRef<Path>) -> Result<MidiFileData, MidiFileError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| MidiFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let data = parse_midi_bytes(&bytes)?;
    tracing::info!(
        path = %path.display(),
        tracks = data.tracks.len(),
        bpm = data.original_bpm,
        ticks_per_quarter = data.ticks_per_quarter,
        "MIDI file loaded"
    );
    Ok(data)
}

pub fn parse_midi_bytes(bytes: &[u8]) -> Result<MidiFileData, MidiFileError> {
    let smf = Smf::parse(bytes).map_err(|e| MidiFileError::Parse(e.to_string()))?;

    let ticks_per_quarter = match smf.header.timing {
        Timing::Metrical(ticks) if ticks.as_int() > 0 => ticks.as_int(),
        Timing::Metrical(_) => DEFAULT_TICKS_PER_QUARTER,
        Timing::Timecode(_, _) => return Err(MidiFileError::UnsupportedTiming),
    };
    let original_bpm = detect_bpm(&smf);

    let tracks = smf
        .tracks
        .iter()
        .enumerate()
        .map(|(index, track)| {
            let mut tick: u64 = 0;
            let mut name = None;
            let mut events = Vec::new();

            for event in track {
                tick += event.delta.as_int() as u64;
                match event.kind {
                    TrackEventKind::Midi { channel, message } => {
                        if let Some(message) = convert_message(channel.as_int(), message) {
                            events.push(TickEvent { message, tick });
                        }
                    }
                    TrackEventKind::Meta(MetaMessage::TrackName(raw)) if name.is_none() => {
                        name = Some(String::from_utf8_lossy(raw).trim().to_string());
                    }
                    _ => {}
                }
            }

            let events = TickSequence::new(events);
            TickTrack {
                index,
                name: name.filter(|n| !n.is_empty()),
                track_type: detect_track_type(&events),
                events: Arc::new(events),
            }
        })
        .collect();

    Ok(MidiFileData {
        ticks_per_quarter,
        original_bpm,
        tracks,
    })
}

/// Authored tempo from the first tempo meta-event of the first track
pub fn detect_bpm(smf: &Smf) -> f64 {
    let tempo = smf.tracks.first().and_then(|track| {
        track.iter().find_map(|event| match event.kind {
            TrackEventKind::Meta(MetaMessage::Tempo(micros_per_quarter)) => {
                Some(micros_per_quarter.as_int())
            }
            _ => None,
        })
    });

    match tempo {
        Some(micros) if micros > 0 => {
            let bpm = 60_000_000.0 / micros as f64;
            if bpm.is_finite() && bpm > 0.0 {
                bpm
            } else {
                DEFAULT_BPM
            }
        }
        _ => DEFAULT_BPM,
    }
}

/// Any note on channel 10 makes a percussion track
pub fn detect_track_type(events: &TickSequence) -> TrackType {
    let percussion = events
        .events()
        .iter()
        .any(|e| e.message.is_note() && e.message.channel() == PERCUSSION_CHANNEL);
    if percussion {
        TrackType::Percussion
    } else {
        TrackType::Melodic
    }
}

pub fn seconds_per_tick(bpm: f64, ticks_per_quarter: u16) -> f64 {
    let ticks_per_quarter = if ticks_per_quarter == 0 {
        DEFAULT_TICKS_PER_QUARTER
    } else {
        ticks_per_quarter
    };
    (60.0 / bpm) / ticks_per_quarter as f64
}

pub fn ticks_per_second(bpm: f64, ticks_per_quarter: u16) -> f64 {
    1.0 / seconds_per_tick(bpm, ticks_per_quarter)
}

/// Convert a tick sequence to seconds at `bpm`.
///
/// Takes the tick sequence by type, so it can only ever run against freshly
/// parsed ticks, never against an already converted sequence.
pub fn ticks_to_seconds(ticks: &TickSequence, bpm: f64, ticks_per_quarter: u16) -> MidiSequence {
    let spt = seconds_per_tick(bpm, ticks_per_quarter);
    let mut sequence = MidiSequence::new();
    for event in ticks.events() {
        sequence.push(event.message, event.tick as f64 * spt);
    }
    sequence.update_matched_pairs();
    sequence
}

/// Seconds to the nearest tick at `bpm`
pub fn seconds_to_ticks(seconds: f64, bpm: f64, ticks_per_quarter: u16) -> u64 {
    (seconds.max(0.0) / seconds_per_tick(bpm, ticks_per_quarter)).round() as u64
}

/// Tempo meta value for `bpm`, in whole microseconds per quarter note
pub fn tempo_micros(bpm: f64) -> u32 {
    (60_000_000.0 / bpm).round().clamp(1.0, 16_777_215.0) as u32
}

/// The tempo a file written at `bpm` reads back as
pub fn stored_bpm(bpm: f64) -> f64 {
    60_000_000.0 / tempo_micros(bpm) as f64
}

/// Resolution as written to a header (15 bits, non-zero)
pub fn writable_ticks_per_quarter(ticks_per_quarter: u16) -> u16 {
    if ticks_per_quarter == 0 || ticks_per_quarter > 0x7FFF {
        DEFAULT_TICKS_PER_QUARTER
    } else {
        ticks_per_quarter
    }
}

/// Encode tracks as a format-1 file: a dedicated tempo track first, then one
/// file track per input track.
pub fn encode_midi_file(
    tracks: &[TickTrack],
    ticks_per_quarter: u16,
    bpm: f64,
) -> Result<Vec<u8>, MidiFileError> {
    let ticks_per_quarter = writable_ticks_per_quarter(ticks_per_quarter);
    let micros_per_quarter = tempo_micros(bpm);

    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(ticks_per_quarter)),
    ));

    smf.tracks.push(vec![
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(micros_per_quarter))),
        },
        end_of_track(),
    ]);

    for track in tracks {
        let mut file_track = Vec::with_capacity(track.events.len() + 2);
        if let Some(name) = &track.name {
            file_track.push(TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes())),
            });
        }

        let mut events: Vec<&TickEvent> = track.events.events().iter().collect();
        events.sort_by_key(|e| e.tick);

        let mut last_tick: u64 = 0;
        for event in events {
            let delta = (event.tick - last_tick).min(0x0FFF_FFFF) as u32;
            let (channel, message) = to_midly(&event.message);
            file_track.push(TrackEvent {
                delta: u28::new(delta),
                kind: TrackEventKind::Midi { channel, message },
            });
            last_tick = event.tick;
        }
        file_track.push(end_of_track());
        smf.tracks.push(file_track);
    }

    let mut buffer = Vec::new();
    smf.write_std(&mut buffer)
        .map_err(|e| MidiFileError::Write(e.to_string()))?;
    Ok(buffer)
}

pub fn write_midi_file(
    path: impl AsRef<Path>,
    tracks: &[TickTrack],
    ticks_per_quarter: u16,
    bpm: f64,
) -> Result<(), MidiFileError> {
    let path = path.as_ref();
    let bytes = encode_midi_file(tracks, ticks_per_quarter, bpm)?;
    std::fs::write(path, bytes).map_err(|source| MidiFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), tracks = tracks.len(), bpm, "MIDI file written");
    Ok(())
}

fn end_of_track() -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    }
}

fn convert_message(channel: u8, message: midly::MidiMessage) -> Option<MidiMessage> {
    let channel = channel + 1;
    match message {
        midly::MidiMessage::NoteOn { key, vel } if vel.as_int() == 0 => {
            Some(MidiMessage::NoteOff {
                channel,
                note: key.as_int(),
                velocity: 0,
            })
        }
        midly::MidiMessage::NoteOn { key, vel } => Some(MidiMessage::NoteOn {
            channel,
            note: key.as_int(),
            velocity: vel.as_int(),
        }),
        midly::MidiMessage::NoteOff { key, vel } => Some(MidiMessage::NoteOff {
            channel,
            note: key.as_int(),
            velocity: vel.as_int(),
        }),
        midly::MidiMessage::Controller { controller, value } => {
            Some(MidiMessage::ControlChange {
                channel,
                controller: controller.as_int(),
                value: value.as_int(),
            })
        }
        midly::MidiMessage::ProgramChange { program } => Some(MidiMessage::ProgramChange {
            channel,
            program: program.as_int(),
        }),
        midly::MidiMessage::PitchBend { bend } => Some(MidiMessage::PitchBend {
            channel,
            value: bend.0.as_int() as i16,
        }),
        _ => None,
    }
}

fn to_midly(message: &MidiMessage) -> (u4, midly::MidiMessage) {
    let channel = u4::new(message.channel().clamp(1, 16) - 1);
    let message = match *message {
        MidiMessage::NoteOn { note, velocity, .. } => midly::MidiMessage::NoteOn {
            key: u7::new(note & 0x7F),
            vel: u7::new(velocity & 0x7F),
        },
        MidiMessage::NoteOff { note, velocity, .. } => midly::MidiMessage::NoteOff {
            key: u7::new(note & 0x7F),
            vel: u7::new(velocity & 0x7F),
        },
        MidiMessage::ControlChange {
            controller, value, ..
        } => midly::MidiMessage::Controller {
            controller: u7::new(controller & 0x7F),
            value: u7::new(value & 0x7F),
        },
        MidiMessage::ProgramChange { program, .. } => midly::MidiMessage::ProgramChange {
            program: u7::new(program & 0x7F),
        },
        MidiMessage::PitchBend { value, .. } => midly::MidiMessage::PitchBend {
            bend: midly::PitchBend(u14::new(value.clamp(0, 0x3FFF) as u16)),
        },
    };
    (channel, message)
}
