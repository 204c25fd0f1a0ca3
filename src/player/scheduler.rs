// Multi-track player - dispatches several channel-assigned sequences against a wall clock

use crate::catalog::style::StyleSection;
use crate::messaging::channels::{EventReceiver, EventSender, LatestValue, event_channel};
use crate::midi::device::OutputHandle;
use crate::midi::event::{CC_CHANNEL_VOLUME, MidiMessage};
use crate::player::channels::ChannelPolicy;
use crate::player::listeners::{ListenerId, ListenerRegistry, PlayerEvent};
use crate::sequence::event::{MidiSequence, SYNTHETIC_EVENT, TimedEvent};
use crate::sequence::timebase::DEFAULT_BPM;
use crate::timing::timer::{PeriodicTimer, TimerControl};
use crate::track::entry::{TrackEntry, TrackType};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerConfig {
    pub timer_period: Duration,
    /// How long before the first note the volume/program events go out
    pub lead_in: Duration,
    pub channels: ChannelPolicy,
    pub event_queue_capacity: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            timer_period: Duration::from_millis(10),
            lead_in: Duration::from_millis(5),
            channels: ChannelPolicy::default(),
            event_queue_capacity: 1024,
        }
    }
}

/// Filtered copy of one track plus its cursor
#[derive(Debug, Clone)]
struct TrackPlayback {
    uuid: Uuid,
    revision: u64,
    channel: u8,
    track_type: TrackType,
    /// Whether volume/program events were injected at collection
    lead_in: bool,
    sequence: MidiSequence,
    next_event_index: usize,
}

impl TrackPlayback {
    fn is_done(&self) -> bool {
        self.next_event_index >= self.sequence.len()
    }

    fn resync(&mut self, elapsed: f64) {
        self.next_event_index = self.sequence.find_next_event_index(elapsed);
    }
}

/// Everything the timer thread touches
#[derive(Debug)]
struct PlayerState {
    tracks: Vec<TrackPlayback>,
    bpm: f64,
    playing: bool,
    /// `elapsed = anchor_elapsed + (now - anchor)`
    anchor: Instant,
    anchor_elapsed: f64,
    /// Playback stops once elapsed passes this
    end_time: Option<f64>,
    percussion_channel: u8,
}

impl PlayerState {
    fn elapsed_at(&self, now: Instant) -> f64 {
        if !self.playing {
            return self.anchor_elapsed;
        }
        self.anchor_elapsed + now.saturating_duration_since(self.anchor).as_secs_f64()
    }

    fn reanchor(&mut self, now: Instant, elapsed: f64) {
        self.anchor = now;
        self.anchor_elapsed = elapsed.max(0.0);
    }
}

/// Newest beat and position, overwritten every tick
#[derive(Clone, Default)]
struct Progress {
    beats: LatestValue,
    position: LatestValue,
}

impl Progress {
    fn set(&self, beats: f64, position: f64) {
        self.beats.set(beats);
        self.position.set(position);
    }

    fn clear(&self) {
        self.beats.clear();
        self.position.clear();
    }
}

/// One timer tick: send every due event, report progress, stop at the end.
fn process_tick(
    state: &Mutex<PlayerState>,
    output: &OutputHandle,
    events: &EventSender<PlayerEvent>,
    progress: &Progress,
    now: Instant,
) -> TimerControl {
    let Ok(mut guard) = state.lock() else {
        return TimerControl::Stop;
    };
    let state = &mut *guard;
    if !state.playing {
        return TimerControl::Stop;
    }

    if !output.is_alive() {
        return device_lost(state, events);
    }

    let elapsed = state.elapsed_at(now);
    let percussion_channel = state.percussion_channel;

    // Merge the due events of every track so the output sees them in time order
    loop {
        let mut next: Option<(usize, f64)> = None;
        for (index, track) in state.tracks.iter().enumerate() {
            if let Some(event) = track.sequence.get(track.next_event_index)
                && event.timestamp <= elapsed
                && next.is_none_or(|(_, t)| event.timestamp < t)
            {
                next = Some((index, event.timestamp));
            }
        }
        let Some((index, _)) = next else {
            break;
        };

        let track = &mut state.tracks[index];
        let Some(event) = track.sequence.get(track.next_event_index).copied() else {
            break;
        };
        track.next_event_index += 1;

        if event.message.is_program_change()
            && (track.track_type.is_percussion() || event.message.channel() == percussion_channel)
        {
            tracing::trace!(channel = event.message.channel(), "program change on percussion dropped");
            continue;
        }

        if let Err(e) = output.send(&event.message) {
            tracing::warn!(error = %e, "output send failed");
            return device_lost(state, events);
        }
    }

    progress.set(elapsed * state.bpm / 60.0, elapsed);

    let past_end = state.end_time.is_some_and(|end| elapsed >= end);
    if past_end || state.tracks.iter().all(TrackPlayback::is_done) {
        state.playing = false;
        state.anchor_elapsed = 0.0;
        if let Err(e) = output.all_notes_off() {
            tracing::debug!(error = %e, "notes off after playback failed");
        }
        tracing::info!(elapsed, "playback finished");
        if !events.send(PlayerEvent::PlaybackFinished) {
            tracing::warn!("playback finished event dropped");
        }
        return TimerControl::Stop;
    }

    TimerControl::Continue
}

fn device_lost(state: &mut PlayerState, events: &EventSender<PlayerEvent>) -> TimerControl {
    tracing::warn!("MIDI output lost, stopping playback");
    state.playing = false;
    state.anchor_elapsed = 0.0;
    if !events.send(PlayerEvent::DeviceLost) {
        tracing::warn!("device lost event dropped");
    }
    TimerControl::Stop
}

/// Lead-in events so the synth is configured before the first note
fn inject_lead_in(sequence: &mut MidiSequence, entry: &TrackEntry, channel: u8, lead_in: f64) {
    let Some(first_note) = sequence.iter().find(|e| e.message.is_note_on()) else {
        return;
    };
    let at = (first_note.timestamp - lead_in).max(0.0);

    sequence.push_event(TimedEvent::new(
        MidiMessage::ControlChange {
            channel,
            controller: CC_CHANNEL_VOLUME,
            value: entry.volume.min(127),
        },
        at,
        SYNTHETIC_EVENT,
    ));
    if !entry.track_type.is_percussion() {
        sequence.push_event(TimedEvent::new(
            MidiMessage::ProgramChange {
                channel,
                program: entry.instrument.min(127),
            },
            at,
            SYNTHETIC_EVENT,
        ));
    }
    sequence.sort_and_pair();
}

/// Plays N tracks at once on one output.
///
/// The player owns filtered copies taken at `set_tracks` time. Progress is
/// kept in a latest-value slot and state changes go through an event queue;
/// both are drained by `poll_events` on the owner's thread, where the
/// registered listeners run.
pub struct MultiTrackPlayer {
    state: Arc<Mutex<PlayerState>>,
    output: OutputHandle,
    config: PlayerConfig,
    timer: Option<PeriodicTimer>,
    events_tx: EventSender<PlayerEvent>,
    events_rx: EventReceiver<PlayerEvent>,
    progress: Progress,
    listeners: ListenerRegistry,
    /// Original tempo of the first collected track, for section offsets
    reference_bpm: f64,
}

impl MultiTrackPlayer {
    pub fn new(output: OutputHandle, config: PlayerConfig) -> Self {
        let (events_tx, events_rx) = event_channel(config.event_queue_capacity);
        let state = PlayerState {
            tracks: Vec::new(),
            bpm: DEFAULT_BPM,
            playing: false,
            anchor: Instant::now(),
            anchor_elapsed: 0.0,
            end_time: None,
            percussion_channel: config.channels.percussion,
        };

        Self {
            state: Arc::new(Mutex::new(state)),
            output,
            config,
            timer: None,
            events_tx,
            events_rx,
            progress: Progress::default(),
            listeners: ListenerRegistry::new(),
            reference_bpm: DEFAULT_BPM,
        }
    }

    fn state(&self) -> MutexGuard<'_, PlayerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn post(&self, event: PlayerEvent) {
        if !self.events_tx.send(event) {
            tracing::warn!(?event, "player event dropped");
        }
    }

    /// Copy the note events of `entries`, one channel each.
    ///
    /// Tracks left without events are dropped. Returns how many tracks were
    /// collected.
    pub fn set_tracks<'e>(&mut self, entries: impl IntoIterator<Item = &'e TrackEntry>) -> usize {
        let entries: Vec<&TrackEntry> = entries.into_iter().collect();
        self.collect(&entries, false)
    }

    fn collect(&mut self, entries: &[&TrackEntry], lead_in: bool) -> usize {
        if self.is_playing() {
            self.stop();
        }

        let types: Vec<TrackType> = entries.iter().map(|e| e.track_type).collect();
        let channels = self.config.channels.assign(&types);
        let lead_in_seconds = self.config.lead_in.as_secs_f64();

        let tracks: Vec<TrackPlayback> = entries
            .iter()
            .zip(channels)
            .filter_map(|(entry, channel)| {
                let mut sequence = entry.sequence().filtered_notes(channel);
                if sequence.is_empty() {
                    tracing::debug!(track = %entry.display_name, "no notes, track dropped");
                    return None;
                }
                if lead_in {
                    inject_lead_in(&mut sequence, entry, channel, lead_in_seconds);
                }
                Some(TrackPlayback {
                    uuid: entry.uuid,
                    revision: entry.revision(),
                    channel,
                    track_type: entry.track_type,
                    lead_in,
                    sequence,
                    next_event_index: 0,
                })
            })
            .collect();

        let bpm = entries.first().map_or(DEFAULT_BPM, |e| e.current_bpm());
        self.reference_bpm = entries.first().map_or(DEFAULT_BPM, |e| e.original_bpm());

        let count = tracks.len();
        let mut state = self.state();
        state.tracks = tracks;
        state.bpm = bpm;
        state.anchor_elapsed = 0.0;
        tracing::info!(tracks = count, bpm, "tracks collected");
        count
    }

    /// Regenerate every entry at `user_bpm` from its original ticks, then
    /// collect them with volume/program lead-in events.
    pub fn apply_bpm_change_before_playback<'e>(
        &mut self,
        entries: impl IntoIterator<Item = &'e mut TrackEntry>,
        user_bpm: f64,
    ) -> usize {
        let mut entries: Vec<&mut TrackEntry> = entries.into_iter().collect();
        for entry in entries.iter_mut() {
            entry.set_tempo(user_bpm);
        }
        let entries: Vec<&TrackEntry> = entries.into_iter().map(|e| &*e).collect();
        let count = self.collect(&entries, true);
        self.state().bpm = user_bpm;
        count
    }

    pub fn track_count(&self) -> usize {
        self.state().tracks.len()
    }

    /// Channels in collection order
    pub fn channels(&self) -> Vec<u8> {
        self.state().tracks.iter().map(|t| t.channel).collect()
    }

    /// Copy of the sequence the player holds for track `index`
    pub fn track_sequence(&self, index: usize) -> Option<MidiSequence> {
        self.state().tracks.get(index).map(|t| t.sequence.clone())
    }

    pub fn cursor(&self, index: usize) -> Option<usize> {
        self.state().tracks.get(index).map(|t| t.next_event_index)
    }

    pub fn bpm(&self) -> f64 {
        self.state().bpm
    }

    pub fn is_playing(&self) -> bool {
        self.state().playing
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed_at(Instant::now())
    }

    pub fn elapsed_at(&self, now: Instant) -> f64 {
        self.state().elapsed_at(now)
    }

    /// True when any entry was regenerated after the player copied it
    pub fn is_stale<'e>(&self, entries: impl IntoIterator<Item = &'e TrackEntry>) -> bool {
        let state = self.state();
        entries.into_iter().any(|entry| {
            state
                .tracks
                .iter()
                .any(|t| t.uuid == entry.uuid && t.revision != entry.revision())
        })
    }

    /// Start from zero and run the timer
    pub fn start(&mut self) -> bool {
        self.start_at_offset(0.0)
    }

    /// Start `offset` seconds into the tracks and run the timer
    pub fn start_at_offset(&mut self, offset: f64) -> bool {
        if !self.begin(Instant::now(), offset, None) {
            return false;
        }
        self.spawn_timer()
    }

    /// Start at a section's first second and stop at its last
    pub fn start_from_section(&mut self, section: &StyleSection) -> bool {
        let (start, end) = self.section_bounds(section);
        if !self.begin(Instant::now(), start, Some(end)) {
            return false;
        }
        self.spawn_timer()
    }

    /// Start as of `now` without a timer; drive with `process_at`
    pub fn start_at(&mut self, now: Instant) -> bool {
        self.begin(now, 0.0, None)
    }

    pub fn start_at_offset_at(&mut self, now: Instant, offset: f64) -> bool {
        self.begin(now, offset, None)
    }

    pub fn start_from_section_at(&mut self, now: Instant, section: &StyleSection) -> bool {
        let (start, end) = self.section_bounds(section);
        self.begin(now, start, Some(end))
    }

    /// Section times are in the file's own tempo
    fn section_bounds(&self, section: &StyleSection) -> (f64, f64) {
        let scale = self.reference_bpm / self.bpm();
        (
            section.start_time_seconds * scale,
            section.end_time_seconds * scale,
        )
    }

    fn begin(&mut self, now: Instant, offset: f64, end_time: Option<f64>) -> bool {
        if self.is_playing() {
            self.stop_timer();
            // notes held from the old position would hang
            if let Err(e) = self.output.all_notes_off() {
                tracing::debug!(error = %e, "notes off on restart failed");
            }
        }

        let mut state = self.state();
        if state.tracks.len() < 2 {
            drop(state);
            tracing::info!("nothing to play");
            self.post(PlayerEvent::NothingToPlay);
            return false;
        }

        let offset = offset.max(0.0);
        for track in &mut state.tracks {
            if offset > 0.0 {
                track.resync(offset);
            } else {
                track.next_event_index = 0;
            }
        }
        state.playing = true;
        state.end_time = end_time;
        state.reanchor(now, offset);
        tracing::info!(offset, bpm = state.bpm, "playback started");
        true
    }

    fn spawn_timer(&mut self) -> bool {
        let state = Arc::clone(&self.state);
        let output = self.output.clone();
        let events = self.events_tx.clone();
        let progress = self.progress.clone();

        match PeriodicTimer::start("keystyle-player", self.config.timer_period, move |now| {
            process_tick(&state, &output, &events, &progress, now)
        }) {
            Ok(timer) => {
                self.timer = Some(timer);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot start player timer");
                self.state().playing = false;
                false
            }
        }
    }

    fn stop_timer(&mut self) {
        if let Some(mut timer) = self.timer.take() {
            timer.stop();
        }
    }

    /// Body of one timer tick, for callers driving the clock themselves
    pub fn process_at(&self, now: Instant) -> TimerControl {
        process_tick(&self.state, &self.output, &self.events_tx, &self.progress, now)
    }

    /// Stop the timer, silence every channel and rewind to zero
    pub fn stop(&mut self) {
        self.stop_timer();
        {
            let mut state = self.state();
            state.playing = false;
            state.anchor_elapsed = 0.0;
            state.end_time = None;
            for track in &mut state.tracks {
                track.next_event_index = 0;
            }
        }
        if let Err(e) = self.output.all_notes_off() {
            tracing::debug!(error = %e, "notes off on stop failed");
        }
        // a position from before the rewind is stale
        self.progress.clear();
        self.post(PlayerEvent::PlaybackReset);
    }

    pub fn apply_bpm_change_during_playback(&mut self, new_bpm: f64) {
        self.apply_bpm_change_during_playback_at(Instant::now(), new_bpm);
    }

    /// Change tempo without restarting.
    ///
    /// Every timestamp is moved from the old tempo to the new one, and so is
    /// the elapsed time, so the beat position stays where it was. Cursors
    /// never move back over events already sent.
    pub fn apply_bpm_change_during_playback_at(&mut self, now: Instant, new_bpm: f64) {
        if !(new_bpm.is_finite() && new_bpm > 0.0) {
            return;
        }
        let mut state = self.state();
        let old_bpm = state.bpm;
        let factor = old_bpm / new_bpm;
        let old_elapsed = state.elapsed_at(now);
        let new_elapsed = old_elapsed * factor;
        let playing = state.playing;

        for track in &mut state.tracks {
            let sent = track.next_event_index;
            track.sequence.scale_timestamps(factor);
            track.sequence.sort_and_pair();
            if playing {
                track.resync(new_elapsed);
                track.next_event_index = track.next_event_index.max(sent);
            }
        }
        if let Some(end) = state.end_time.as_mut() {
            *end *= factor;
        }
        state.bpm = new_bpm;
        if playing {
            state.reanchor(now, new_elapsed);
        }
        tracing::debug!(old_bpm, new_bpm, old_elapsed, new_elapsed, "tempo changed");
    }

    pub fn apply_bpm_change_for_one(&mut self, entry: &mut TrackEntry) -> bool {
        self.apply_bpm_change_for_one_at(Instant::now(), entry)
    }

    /// Bring the player's copy of one track to the player tempo, for
    /// instance after it was edited. The clock is left alone.
    pub fn apply_bpm_change_for_one_at(&mut self, now: Instant, entry: &mut TrackEntry) -> bool {
        let bpm = self.bpm();
        let lead_in = self.config.lead_in.as_secs_f64();

        let mut state = self.state();
        let elapsed = state.elapsed_at(now);
        let playing = state.playing;
        let Some(track) = state.tracks.iter_mut().find(|t| t.uuid == entry.uuid) else {
            tracing::debug!(track = %entry.display_name, "not collected, tempo left alone");
            return false;
        };

        entry.set_tempo(bpm);
        let mut sequence = entry.sequence().filtered_notes(track.channel);
        if track.lead_in {
            inject_lead_in(&mut sequence, entry, track.channel, lead_in);
        }
        let sent = track.next_event_index;
        track.sequence = sequence;
        track.revision = entry.revision();
        if playing {
            track.resync(elapsed);
            track.next_event_index = track.next_event_index.max(sent).min(track.sequence.len());
        }
        true
    }

    pub fn seek(&mut self, seconds: f64) -> bool {
        self.seek_at(Instant::now(), seconds)
    }

    /// Jump to `seconds` while playing; held notes are released first
    pub fn seek_at(&mut self, now: Instant, seconds: f64) -> bool {
        if !self.is_playing() {
            return false;
        }
        if let Err(e) = self.output.all_notes_off() {
            tracing::debug!(error = %e, "notes off on seek failed");
        }
        let mut state = self.state();
        let seconds = seconds.max(0.0);
        for track in &mut state.tracks {
            track.resync(seconds);
        }
        state.reanchor(now, seconds);
        true
    }

    pub fn add_listener<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&PlayerEvent) + Send + 'static,
    {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Deliver queued events to the listeners; call from the owner's thread
    ///
    /// Progress comes first, as the newest value only, then queued state changes.
    pub fn poll_events(&mut self) -> Vec<PlayerEvent> {
        let mut events = Vec::new();
        if let Some(beats) = self.progress.beats.take() {
            events.push(PlayerEvent::BeatsElapsed(beats));
        }
        if let Some(position) = self.progress.position.take() {
            events.push(PlayerEvent::PlaybackPosition(position));
        }
        events.extend(self.events_rx.drain());
        for event in &events {
            self.listeners.dispatch(event);
        }
        events
    }
}

impl Drop for MultiTrackPlayer {
    fn drop(&mut self) {
        self.stop_timer();
    }
}
