// Live recorder - captures incoming messages and plays them back later

use crate::messaging::channels::{EventReceiver, EventSender, LatestValue, event_channel};
use crate::messaging::notification::{Notification, NotificationCategory};
use crate::midi::device::OutputHandle;
use crate::midi::event::MidiMessage;
use crate::timing::timer::{PeriodicTimer, TimerControl};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// One captured message, in seconds from the start of the take
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordedEvent {
    pub message: MidiMessage,
    pub time_from_start: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecorderEvent {
    PlaybackPosition(f64),
    PlaybackFinished,
    NotEnoughEvents,
    DeviceLost,
}

impl RecorderEvent {
    pub fn notification(&self) -> Option<Notification> {
        match self {
            RecorderEvent::NotEnoughEvents => Some(Notification::info(
                NotificationCategory::Recording,
                "Nothing recorded to play back",
            )),
            RecorderEvent::DeviceLost => Some(Notification::warning(
                NotificationCategory::Device,
                "MIDI output unavailable, playback stopped",
            )),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct RecorderState {
    events: Vec<RecordedEvent>,
    recording: bool,
    record_start: Instant,
    playing: bool,
    playback_start: Instant,
    cursor: usize,
}

impl RecorderState {
    fn capture(&mut self, message: MidiMessage, now: Instant) {
        if !self.recording {
            return;
        }
        let time_from_start = now.saturating_duration_since(self.record_start).as_secs_f64();
        self.events.push(RecordedEvent {
            message,
            time_from_start,
        });
    }
}

fn lock(state: &Mutex<RecorderState>) -> MutexGuard<'_, RecorderState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn process_tick(
    state: &Mutex<RecorderState>,
    output: &OutputHandle,
    events: &EventSender<RecorderEvent>,
    position: &LatestValue,
    now: Instant,
) -> TimerControl {
    let mut state = lock(state);
    if !state.playing {
        return TimerControl::Stop;
    }

    let elapsed = now.saturating_duration_since(state.playback_start).as_secs_f64();
    while let Some(event) = state.events.get(state.cursor).copied() {
        if event.time_from_start > elapsed {
            break;
        }
        if let Err(e) = output.send(&event.message) {
            tracing::warn!(error = %e, "output lost during recording playback");
            state.playing = false;
            if !events.send(RecorderEvent::DeviceLost) {
                tracing::warn!("device lost event dropped");
            }
            return TimerControl::Stop;
        }
        state.cursor += 1;
    }
    position.set(elapsed);

    if state.cursor >= state.events.len() {
        state.playing = false;
        if !events.send(RecorderEvent::PlaybackFinished) {
            tracing::warn!("recording playback finished event dropped");
        }
        return TimerControl::Stop;
    }
    TimerControl::Continue
}

/// Feeds incoming messages into a recorder from another thread
#[derive(Clone)]
pub struct RecorderInput {
    state: Arc<Mutex<RecorderState>>,
}

impl RecorderInput {
    pub fn push(&self, message: MidiMessage) {
        lock(&self.state).capture(message, Instant::now());
    }
}

/// Record/playback engine, independent of the multi-track player
pub struct LiveRecorder {
    state: Arc<Mutex<RecorderState>>,
    output: OutputHandle,
    period: Duration,
    timer: Option<PeriodicTimer>,
    events_tx: EventSender<RecorderEvent>,
    events_rx: EventReceiver<RecorderEvent>,
    position: LatestValue,
}

impl LiveRecorder {
    pub fn new(output: OutputHandle, period: Duration) -> Self {
        let now = Instant::now();
        let (events_tx, events_rx) = event_channel(256);
        Self {
            state: Arc::new(Mutex::new(RecorderState {
                events: Vec::new(),
                recording: false,
                record_start: now,
                playing: false,
                playback_start: now,
                cursor: 0,
            })),
            output,
            period,
            timer: None,
            events_tx,
            events_rx,
            position: LatestValue::new(),
        }
    }

    /// Handle for the input callback
    pub fn input(&self) -> RecorderInput {
        RecorderInput {
            state: Arc::clone(&self.state),
        }
    }

    pub fn start_recording(&mut self) {
        self.start_recording_at(Instant::now());
    }

    /// Drop any previous take and start a new one at `now`
    pub fn start_recording_at(&mut self, now: Instant) {
        self.stop_playback();
        let mut state = lock(&self.state);
        state.events.clear();
        state.cursor = 0;
        state.recording = true;
        state.record_start = now;
        tracing::info!("recording started");
    }

    pub fn stop_recording(&mut self) -> usize {
        let mut state = lock(&self.state);
        state.recording = false;
        tracing::info!(events = state.events.len(), "recording stopped");
        state.events.len()
    }

    pub fn record(&self, message: MidiMessage) {
        self.record_at(message, Instant::now());
    }

    pub fn record_at(&self, message: MidiMessage, now: Instant) {
        lock(&self.state).capture(message, now);
    }

    pub fn is_recording(&self) -> bool {
        lock(&self.state).recording
    }

    pub fn is_playing(&self) -> bool {
        lock(&self.state).playing
    }

    pub fn recorded_events(&self) -> Vec<RecordedEvent> {
        lock(&self.state).events.clone()
    }

    /// Replace the take, e.g. with one loaded from a file
    pub fn set_events(&mut self, mut events: Vec<RecordedEvent>) {
        self.stop_playback();
        events.sort_by(|a, b| a.time_from_start.total_cmp(&b.time_from_start));
        let mut state = lock(&self.state);
        state.events = events;
        state.cursor = 0;
    }

    /// Time of the last captured event
    pub fn duration(&self) -> f64 {
        lock(&self.state)
            .events
            .last()
            .map_or(0.0, |e| e.time_from_start)
    }

    /// Play the take through the output on the timer thread
    pub fn start_playback(&mut self) -> bool {
        if !self.start_playback_at(Instant::now()) {
            return false;
        }

        let state = Arc::clone(&self.state);
        let output = self.output.clone();
        let events = self.events_tx.clone();
        let position = self.position.clone();
        match PeriodicTimer::start("keystyle-recorder", self.period, move |now| {
            process_tick(&state, &output, &events, &position, now)
        }) {
            Ok(timer) => {
                self.timer = Some(timer);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot start recorder timer");
                lock(&self.state).playing = false;
                false
            }
        }
    }

    /// Arm playback as of `now` without a timer; drive with `process_at`
    pub fn start_playback_at(&mut self, now: Instant) -> bool {
        if let Some(mut timer) = self.timer.take() {
            timer.stop();
        }
        let mut state = lock(&self.state);
        if state.events.len() < 2 {
            drop(state);
            tracing::info!("not enough recorded events to play back");
            self.events_tx.send(RecorderEvent::NotEnoughEvents);
            return false;
        }
        state.recording = false;
        state.playing = true;
        state.playback_start = now;
        state.cursor = 0;
        true
    }

    pub fn process_at(&self, now: Instant) -> TimerControl {
        process_tick(&self.state, &self.output, &self.events_tx, &self.position, now)
    }

    pub fn stop_playback(&mut self) {
        if let Some(mut timer) = self.timer.take() {
            timer.stop();
        }
        let was_playing = {
            let mut state = lock(&self.state);
            std::mem::replace(&mut state.playing, false)
        };
        if was_playing && let Err(e) = self.output.all_notes_off() {
            tracing::debug!(error = %e, "notes off after recording playback failed");
        }
    }

    /// Newest position, if any, then queued state changes
    pub fn poll_events(&mut self) -> Vec<RecorderEvent> {
        let mut events: Vec<RecorderEvent> = self
            .position
            .take()
            .map(RecorderEvent::PlaybackPosition)
            .into_iter()
            .collect();
        events.extend(self.events_rx.drain());
        events
    }
}

impl Drop for LiveRecorder {
    fn drop(&mut self) {
        if let Some(mut timer) = self.timer.take() {
            timer.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::device::{CaptureOutput, OutputDevice};

    fn note(note: u8) -> MidiMessage {
        MidiMessage::NoteOn {
            channel: 1,
            note,
            velocity: 80,
        }
    }

    #[test]
    fn test_capture_is_relative_to_start() {
        let device = OutputDevice::new(CaptureOutput::new());
        let mut recorder = LiveRecorder::new(device.handle(), Duration::from_millis(10));
        let t0 = Instant::now();

        recorder.record_at(note(60), t0);
        recorder.start_recording_at(t0);
        recorder.record_at(note(62), t0 + Duration::from_millis(250));
        recorder.stop_recording();
        recorder.record_at(note(64), t0 + Duration::from_millis(500));

        let events = recorder.recorded_events();
        assert_eq!(events.len(), 1);
        assert!((events[0].time_from_start - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_playback_needs_two_events() {
        let device = OutputDevice::new(CaptureOutput::new());
        let mut recorder = LiveRecorder::new(device.handle(), Duration::from_millis(10));
        let t0 = Instant::now();
        recorder.start_recording_at(t0);
        recorder.record_at(note(60), t0);

        assert!(!recorder.start_playback_at(t0));
        assert_eq!(recorder.poll_events(), vec![RecorderEvent::NotEnoughEvents]);
    }

    #[test]
    fn test_playback_dispatches_due_events() {
        let capture = CaptureOutput::new();
        let device = OutputDevice::new(capture.clone());
        let mut recorder = LiveRecorder::new(device.handle(), Duration::from_millis(10));
        let t0 = Instant::now();
        recorder.start_recording_at(t0);
        recorder.record_at(note(60), t0 + Duration::from_millis(100));
        recorder.record_at(note(62), t0 + Duration::from_millis(300));

        let p0 = Instant::now();
        assert!(recorder.start_playback_at(p0));
        assert_eq!(recorder.process_at(p0 + Duration::from_millis(150)), TimerControl::Continue);
        assert_eq!(capture.messages(), vec![note(60)]);

        assert_eq!(recorder.process_at(p0 + Duration::from_millis(300)), TimerControl::Stop);
        assert_eq!(capture.messages(), vec![note(60), note(62)]);
        assert!(!recorder.is_playing());
    }

    #[test]
    fn test_input_handle_feeds_recorder() {
        let device = OutputDevice::new(CaptureOutput::new());
        let mut recorder = LiveRecorder::new(device.handle(), Duration::from_millis(10));
        recorder.start_recording();
        let input = recorder.input();
        std::thread::spawn(move || input.push(note(70)))
            .join()
            .unwrap();
        assert_eq!(recorder.recorded_events().len(), 1);
    }

    #[test]
    fn test_long_playback_still_reports_finish() {
        let device = OutputDevice::new(CaptureOutput::new());
        let mut recorder = LiveRecorder::new(device.handle(), Duration::from_millis(10));
        let t0 = Instant::now();
        recorder.start_recording_at(t0);
        recorder.record_at(note(60), t0);
        recorder.record_at(note(62), t0 + Duration::from_secs(1));

        let p0 = Instant::now();
        recorder.start_playback_at(p0);
        let mut ms = 0;
        while recorder.process_at(p0 + Duration::from_millis(ms)) == TimerControl::Continue {
            ms += 1;
        }
        assert!(ms > 256);
        assert_eq!(
            recorder.poll_events(),
            vec![
                RecorderEvent::PlaybackPosition(1.0),
                RecorderEvent::PlaybackFinished
            ]
        );
    }
}
