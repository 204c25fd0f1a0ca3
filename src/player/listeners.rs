// Player listeners - events raised by the timer thread, delivered on the owner's thread

use crate::messaging::notification::{Notification, NotificationCategory};

/// What the player reports back to its owner
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerEvent {
    /// Beats since the start at the playback tempo
    BeatsElapsed(f64),
    /// Seconds since the start
    PlaybackPosition(f64),
    PlaybackReset,
    NothingToPlay,
    PlaybackFinished,
    DeviceLost,
}

impl PlayerEvent {
    /// User-facing form of the events that deserve one
    pub fn notification(&self) -> Option<Notification> {
        match self {
            PlayerEvent::NothingToPlay => Some(Notification::info(
                NotificationCategory::Playback,
                "Nothing to play: select at least two tracks with notes",
            )),
            PlayerEvent::PlaybackFinished => Some(Notification::info(
                NotificationCategory::Playback,
                "Playback finished",
            )),
            PlayerEvent::DeviceLost => Some(Notification::warning(
                NotificationCategory::Device,
                "MIDI output unavailable, playback stopped",
            )),
            _ => None,
        }
    }
}

pub type ListenerId = u64;

type Listener = Box<dyn FnMut(&PlayerEvent) + Send>;

/// Callbacks with add/remove by id
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: ListenerId,
    listeners: Vec<(ListenerId, Listener)>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&PlayerEvent) + Send + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    pub fn dispatch(&mut self, event: &PlayerEvent) {
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
