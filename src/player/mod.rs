// Player module - multi-track playback against a wall clock

pub mod channels;
pub mod listeners;
pub mod scheduler;

pub use channels::ChannelPolicy;
pub use listeners::{ListenerId, ListenerRegistry, PlayerEvent};
pub use scheduler::{MultiTrackPlayer, PlayerConfig};
