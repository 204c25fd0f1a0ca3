// Timing module

pub mod timer;

pub use timer::{PeriodicTimer, TimerControl};
