// Periodic timer - fixed-period callback on its own thread

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Returned by the tick callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerControl {
    Continue,
    Stop,
}

/// Calls a closure every `period` until stopped.
///
/// Deadlines advance by whole periods from the start instant, so a late
/// tick does not push every following one. If the callback falls more than
/// one period behind, the schedule restarts from now instead of bursting.
pub struct PeriodicTimer {
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    period: Duration,
}

impl PeriodicTimer {
    pub fn start<F>(name: &str, period: Duration, mut tick: F) -> std::io::Result<Self>
    where
        F: FnMut(Instant) -> TimerControl + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut deadline = Instant::now() + period;

                while flag.load(Ordering::Acquire) {
                    let now = Instant::now();
                    if deadline > now {
                        thread::sleep(deadline - now);
                    }
                    if !flag.load(Ordering::Acquire) {
                        break;
                    }

                    let now = Instant::now();
                    if tick(now) == TimerControl::Stop {
                        flag.store(false, Ordering::Release);
                        break;
                    }

                    deadline += period;
                    if now > deadline + period {
                        tracing::trace!("timer fell behind, resynchronising");
                        deadline = now + period;
                    }
                }
            })?;

        Ok(Self {
            running,
            handle: Some(handle),
            period,
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// False once stopped, either from outside or by the callback
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop and wait for the in-flight tick to finish.
    ///
    /// Called from the timer thread itself, it only clears the flag.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);

        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                tracing::warn!("timer thread panicked");
            }
        }
    }
}

impl Drop for PeriodicTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_timer_ticks_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);

        let mut timer = PeriodicTimer::start("test-timer", Duration::from_millis(2), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            TimerControl::Continue
        })
        .unwrap();

        thread::sleep(Duration::from_millis(50));
        timer.stop();
        let after_stop = count.load(Ordering::SeqCst);
        assert!(after_stop > 0);
        assert!(!timer.is_running());

        thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_callback_can_stop_timer() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);

        let timer = PeriodicTimer::start("test-timer", Duration::from_millis(1), move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 2 {
                TimerControl::Stop
            } else {
                TimerControl::Continue
            }
        })
        .unwrap();

        thread::sleep(Duration::from_millis(50));
        assert!(!timer.is_running());
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
