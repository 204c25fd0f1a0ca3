// Lock-free channels between the timer thread and the owning thread

use crate::messaging::notification::Notification;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

pub type NotificationProducer = HeapProd<Notification>;
pub type NotificationConsumer = HeapCons<Notification>;

pub fn create_notification_channel(
    capacity: usize,
) -> (NotificationProducer, NotificationConsumer) {
    let rb = HeapRb::<Notification>::new(capacity);
    rb.split()
}

/// Sending half, shareable between threads.
///
/// Never blocks: a busy lock or a full queue drops the event.
pub struct EventSender<T> {
    inner: Arc<Mutex<HeapProd<T>>>,
}

impl<T> Clone for EventSender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> EventSender<T> {
    /// Returns false when the event was dropped
    pub fn send(&self, event: T) -> bool {
        match self.inner.try_lock() {
            Ok(mut tx) => tx.try_push(event).is_ok(),
            Err(_) => false,
        }
    }
}

/// Receiving half, drained by the owning thread
pub struct EventReceiver<T> {
    inner: HeapCons<T>,
}

impl<T> EventReceiver<T> {
    pub fn try_recv(&mut self) -> Option<T> {
        self.inner.try_pop()
    }

    pub fn drain(&mut self) -> Vec<T> {
        let mut events = Vec::new();
        while let Some(event) = self.inner.try_pop() {
            events.push(event);
        }
        events
    }
}

pub fn event_channel<T>(capacity: usize) -> (EventSender<T>, EventReceiver<T>) {
    let (tx, rx) = HeapRb::<T>::new(capacity).split();
    (
        EventSender {
            inner: Arc::new(Mutex::new(tx)),
        },
        EventReceiver { inner: rx },
    )
}

/// Single overwritten value for progress reports.
///
/// The writer never fails and never waits; the reader sees only the newest
/// value, once.
#[derive(Clone, Default)]
pub struct LatestValue {
    inner: Arc<LatestSlot>,
}

#[derive(Default)]
struct LatestSlot {
    bits: AtomicU64,
    fresh: AtomicBool,
}

impl LatestValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: f64) {
        self.inner.bits.store(value.to_bits(), Ordering::Relaxed);
        self.inner.fresh.store(true, Ordering::Release);
    }

    /// The value written since the last take, if any
    pub fn take(&self) -> Option<f64> {
        if self.inner.fresh.swap(false, Ordering::Acquire) {
            Some(f64::from_bits(self.inner.bits.load(Ordering::Relaxed)))
        } else {
            None
        }
    }

    pub fn clear(&self) {
        self.inner.fresh.store(false, Ordering::Release);
    }
}
