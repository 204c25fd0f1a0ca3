// Messaging module - notifications and lock-free channels

pub mod channels;
pub mod notification;

pub use channels::{
    EventReceiver, EventSender, LatestValue, NotificationConsumer, NotificationProducer,
    create_notification_channel, event_channel,
};
pub use notification::{Notification, NotificationCategory, NotificationLevel};
