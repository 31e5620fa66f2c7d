// Notification delivery to registrant callbacks

pub mod dispatcher;
pub mod tasks;

pub use dispatcher::{DeliveryReport, NotificationDispatcher};
pub use tasks::BackgroundTasks;
