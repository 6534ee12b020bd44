pub mod feed;
pub mod notifier;
pub mod sink;
pub mod templates;

pub use feed::NotificationFeed;
pub use notifier::Notifier;
pub use templates::feed_entry;
pub use sink::{sink_from_config, HttpMessagingSink, LogMessagingSink, MessagingSink};
