mod subscriber_email;

pub use subscriber_email::SubscriberEmail;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A newsletter subscriber as seen at snapshot time.
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub id: Uuid,
    pub email: String,
    pub subscribed_at: DateTime<Utc>,
}
