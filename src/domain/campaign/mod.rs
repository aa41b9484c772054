mod campaign_status;
mod recipient;

pub use campaign_status::CampaignStatus;
pub use recipient::{Recipient, RecipientStatus};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::Newsletter;

/// Aggregate record of one newsletter broadcast.
#[derive(Debug, Clone, Serialize)]
pub struct Campaign {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub referenced_item_ids: Vec<Uuid>,
    pub status: CampaignStatus,
    pub total_recipients: i64,
    pub sent_count: i64,
    pub failed_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Campaign {
    /// A freshly enqueued campaign: `pending`, zero progress, `total_recipients` fixed.
    pub fn pending(newsletter: &Newsletter, total_recipients: i64, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: newsletter.title.as_ref().to_string(),
            body: newsletter.body.as_ref().to_string(),
            referenced_item_ids: newsletter.referenced_item_ids.clone(),
            status: CampaignStatus::Pending,
            total_recipients,
            sent_count: 0,
            failed_count: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Recipients that have not yet reached a terminal status, according to the counters.
    pub fn outstanding(&self) -> i64 {
        self.total_recipients - self.sent_count - self.failed_count
    }
}
