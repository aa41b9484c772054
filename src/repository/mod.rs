mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Campaign, CampaignStatus, Recipient, ReferencedItem, Subscriber};

/// Persistence consumed by the queue manager and the dispatcher.
///
/// Every recipient mutation is conditional on the recipient still being `pending`, and
/// campaign status changes are conditional on the expected prior status. Overlapping
/// dispatch cycles rely on this instead of holding a lock.
#[async_trait]
pub trait CampaignStore: Send + Sync {
    /// Active subscribers, oldest subscription first.
    async fn list_subscribers(&self) -> Result<Vec<Subscriber>, anyhow::Error>;

    /// Persists the campaign together with all of its recipients, or nothing at all.
    async fn insert_campaign(
        &self,
        campaign: &Campaign,
        recipients: &[Recipient],
    ) -> Result<(), anyhow::Error>;

    async fn get_campaign(&self, campaign_id: Uuid) -> Result<Option<Campaign>, anyhow::Error>;

    /// Most recently created campaigns first.
    async fn list_campaigns(&self, limit: i64) -> Result<Vec<Campaign>, anyhow::Error>;

    async fn oldest_campaign_with_status(
        &self,
        status: CampaignStatus,
    ) -> Result<Option<Campaign>, anyhow::Error>;

    /// Moves the campaign from `from` to `to` only if it is still in `from`.
    /// Returns `false` when another caller got there first.
    async fn transition_campaign(
        &self,
        campaign_id: Uuid,
        from: CampaignStatus,
        to: CampaignStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, anyhow::Error>;

    async fn add_campaign_counts(
        &self,
        campaign_id: Uuid,
        sent: i64,
        failed: i64,
        at: DateTime<Utc>,
    ) -> Result<(), anyhow::Error>;

    /// Still-pending recipients in creation order.
    async fn pending_recipients(
        &self,
        campaign_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Recipient>, anyhow::Error>;

    async fn count_pending_recipients(&self, campaign_id: Uuid) -> Result<i64, anyhow::Error>;

    async fn recipients_for_campaign(
        &self,
        campaign_id: Uuid,
    ) -> Result<Vec<Recipient>, anyhow::Error>;

    async fn mark_recipient_sent(
        &self,
        recipient_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, anyhow::Error>;

    async fn mark_recipient_failed(
        &self,
        recipient_id: Uuid,
        error_message: &str,
    ) -> Result<bool, anyhow::Error>;

    /// Items in the order of `ids`; unknown ids are skipped.
    async fn referenced_items(&self, ids: &[Uuid]) -> Result<Vec<ReferencedItem>, anyhow::Error>;
}
