use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::CampaignStore;
use crate::domain::{
    Campaign, CampaignStatus, Recipient, RecipientStatus, ReferencedItem, Subscriber,
};

/// Store held entirely in process memory.
///
/// Backs the test suite. Campaigns and recipients are kept in insertion order, which
/// doubles as their creation order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

#[derive(Debug, Default)]
struct State {
    subscribers: Vec<Subscriber>,
    items: HashMap<Uuid, ReferencedItem>,
    campaigns: Vec<Campaign>,
    recipients: Vec<Recipient>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_subscriber(&self, subscriber: Subscriber) {
        self.write().subscribers.push(subscriber);
    }

    /// Changes a subscriber's live address; existing recipients keep their snapshot.
    pub fn update_subscriber_email(&self, subscriber_id: Uuid, email: &str) {
        let mut state = self.write();
        if let Some(s) = state.subscribers.iter_mut().find(|s| s.id == subscriber_id) {
            s.email = email.to_string();
        }
    }

    pub fn add_referenced_item(&self, item: ReferencedItem) {
        self.write().items.insert(item.id, item);
    }

    pub fn campaign_count(&self) -> usize {
        self.read().campaigns.len()
    }

    pub fn recipient_count(&self) -> usize {
        self.read().recipients.len()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl State {
    fn campaign_mut(&mut self, campaign_id: Uuid) -> Result<&mut Campaign, anyhow::Error> {
        self.campaigns
            .iter_mut()
            .find(|c| c.id == campaign_id)
            .ok_or_else(|| anyhow::anyhow!("Campaign {campaign_id} does not exist"))
    }

    fn pending_recipient_mut(&mut self, recipient_id: Uuid) -> Option<&mut Recipient> {
        self.recipients
            .iter_mut()
            .find(|r| r.id == recipient_id && !r.status.is_terminal())
    }
}

#[async_trait]
impl CampaignStore for InMemoryStore {
    async fn list_subscribers(&self) -> Result<Vec<Subscriber>, anyhow::Error> {
        let mut subscribers = self.read().subscribers.clone();
        // stable sort, ties keep registration order
        subscribers.sort_by_key(|s| s.subscribed_at);
        Ok(subscribers)
    }

    async fn insert_campaign(
        &self,
        campaign: &Campaign,
        recipients: &[Recipient],
    ) -> Result<(), anyhow::Error> {
        if campaign.total_recipients != recipients.len() as i64 {
            anyhow::bail!(
                "Campaign {} declares {} recipients but {} were given",
                campaign.id,
                campaign.total_recipients,
                recipients.len()
            );
        }
        if let Some(stray) = recipients.iter().find(|r| r.campaign_id != campaign.id) {
            anyhow::bail!("Recipient {} belongs to another campaign", stray.id);
        }

        let mut state = self.write();
        if state.campaigns.iter().any(|c| c.id == campaign.id) {
            anyhow::bail!("Campaign {} already exists", campaign.id);
        }
        state.campaigns.push(campaign.clone());
        state.recipients.extend_from_slice(recipients);
        Ok(())
    }

    async fn get_campaign(&self, campaign_id: Uuid) -> Result<Option<Campaign>, anyhow::Error> {
        Ok(self
            .read()
            .campaigns
            .iter()
            .find(|c| c.id == campaign_id)
            .cloned())
    }

    async fn list_campaigns(&self, limit: i64) -> Result<Vec<Campaign>, anyhow::Error> {
        let state = self.read();
        let mut campaigns: Vec<_> = state.campaigns.iter().rev().cloned().collect();
        campaigns.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        campaigns.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(campaigns)
    }

    async fn oldest_campaign_with_status(
        &self,
        status: CampaignStatus,
    ) -> Result<Option<Campaign>, anyhow::Error> {
        Ok(self
            .read()
            .campaigns
            .iter()
            .filter(|c| c.status == status)
            // min_by_key keeps the first of equal keys, i.e. the earliest inserted
            .min_by_key(|c| c.created_at)
            .cloned())
    }

    async fn transition_campaign(
        &self,
        campaign_id: Uuid,
        from: CampaignStatus,
        to: CampaignStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, anyhow::Error> {
        if !from.can_transition_to(to) {
            anyhow::bail!("Campaign {campaign_id} cannot move from {from} to {to}");
        }
        let mut state = self.write();
        let campaign = state.campaign_mut(campaign_id)?;
        if campaign.status != from {
            return Ok(false);
        }
        campaign.status = to;
        campaign.updated_at = at;
        if to.is_terminal() {
            campaign.completed_at = Some(at);
        }
        Ok(true)
    }

    async fn add_campaign_counts(
        &self,
        campaign_id: Uuid,
        sent: i64,
        failed: i64,
        at: DateTime<Utc>,
    ) -> Result<(), anyhow::Error> {
        let mut state = self.write();
        let campaign = state.campaign_mut(campaign_id)?;
        if campaign.sent_count + sent + campaign.failed_count + failed > campaign.total_recipients
        {
            anyhow::bail!("Campaign {campaign_id} counters would exceed its recipient total");
        }
        campaign.sent_count += sent;
        campaign.failed_count += failed;
        campaign.updated_at = at;
        Ok(())
    }

    async fn pending_recipients(
        &self,
        campaign_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Recipient>, anyhow::Error> {
        Ok(self
            .read()
            .recipients
            .iter()
            .filter(|r| r.campaign_id == campaign_id && r.status == RecipientStatus::Pending)
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn count_pending_recipients(&self, campaign_id: Uuid) -> Result<i64, anyhow::Error> {
        let count = self
            .read()
            .recipients
            .iter()
            .filter(|r| r.campaign_id == campaign_id && r.status == RecipientStatus::Pending)
            .count();
        Ok(count as i64)
    }

    async fn recipients_for_campaign(
        &self,
        campaign_id: Uuid,
    ) -> Result<Vec<Recipient>, anyhow::Error> {
        Ok(self
            .read()
            .recipients
            .iter()
            .filter(|r| r.campaign_id == campaign_id)
            .cloned()
            .collect())
    }

    async fn mark_recipient_sent(
        &self,
        recipient_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, anyhow::Error> {
        let mut state = self.write();
        Ok(match state.pending_recipient_mut(recipient_id) {
            Some(recipient) => {
                recipient.status = RecipientStatus::Sent;
                recipient.sent_at = Some(at);
                true
            }
            None => false,
        })
    }

    async fn mark_recipient_failed(
        &self,
        recipient_id: Uuid,
        error_message: &str,
    ) -> Result<bool, anyhow::Error> {
        let mut state = self.write();
        Ok(match state.pending_recipient_mut(recipient_id) {
            Some(recipient) => {
                recipient.status = RecipientStatus::Failed;
                recipient.error_message = Some(error_message.to_string());
                true
            }
            None => false,
        })
    }

    async fn referenced_items(&self, ids: &[Uuid]) -> Result<Vec<ReferencedItem>, anyhow::Error> {
        let state = self.read();
        Ok(ids
            .iter()
            .filter_map(|id| state.items.get(id).cloned())
            .collect())
    }
}
