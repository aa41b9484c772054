use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::configuration::DeliverySettings;
use crate::dispatcher::Dispatcher;
use crate::domain::{
    Campaign, CampaignStatus, Newsletter, Recipient, ReferencedItem, Subscriber, SubscriberEmail,
};
use crate::email_client::{EmailError, MailTransport};
use crate::repository::{CampaignStore, InMemoryStore};
use crate::template::TemplateRenderer;

pub fn settings(batch_size: u32) -> DeliverySettings {
    DeliverySettings {
        batch_size,
        inter_send_delay_milliseconds: 0,
        daily_trigger_seconds: 0,
    }
}

pub fn renderer() -> TemplateRenderer {
    TemplateRenderer::new("http://127.0.0.1").unwrap()
}

pub fn dispatcher(
    store: &InMemoryStore,
    transport: Arc<RecordingTransport>,
    batch_size: u32,
) -> Dispatcher {
    Dispatcher::new(
        Arc::new(store.clone()),
        transport,
        renderer(),
        settings(batch_size),
    )
}

/// Registers `count` subscribers, each one minute newer than the previous.
pub fn seed_subscribers(store: &InMemoryStore, count: usize) -> Vec<Subscriber> {
    let base = Utc::now() - Duration::days(10);
    (0..count)
        .map(|i| {
            let subscriber = Subscriber {
                id: Uuid::new_v4(),
                email: format!("reader{i}@example.com"),
                subscribed_at: base + Duration::minutes(i as i64),
            };
            store.add_subscriber(subscriber.clone());
            subscriber
        })
        .collect()
}

/// Persists a campaign for the current subscribers without dispatching anything.
pub async fn enqueue_raw(store: &InMemoryStore) -> Uuid {
    enqueue_with_items(store, vec![]).await
}

pub async fn enqueue_with_items(store: &InMemoryStore, items: Vec<Uuid>) -> Uuid {
    let newsletter = Newsletter::new(
        "Monthly digest".into(),
        r#"{"ops":[{"insert":"Hello "},{"insert":"readers","attributes":{"bold":true}},{"insert":"\n"}]}"#.into(),
        items,
    )
    .unwrap();
    let subscribers = store.list_subscribers().await.unwrap();
    let now = Utc::now();
    let campaign = Campaign::pending(&newsletter, subscribers.len() as i64, now);
    let recipients: Vec<_> = subscribers
        .iter()
        .map(|s| Recipient::pending(campaign.id, s, now))
        .collect();
    store.insert_campaign(&campaign, &recipients).await.unwrap();
    campaign.id
}

#[derive(Default)]
pub struct RecordingTransport {
    failing: Option<String>,
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingTransport {
    pub fn failing_for(email: &str) -> Self {
        Self {
            failing: Some(email.to_string()),
            ..Self::default()
        }
    }

    /// Addresses successfully sent to, in send order.
    pub fn sent_to(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(to, _)| to.clone())
            .collect()
    }

    pub fn html_bodies(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, html)| html.clone())
            .collect()
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(
        &self,
        recipient: &SubscriberEmail,
        _subject: &str,
        html_body: &str,
        _text_body: &str,
    ) -> Result<(), EmailError> {
        if self.failing.as_deref() == Some(recipient.as_ref()) {
            return Err(EmailError::Rejected {
                status: 406,
                message: "Recipient is inactive".into(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), html_body.to_string()));
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Fault {
    LoseClaims,
    MarkSent,
}

/// Wraps an `InMemoryStore` and injects one kind of fault.
#[derive(Clone)]
pub struct FaultyStore {
    inner: InMemoryStore,
    fault: Fault,
}

impl FaultyStore {
    /// Every `pending -> sending` claim reports that another cycle won.
    pub fn losing_claims(inner: InMemoryStore) -> Self {
        Self {
            inner,
            fault: Fault::LoseClaims,
        }
    }

    pub fn failing_on_mark_sent(inner: InMemoryStore) -> Self {
        Self {
            inner,
            fault: Fault::MarkSent,
        }
    }

    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }
}

#[async_trait]
impl CampaignStore for FaultyStore {
    async fn list_subscribers(&self) -> Result<Vec<Subscriber>, anyhow::Error> {
        self.inner.list_subscribers().await
    }

    async fn insert_campaign(
        &self,
        campaign: &Campaign,
        recipients: &[Recipient],
    ) -> Result<(), anyhow::Error> {
        self.inner.insert_campaign(campaign, recipients).await
    }

    async fn get_campaign(&self, campaign_id: Uuid) -> Result<Option<Campaign>, anyhow::Error> {
        self.inner.get_campaign(campaign_id).await
    }

    async fn list_campaigns(&self, limit: i64) -> Result<Vec<Campaign>, anyhow::Error> {
        self.inner.list_campaigns(limit).await
    }

    async fn oldest_campaign_with_status(
        &self,
        status: CampaignStatus,
    ) -> Result<Option<Campaign>, anyhow::Error> {
        self.inner.oldest_campaign_with_status(status).await
    }

    async fn transition_campaign(
        &self,
        campaign_id: Uuid,
        from: CampaignStatus,
        to: CampaignStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, anyhow::Error> {
        if matches!(self.fault, Fault::LoseClaims) && from == CampaignStatus::Pending {
            return Ok(false);
        }
        self.inner
            .transition_campaign(campaign_id, from, to, at)
            .await
    }

    async fn add_campaign_counts(
        &self,
        campaign_id: Uuid,
        sent: i64,
        failed: i64,
        at: DateTime<Utc>,
    ) -> Result<(), anyhow::Error> {
        self.inner
            .add_campaign_counts(campaign_id, sent, failed, at)
            .await
    }

    async fn pending_recipients(
        &self,
        campaign_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Recipient>, anyhow::Error> {
        self.inner.pending_recipients(campaign_id, limit).await
    }

    async fn count_pending_recipients(&self, campaign_id: Uuid) -> Result<i64, anyhow::Error> {
        self.inner.count_pending_recipients(campaign_id).await
    }

    async fn recipients_for_campaign(
        &self,
        campaign_id: Uuid,
    ) -> Result<Vec<Recipient>, anyhow::Error> {
        self.inner.recipients_for_campaign(campaign_id).await
    }

    async fn mark_recipient_sent(
        &self,
        recipient_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, anyhow::Error> {
        if matches!(self.fault, Fault::MarkSent) {
            anyhow::bail!("connection reset by peer");
        }
        self.inner.mark_recipient_sent(recipient_id, at).await
    }

    async fn mark_recipient_failed(
        &self,
        recipient_id: Uuid,
        error_message: &str,
    ) -> Result<bool, anyhow::Error> {
        self.inner
            .mark_recipient_failed(recipient_id, error_message)
            .await
    }

    async fn referenced_items(&self, ids: &[Uuid]) -> Result<Vec<ReferencedItem>, anyhow::Error> {
        self.inner.referenced_items(ids).await
    }
}
