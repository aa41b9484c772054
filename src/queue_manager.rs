use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::dispatcher::{DispatchError, Dispatcher};
use crate::domain::{Campaign, Newsletter, Recipient};
use crate::repository::CampaignStore;
use crate::utils::error_chain_fmt;

#[derive(thiserror::Error)]
pub enum EnqueueError {
    #[error("{0}")]
    Validation(String),

    #[error("There are no newsletter subscribers to send to.")]
    NoSubscribers,

    #[error("Campaign {campaign_id} was stored but its first batch failed")]
    FirstBatchFailed {
        campaign_id: Uuid,
        #[source]
        source: DispatchError,
    },

    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for EnqueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// What the enqueue caller learns right away. Later progress is read from the campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnqueueOutcome {
    pub campaign_id: Uuid,
    pub total_recipients: u64,
    pub sent: u64,
    pub failed: u64,
    pub remaining: u64,
    pub estimated_days: u64,
}

pub struct QueueManager {
    store: Arc<dyn CampaignStore>,
    dispatcher: Arc<Dispatcher>,
}

impl QueueManager {
    pub fn new(store: Arc<dyn CampaignStore>, dispatcher: Arc<Dispatcher>) -> Self {
        Self { store, dispatcher }
    }

    /// Snapshots the current subscribers into a new campaign, then runs one dispatch
    /// cycle synchronously so the caller sees the first batch go out.
    #[tracing::instrument(
        name = "Enqueue newsletter campaign",
        skip_all,
        fields(campaign_id = tracing::field::Empty, total_recipients = tracing::field::Empty)
    )]
    pub async fn enqueue(
        &self,
        title: String,
        body: String,
        referenced_item_ids: Vec<Uuid>,
    ) -> Result<EnqueueOutcome, EnqueueError> {
        let newsletter =
            Newsletter::new(title, body, referenced_item_ids).map_err(EnqueueError::Validation)?;

        let subscribers = self
            .store
            .list_subscribers()
            .await
            .context("Failed to snapshot newsletter subscribers")?;
        if subscribers.is_empty() {
            return Err(EnqueueError::NoSubscribers);
        }

        let now = Utc::now();
        let campaign = Campaign::pending(&newsletter, subscribers.len() as i64, now);
        let recipients: Vec<Recipient> = subscribers
            .iter()
            .map(|subscriber| Recipient::pending(campaign.id, subscriber, now))
            .collect();

        let span = tracing::Span::current();
        span.record("campaign_id", tracing::field::display(campaign.id));
        span.record("total_recipients", recipients.len() as u64);

        self.store
            .insert_campaign(&campaign, &recipients)
            .await
            .context("Failed to store the newsletter campaign")?;

        let total = recipients.len() as u64;
        let report = match self.dispatcher.run_batch_cycle().await {
            Ok(report) => Some(report),
            Err(e) if e.failed_campaign() == Some(campaign.id) => {
                return Err(EnqueueError::FirstBatchFailed {
                    campaign_id: campaign.id,
                    source: e,
                });
            }
            Err(e) => {
                tracing::warn!(
                    error.cause_chain = ?e,
                    "First cycle failed without touching this campaign, it waits for the next trigger"
                );
                None
            }
        };

        // The cycle serves the oldest eligible campaign, which may not be this one
        let (sent, failed, remaining) = match report {
            Some(report) if report.campaign_id == Some(campaign.id) => {
                (report.sent, report.failed, report.remaining)
            }
            served => {
                tracing::info!(
                    served = ?served.and_then(|r| r.campaign_id),
                    "First cycle served another campaign, this one waits its turn"
                );
                (0, 0, total)
            }
        };

        Ok(EnqueueOutcome {
            campaign_id: campaign.id,
            total_recipients: total,
            sent,
            failed,
            remaining,
            estimated_days: self.dispatcher.settings().estimated_days(remaining),
        })
    }
}
