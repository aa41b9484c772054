use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use serde::Serialize;
use tracing::{Span, field::display};
use uuid::Uuid;

use crate::configuration::DeliverySettings;
use crate::domain::{Campaign, CampaignStatus, Recipient, ReferencedItem, SubscriberEmail};
use crate::email_client::MailTransport;
use crate::repository::CampaignStore;
use crate::template::{RichBody, TemplateRenderer};
use crate::utils::error_chain_fmt;

/// Outcome of one dispatch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub sent: u64,
    pub failed: u64,
    /// Recipients of `campaign_id` still pending after this cycle.
    pub remaining: u64,
    pub campaign_id: Option<Uuid>,
}

impl BatchReport {
    pub fn idle() -> Self {
        Self {
            sent: 0,
            failed: 0,
            remaining: 0,
            campaign_id: None,
        }
    }
}

#[derive(thiserror::Error)]
pub enum DispatchError {
    #[error("Campaign {campaign_id} was marked as failed after an unexpected fault")]
    CampaignFailed {
        campaign_id: Uuid,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl DispatchError {
    /// The campaign this fault moved to `failed`, if any.
    pub fn failed_campaign(&self) -> Option<Uuid> {
        match self {
            Self::CampaignFailed { campaign_id, .. } => Some(*campaign_id),
            Self::UnexpectedError(_) => None,
        }
    }
}

impl std::fmt::Debug for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// Drains pending recipients of the oldest eligible campaign, one bounded batch per cycle.
///
/// Holds no state between cycles: everything it needs to resume is in the store.
pub struct Dispatcher {
    store: Arc<dyn CampaignStore>,
    transport: Arc<dyn MailTransport>,
    renderer: TemplateRenderer,
    settings: DeliverySettings,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn CampaignStore>,
        transport: Arc<dyn MailTransport>,
        renderer: TemplateRenderer,
        settings: DeliverySettings,
    ) -> Self {
        Self {
            store,
            transport,
            renderer,
            settings,
        }
    }

    pub fn settings(&self) -> &DeliverySettings {
        &self.settings
    }

    #[tracing::instrument(
        name = "Run newsletter batch cycle",
        skip_all,
        fields(campaign_id = tracing::field::Empty)
    )]
    pub async fn run_batch_cycle(&self) -> Result<BatchReport, DispatchError> {
        let Some(campaign) = self.select_campaign().await? else {
            tracing::info!("No pending or sending campaign, nothing to dispatch");
            return Ok(BatchReport::idle());
        };
        Span::current().record("campaign_id", display(campaign.id));

        match self.dispatch_batch(&campaign).await {
            Ok(report) => {
                tracing::info!(
                    sent = report.sent,
                    failed = report.failed,
                    remaining = report.remaining,
                    "Newsletter batch finished"
                );
                Ok(report)
            }
            Err(e) => {
                tracing::error!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    "Unexpected fault while dispatching a newsletter batch, \
                    marking the campaign as failed"
                );
                if let Err(mark_err) = self
                    .store
                    .transition_campaign(
                        campaign.id,
                        CampaignStatus::Sending,
                        CampaignStatus::Failed,
                        Utc::now(),
                    )
                    .await
                {
                    tracing::error!(
                        error.cause_chain = ?mark_err,
                        "Failed to mark the campaign as failed"
                    );
                }
                Err(DispatchError::CampaignFailed {
                    campaign_id: campaign.id,
                    source: e,
                })
            }
        }
    }

    /// Resumes the oldest `sending` campaign, otherwise claims the oldest `pending` one.
    async fn select_campaign(&self) -> Result<Option<Campaign>, anyhow::Error> {
        if let Some(campaign) = self
            .store
            .oldest_campaign_with_status(CampaignStatus::Sending)
            .await?
        {
            return Ok(Some(campaign));
        }

        let Some(mut campaign) = self
            .store
            .oldest_campaign_with_status(CampaignStatus::Pending)
            .await?
        else {
            return Ok(None);
        };

        let claimed = self
            .store
            .transition_campaign(
                campaign.id,
                CampaignStatus::Pending,
                CampaignStatus::Sending,
                Utc::now(),
            )
            .await?;
        if !claimed {
            tracing::info!(
                campaign_id = %campaign.id,
                "Campaign was claimed by a concurrent cycle, skipping"
            );
            return Ok(None);
        }

        campaign.status = CampaignStatus::Sending;
        Ok(Some(campaign))
    }

    async fn dispatch_batch(&self, campaign: &Campaign) -> Result<BatchReport, anyhow::Error> {
        let recipients = self
            .store
            .pending_recipients(campaign.id, i64::from(self.settings.batch_size))
            .await
            .context("Failed to fetch the next batch of recipients")?;

        if recipients.is_empty() {
            self.complete(campaign.id).await?;
            return Ok(BatchReport {
                sent: 0,
                failed: 0,
                remaining: 0,
                campaign_id: Some(campaign.id),
            });
        }

        let items = self
            .store
            .referenced_items(&campaign.referenced_item_ids)
            .await
            .context("Failed to resolve posts referenced by the newsletter")?;
        let body = RichBody::parse(&campaign.body);

        let delay = self.settings.inter_send_delay();
        let (mut sent, mut failed) = (0_i64, 0_i64);

        for (position, recipient) in recipients.iter().enumerate() {
            if position > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match self.deliver(campaign, &body, &items, recipient).await {
                Ok(()) => {
                    if self
                        .store
                        .mark_recipient_sent(recipient.id, Utc::now())
                        .await
                        .context("Failed to record a delivered newsletter")?
                    {
                        sent += 1;
                    } else {
                        tracing::warn!(
                            recipient_id = %recipient.id,
                            "Recipient was already settled by a concurrent cycle"
                        );
                    }
                }
                Err(message) => {
                    if self
                        .store
                        .mark_recipient_failed(recipient.id, &message)
                        .await
                        .context("Failed to record an undelivered newsletter")?
                    {
                        failed += 1;
                    } else {
                        tracing::warn!(
                            recipient_id = %recipient.id,
                            "Recipient was already settled by a concurrent cycle"
                        );
                    }
                }
            }
        }

        self.store
            .add_campaign_counts(campaign.id, sent, failed, Utc::now())
            .await
            .context("Failed to record newsletter campaign progress")?;

        let remaining = self
            .store
            .count_pending_recipients(campaign.id)
            .await
            .context("Failed to count remaining recipients")?;
        if remaining == 0 {
            self.complete(campaign.id).await?;
        }

        Ok(BatchReport {
            sent: sent as u64,
            failed: failed as u64,
            remaining: remaining as u64,
            campaign_id: Some(campaign.id),
        })
    }

    async fn complete(&self, campaign_id: Uuid) -> Result<(), anyhow::Error> {
        let completed = self
            .store
            .transition_campaign(
                campaign_id,
                CampaignStatus::Sending,
                CampaignStatus::Completed,
                Utc::now(),
            )
            .await
            .context("Failed to mark the campaign as completed")?;
        if completed {
            tracing::info!(%campaign_id, "Newsletter campaign completed");
        }
        Ok(())
    }

    /// Renders and sends to one recipient. Every failure is returned as the message to
    /// store on the recipient; nothing here aborts the batch.
    #[tracing::instrument(
        name = "Deliver newsletter",
        skip_all,
        fields(recipient_id = %recipient.id, recipient_email = %recipient.email)
    )]
    async fn deliver(
        &self,
        campaign: &Campaign,
        body: &RichBody,
        items: &[ReferencedItem],
        recipient: &Recipient,
    ) -> Result<(), String> {
        let email = SubscriberEmail::parse(recipient.email.clone()).inspect_err(|e| {
            tracing::error!(
                error.message = %e,
                "Skipping a recipient, their stored contact details are invalid"
            );
        })?;

        let rendered = self
            .renderer
            .render(&campaign.title, body, items, email.as_ref())
            .map_err(|e| {
                tracing::error!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    "Failed to render the newsletter for a recipient"
                );
                e.to_string()
            })?;

        self.transport
            .send(&email, &campaign.title, &rendered.html, &rendered.text)
            .await
            .map_err(|e| {
                tracing::error!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    "Failed to deliver newsletter to a recipient"
                );
                e.to_string()
            })
    }
}
