use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::CampaignStore;
use crate::domain::{Campaign, CampaignStatus, Recipient, ReferencedItem, Subscriber};

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), anyhow::Error> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to migrate the database")
    }
}

#[derive(sqlx::FromRow)]
struct CampaignRow {
    id: Uuid,
    title: String,
    body: String,
    referenced_item_ids: Vec<Uuid>,
    status: String,
    total_recipients: i64,
    sent_count: i64,
    failed_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<CampaignRow> for Campaign {
    type Error = anyhow::Error;

    fn try_from(row: CampaignRow) -> Result<Self, Self::Error> {
        Ok(Campaign {
            id: row.id,
            title: row.title,
            body: row.body,
            referenced_item_ids: row.referenced_item_ids,
            status: row.status.parse().map_err(anyhow::Error::msg)?,
            total_recipients: row.total_recipients,
            sent_count: row.sent_count,
            failed_count: row.failed_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RecipientRow {
    id: Uuid,
    campaign_id: Uuid,
    subscriber_id: Uuid,
    email: String,
    status: String,
    sent_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<RecipientRow> for Recipient {
    type Error = anyhow::Error;

    fn try_from(row: RecipientRow) -> Result<Self, Self::Error> {
        Ok(Recipient {
            id: row.id,
            campaign_id: row.campaign_id,
            subscriber_id: row.subscriber_id,
            email: row.email,
            status: row.status.parse().map_err(anyhow::Error::msg)?,
            sent_at: row.sent_at,
            error_message: row.error_message,
            created_at: row.created_at,
        })
    }
}

const CAMPAIGN_COLUMNS: &str = r#"
    id, title, body, referenced_item_ids, status, total_recipients,
    sent_count, failed_count, created_at, updated_at, completed_at
"#;

const RECIPIENT_COLUMNS: &str = r#"
    id, campaign_id, subscriber_id, email, status, sent_at, error_message, created_at
"#;

fn into_campaigns(rows: Vec<CampaignRow>) -> Result<Vec<Campaign>, anyhow::Error> {
    rows.into_iter().map(Campaign::try_from).collect()
}

fn into_recipients(rows: Vec<RecipientRow>) -> Result<Vec<Recipient>, anyhow::Error> {
    rows.into_iter().map(Recipient::try_from).collect()
}

#[async_trait]
impl CampaignStore for PostgresStore {
    #[tracing::instrument(skip_all)]
    async fn list_subscribers(&self) -> Result<Vec<Subscriber>, anyhow::Error> {
        let rows: Vec<(Uuid, String, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT id, email, subscribed_at
            FROM subscribers
            WHERE is_subscribed = true
            ORDER BY subscribed_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to snapshot newsletter subscribers")?;

        Ok(rows
            .into_iter()
            .map(|(id, email, subscribed_at)| Subscriber {
                id,
                email,
                subscribed_at,
            })
            .collect())
    }

    #[tracing::instrument(skip_all, fields(campaign_id = %campaign.id))]
    async fn insert_campaign(
        &self,
        campaign: &Campaign,
        recipients: &[Recipient],
    ) -> Result<(), anyhow::Error> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .context("Failed to start a transaction")?;

        let query = sqlx::query(
            r#"
            INSERT INTO newsletter_campaigns (
            id, title, body, referenced_item_ids, status, total_recipients,
            sent_count, failed_count, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(campaign.id)
        .bind(&campaign.title)
        .bind(&campaign.body)
        .bind(&campaign.referenced_item_ids)
        .bind(campaign.status.as_str())
        .bind(campaign.total_recipients)
        .bind(campaign.sent_count)
        .bind(campaign.failed_count)
        .bind(campaign.created_at)
        .bind(campaign.updated_at);
        query
            .execute(&mut *transaction)
            .await
            .context("Failed to store newsletter campaign")?;

        let ids: Vec<Uuid> = recipients.iter().map(|r| r.id).collect();
        let subscriber_ids: Vec<Uuid> = recipients.iter().map(|r| r.subscriber_id).collect();
        let emails: Vec<String> = recipients.iter().map(|r| r.email.clone()).collect();

        // ORDER BY ordinality keeps `seq` in snapshot order
        let query = sqlx::query(
            r#"
            INSERT INTO newsletter_recipients (
            id, campaign_id, subscriber_id, email, status, created_at
            )
            SELECT r.id, $2, r.subscriber_id, r.email, 'pending', $5
            FROM UNNEST($1::uuid[], $3::uuid[], $4::text[])
                WITH ORDINALITY AS r(id, subscriber_id, email, ord)
            ORDER BY r.ord
            "#,
        )
        .bind(&ids)
        .bind(campaign.id)
        .bind(&subscriber_ids)
        .bind(&emails)
        .bind(campaign.created_at);
        let inserted = query
            .execute(&mut *transaction)
            .await
            .context("Failed to store newsletter recipients")?
            .rows_affected();

        if inserted != campaign.total_recipients as u64 {
            // dropping the transaction rolls it back
            anyhow::bail!(
                "Stored {inserted} recipients but campaign declares {}",
                campaign.total_recipients
            );
        }

        transaction
            .commit()
            .await
            .context("Failed to commit newsletter campaign")?;
        Ok(())
    }

    async fn get_campaign(&self, campaign_id: Uuid) -> Result<Option<Campaign>, anyhow::Error> {
        let row: Option<CampaignRow> = sqlx::query_as(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM newsletter_campaigns WHERE id = $1"
        ))
        .bind(campaign_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get newsletter campaign")?;

        row.map(Campaign::try_from).transpose()
    }

    async fn list_campaigns(&self, limit: i64) -> Result<Vec<Campaign>, anyhow::Error> {
        let rows: Vec<CampaignRow> = sqlx::query_as(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM newsletter_campaigns
             ORDER BY created_at DESC, seq DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list newsletter campaigns")?;

        into_campaigns(rows)
    }

    #[tracing::instrument(skip(self))]
    async fn oldest_campaign_with_status(
        &self,
        status: CampaignStatus,
    ) -> Result<Option<Campaign>, anyhow::Error> {
        let row: Option<CampaignRow> = sqlx::query_as(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM newsletter_campaigns
             WHERE status = $1
             ORDER BY created_at ASC, seq ASC
             LIMIT 1"
        ))
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to select a newsletter campaign")?;

        row.map(Campaign::try_from).transpose()
    }

    #[tracing::instrument(skip(self, at))]
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
        let updated = sqlx::query(
            r#"
            UPDATE newsletter_campaigns
            SET status = $3,
                updated_at = $4,
                completed_at = CASE WHEN $5 THEN $4 ELSE completed_at END
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(campaign_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(at)
        .bind(to.is_terminal())
        .execute(&self.pool)
        .await
        .context("Failed to update newsletter campaign status")?
        .rows_affected();

        Ok(updated == 1)
    }

    #[tracing::instrument(skip(self, at))]
    async fn add_campaign_counts(
        &self,
        campaign_id: Uuid,
        sent: i64,
        failed: i64,
        at: DateTime<Utc>,
    ) -> Result<(), anyhow::Error> {
        sqlx::query(
            r#"
            UPDATE newsletter_campaigns
            SET sent_count = sent_count + $2,
                failed_count = failed_count + $3,
                updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(campaign_id)
        .bind(sent)
        .bind(failed)
        .bind(at)
        .execute(&self.pool)
        .await
        .context("Failed to record newsletter campaign progress")?;
        Ok(())
    }

    async fn pending_recipients(
        &self,
        campaign_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Recipient>, anyhow::Error> {
        let rows: Vec<RecipientRow> = sqlx::query_as(&format!(
            "SELECT {RECIPIENT_COLUMNS} FROM newsletter_recipients
             WHERE campaign_id = $1 AND status = 'pending'
             ORDER BY seq ASC
             LIMIT $2"
        ))
        .bind(campaign_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch pending newsletter recipients")?;

        into_recipients(rows)
    }

    async fn count_pending_recipients(&self, campaign_id: Uuid) -> Result<i64, anyhow::Error> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM newsletter_recipients
            WHERE campaign_id = $1 AND status = 'pending'
            "#,
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count pending newsletter recipients")?;
        Ok(count)
    }

    async fn recipients_for_campaign(
        &self,
        campaign_id: Uuid,
    ) -> Result<Vec<Recipient>, anyhow::Error> {
        let rows: Vec<RecipientRow> = sqlx::query_as(&format!(
            "SELECT {RECIPIENT_COLUMNS} FROM newsletter_recipients
             WHERE campaign_id = $1
             ORDER BY seq ASC"
        ))
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch newsletter recipients")?;

        into_recipients(rows)
    }

    async fn mark_recipient_sent(
        &self,
        recipient_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, anyhow::Error> {
        let updated = sqlx::query(
            r#"
            UPDATE newsletter_recipients
            SET status = 'sent', sent_at = $2
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(recipient_id)
        .bind(at)
        .execute(&self.pool)
        .await
        .context("Failed to mark newsletter recipient as sent")?
        .rows_affected();
        Ok(updated == 1)
    }

    async fn mark_recipient_failed(
        &self,
        recipient_id: Uuid,
        error_message: &str,
    ) -> Result<bool, anyhow::Error> {
        let updated = sqlx::query(
            r#"
            UPDATE newsletter_recipients
            SET status = 'failed', error_message = $2
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(recipient_id)
        .bind(error_message)
        .execute(&self.pool)
        .await
        .context("Failed to mark newsletter recipient as failed")?
        .rows_affected();
        Ok(updated == 1)
    }

    async fn referenced_items(&self, ids: &[Uuid]) -> Result<Vec<ReferencedItem>, anyhow::Error> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let rows: Vec<(Uuid, String, String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT id, title, summary, img
            FROM posts
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch posts referenced by the newsletter")?;

        let mut items: Vec<_> = rows
            .into_iter()
            .map(|(id, title, summary, image_url)| ReferencedItem {
                id,
                title,
                summary,
                image_url,
            })
            .collect();
        items.sort_by_key(|item| ids.iter().position(|id| *id == item.id));
        Ok(items)
    }
}
