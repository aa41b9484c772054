mod newsletter_body;
mod newsletter_title;
mod types;

pub use newsletter_body::NewsletterBody;
pub use newsletter_title::NewsletterTitle;
pub use types::*;

use uuid::Uuid;

/// A validated newsletter ready to be fanned out to subscribers.
#[derive(Debug)]
pub struct Newsletter {
    pub title: NewsletterTitle,
    pub body: NewsletterBody,
    pub referenced_item_ids: Vec<Uuid>,
}

impl Newsletter {
    pub fn new(
        title: String,
        body: String,
        referenced_item_ids: Vec<Uuid>,
    ) -> Result<Self, String> {
        Ok(Self {
            title: NewsletterTitle::parse(title)?,
            body: NewsletterBody::parse(body)?,
            referenced_item_ids: dedup_preserving_order(referenced_item_ids),
        })
    }
}

fn dedup_preserving_order(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}
