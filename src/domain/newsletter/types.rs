use crate::domain::Newsletter;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize, Debug)]
pub struct NewsletterData {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub referenced_item_ids: Vec<Uuid>,
}

impl TryFrom<NewsletterData> for Newsletter {
    type Error = String;

    fn try_from(payload: NewsletterData) -> Result<Self, Self::Error> {
        Newsletter::new(payload.title, payload.body, payload.referenced_item_ids)
    }
}
