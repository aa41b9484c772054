use serde::Serialize;
use uuid::Uuid;

/// A published post a newsletter links to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferencedItem {
    pub id: Uuid,
    pub title: String,
    pub summary: String,
    pub image_url: Option<String>,
}
