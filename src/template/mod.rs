mod rich_text;

pub use rich_text::{Attributes, Insert, Op, RichBody};

use askama::Template;
use url::Url;
use uuid::Uuid;

use crate::domain::ReferencedItem;

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Invalid base url")]
    BaseUrl(#[from] url::ParseError),
    #[error("Base url {0} cannot carry a path")]
    CannotBeABase(String),
    #[error(transparent)]
    Rendering(#[from] askama::Error),
}

/// A newsletter addressed to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedNewsletter {
    pub html: String,
    pub text: String,
}

struct RelatedPost<'a> {
    title: &'a str,
    summary: &'a str,
    link: String,
}

#[derive(Template)]
#[template(path = "newsletter.html")]
struct NewsletterHtml<'a> {
    title: &'a str,
    body_html: &'a str,
    related: &'a [RelatedPost<'a>],
    unsubscribe_link: &'a str,
}

#[derive(Template)]
#[template(path = "newsletter.txt")]
struct NewsletterText<'a> {
    title: &'a str,
    body_text: &'a str,
    related: &'a [RelatedPost<'a>],
    unsubscribe_link: &'a str,
}

/// Builds recipient-addressed newsletter bodies. Links are built under the public base url,
/// keeping any path prefix it carries; rendering does no I/O.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    unsubscribe_url: Url,
    /// Ends with `/v1/post/`.
    post_base: Url,
}

impl TemplateRenderer {
    pub fn new(base_url: &str) -> Result<Self, TemplateError> {
        let base_url = Url::parse(base_url)?;
        Ok(Self {
            unsubscribe_url: under_base(&base_url, &["v1", "newsletters", "unsubscribe"])?,
            post_base: under_base(&base_url, &["v1", "post", ""])?,
        })
    }

    pub fn render(
        &self,
        title: &str,
        body: &RichBody,
        referenced_items: &[ReferencedItem],
        recipient_email: &str,
    ) -> Result<RenderedNewsletter, TemplateError> {
        let unsubscribe_link = self.unsubscribe_link(recipient_email);
        let related: Vec<_> = referenced_items
            .iter()
            .map(|item| RelatedPost {
                title: &item.title,
                summary: &item.summary,
                link: self.post_link(item.id),
            })
            .collect();

        let html = NewsletterHtml {
            title,
            body_html: &body.to_html()?,
            related: &related,
            unsubscribe_link: unsubscribe_link.as_str(),
        }
        .render()?;
        let text = NewsletterText {
            title,
            body_text: body.to_text().trim_end(),
            related: &related,
            unsubscribe_link: unsubscribe_link.as_str(),
        }
        .render()?;

        Ok(RenderedNewsletter { html, text })
    }

    /// Same address in, same link out.
    pub fn unsubscribe_link(&self, recipient_email: &str) -> Url {
        let mut link = self.unsubscribe_url.clone();
        link.query_pairs_mut().append_pair("email", recipient_email);
        link
    }

    fn post_link(&self, id: Uuid) -> String {
        format!("{}{id}", self.post_base)
    }
}

fn under_base(base_url: &Url, segments: &[&str]) -> Result<Url, TemplateError> {
    let mut url = base_url.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.path_segments_mut()
        .map_err(|()| TemplateError::CannotBeABase(base_url.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
