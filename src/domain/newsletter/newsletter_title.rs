use std::fmt;
use std::fmt::{Display, Formatter};
use unicode_segmentation::UnicodeSegmentation;

/// Subject line of a newsletter email.
#[derive(Debug)]
pub struct NewsletterTitle(String);

impl NewsletterTitle {
    pub fn parse(s: String) -> Result<Self, String> {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Err("Invalid newsletter title: cannot be empty.".to_string());
        }

        if trimmed.graphemes(true).count() > 200 {
            return Err(
                "Invalid newsletter title: cannot be longer than 200 characters.".to_string(),
            );
        }

        // Header injection guard, the title becomes the email subject
        if trimmed.chars().any(|c| c == '\r' || c == '\n') {
            return Err("Invalid newsletter title: cannot contain line breaks.".to_string());
        }

        Ok(Self(trimmed.to_string()))
    }
}

impl AsRef<str> for NewsletterTitle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for NewsletterTitle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
