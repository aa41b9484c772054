/// Rich-text source of a newsletter, stored verbatim and interpreted at render time.
#[derive(Debug)]
pub struct NewsletterBody(String);

impl NewsletterBody {
    pub fn parse(s: String) -> Result<Self, String> {
        if s.trim().is_empty() {
            return Err("Invalid newsletter body: cannot be empty.".to_string());
        }

        if s.len() > 200_000 {
            return Err(
                "Invalid newsletter body: cannot be longer than 200,000 bytes.".to_string(),
            );
        }

        // Not trimmed: an ops document is whitespace-sensitive
        Ok(Self(s))
    }
}

impl AsRef<str> for NewsletterBody {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NewsletterBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
