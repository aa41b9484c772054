use std::fmt::{self, Display, Formatter};

use validator::ValidateEmail;

/// An address the dispatcher is willing to hand to the mail transport.
#[derive(Debug, Clone)]
pub struct SubscriberEmail(String);

impl SubscriberEmail {
    /// Returns an instance of `SubscriberEmail` if all conditions are met.
    pub fn parse(s: String) -> Result<Self, String> {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Err("Invalid email: email cannot be empty.".to_string());
        }

        // RFC 5321: 64 local + 1 @ + 255 domain = 320 characters
        if trimmed.len() > 320 {
            return Err("Invalid email: cannot be longer than 320 characters.".to_string());
        }

        if !trimmed.validate_email() {
            return Err(format!(
                "Invalid email: '{trimmed}' does not match the required format."
            ));
        }

        Ok(SubscriberEmail(trimmed.to_string()))
    }
}

impl AsRef<str> for SubscriberEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for SubscriberEmail {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
