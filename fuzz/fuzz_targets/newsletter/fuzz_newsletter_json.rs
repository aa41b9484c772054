// Run with: cargo fuzz run fuzz_newsletter_json
// Arbitrary JSON -> NewsletterData -> Newsletter validation
#![no_main]

use bulletin::domain::{Newsletter, NewsletterData};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(payload) = serde_json::from_slice::<NewsletterData>(data) {
        let _ = Newsletter::try_from(payload);
    }
});
