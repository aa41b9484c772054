mod middleware;

pub use middleware::{AdminToken, CronSecret, require_admin_token, require_cron_secret};
