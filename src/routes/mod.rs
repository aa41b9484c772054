mod admin;
mod cron;
mod health_check;

pub use admin::*;
pub use cron::*;
pub use health_check::*;
