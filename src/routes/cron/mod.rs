mod dispatch;
mod routes;

pub use dispatch::*;
pub use routes::cron_routes;
