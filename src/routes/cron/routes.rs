use actix_web::{middleware, web};

use crate::{authentication, routes};

pub fn cron_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/newsletters")
            .wrap(middleware::from_fn(authentication::require_cron_secret))
            .route("/dispatch", web::post().to(routes::dispatch_newsletter_batch)),
    );
}
