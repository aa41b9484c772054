use actix_web::{middleware, web};

use crate::{authentication, routes};

pub fn admin_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/newsletters")
            .wrap(middleware::from_fn(authentication::require_admin_token))
            .route("", web::post().to(routes::enqueue_newsletter))
            .route("", web::get().to(routes::list_campaigns))
            .route("/{id}", web::get().to(routes::get_campaign)),
    );
}
