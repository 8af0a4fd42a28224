// API route configuration

use crate::api::handlers;
use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(handlers::index))
        .route("/health", web::get().to(handlers::health_check))
        .route("/search_dynamic", web::get().to(handlers::search_dynamic))
        .route("/cards/{cid}", web::get().to(handlers::get_card));
}
