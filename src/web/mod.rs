pub mod asset;
pub mod error;
pub mod feed;
pub mod guide;
pub mod index;
pub mod login;
pub mod profile;
pub mod stats;

use actix_web::http::StatusCode;
use actix_web::middleware::ErrorHandlers;

/// Configures the web app
///
/// @see https://docs.rs/actix-web/4.0.1/actix_web/struct.App.html#method.configure
pub fn configure(conf: &mut actix_web::web::ServiceConfig) {
    // Feeds precede guides so `/guides/feed/..` never reaches `/guides/{id}`.
    feed::configure(conf);
    index::configure(conf);
    guide::configure(conf);
    profile::configure(conf);
    login::configure(conf);
    stats::configure(conf);
    asset::configure(conf);
}

/// Renders HTML error documents for the statuses handlers produce.
pub fn error_handlers<B: 'static>() -> ErrorHandlers<B> {
    ErrorHandlers::new()
        .handler(StatusCode::BAD_REQUEST, error::render_400)
        .handler(StatusCode::FORBIDDEN, error::render_403)
        .handler(StatusCode::NOT_FOUND, error::render_404)
        .handler(StatusCode::UNPROCESSABLE_ENTITY, error::render_422)
        .handler(StatusCode::INTERNAL_SERVER_ERROR, error::render_500)
        .handler(StatusCode::BAD_GATEWAY, error::render_502)
}

/// 302 to a site path.
pub(crate) fn redirect(location: &str) -> actix_web::HttpResponse {
    actix_web::HttpResponse::Found()
        .append_header(("Location", location))
        .finish()
}
