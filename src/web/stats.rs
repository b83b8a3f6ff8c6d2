use crate::config::Config;
use actix_web::{get, web::Data, Responder};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_stats);
}

/// Statistics live on a separate site.
#[get("/stats/")]
async fn view_stats(config: Data<Config>) -> impl Responder {
    super::redirect(&config.stats_url)
}
