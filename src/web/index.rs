use crate::guide::{latest_guides, GuideListItem, LATEST_LIMIT};
use crate::middleware::ClientCtx;
use crate::stats::MembershipStore;
use actix_web::{error, get, web::Data, Error, Responder};
use askama_actix::{Template, TemplateToResponse};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_index);
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate<'a> {
    client: ClientCtx,
    total_members: usize,
    guides: &'a [GuideListItem],
}

#[get("/")]
async fn view_index(
    client: ClientCtx,
    db: Data<DatabaseConnection>,
    stats: Data<Arc<dyn MembershipStore>>,
) -> Result<impl Responder, Error> {
    let total_members = stats.member_count().await.map_err(|e| {
        log::error!("view_index: member_count: {}", e);
        error::ErrorInternalServerError("Could not count guild members.")
    })?;
    let guides = latest_guides(&db, LATEST_LIMIT)
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(IndexTemplate {
        client,
        total_members,
        guides: &guides,
    }
    .to_response())
}
