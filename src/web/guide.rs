use super::redirect;
use crate::guide::{self as guides, GuideDetail, GuideInput, GuideListItem};
use crate::middleware::ClientCtx;
use crate::orm::guides::Model as Guide;
use crate::permission::{self, GuideAccess};
use crate::stats::MembershipStore;
use crate::user::UserSummary;
use crate::webhook::{GuideEvent, GuideNotice, Webhook};
use actix_web::http::StatusCode;
use actix_web::{error, get, post, route, web, web::Data, Error, HttpResponse};
use askama_actix::{Template, TemplateToResponse};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    // `create` is registered ahead of `{guide_id}` routes.
    conf.service(create_guide_form)
        .service(create_guide)
        .service(view_guides)
        .service(view_guide)
        .service(edit_guide)
        .service(update_guide)
        .service(delete_guide)
        .service(destroy_guide);
}

/// A selectable editor on the guide form.
pub struct EditorChoice {
    pub id: i32,
    pub name: String,
    pub selected: bool,
}

#[derive(Template)]
#[template(path = "guides/index.html")]
struct GuidesTemplate<'a> {
    client: ClientCtx,
    guides: &'a [GuideListItem],
    can_create: bool,
}

#[derive(Template)]
#[template(path = "guides/detail.html")]
struct GuideTemplate<'a> {
    client: ClientCtx,
    detail: &'a GuideDetail,
    access: GuideAccess,
}

#[derive(Template)]
#[template(path = "guides/form.html")]
struct GuideFormTemplate<'a> {
    client: ClientCtx,
    heading: &'a str,
    action: &'a str,
    input: &'a GuideInput,
    editors: Vec<EditorChoice>,
    show_editors: bool,
    error: Option<String>,
}

#[derive(Template)]
#[template(path = "guides/delete.html")]
struct GuideDeleteTemplate<'a> {
    client: ClientCtx,
    detail: &'a GuideDetail,
}

fn editor_choices(eligible: &[UserSummary], selected: &[i32]) -> Vec<EditorChoice> {
    eligible
        .iter()
        .map(|user| EditorChoice {
            id: user.id,
            name: user.name.to_owned(),
            selected: selected.contains(&user.id),
        })
        .collect()
}

fn notice(guide: &Guide, author: &UserSummary) -> GuideNotice {
    GuideNotice {
        guide_id: guide.id,
        title: guide.title.to_owned(),
        overview: guide.overview.to_owned(),
        author_name: author.name.to_owned(),
        author_avatar: author.avatar_url.to_owned(),
    }
}

fn lookup_failed(e: sea_orm::DbErr) -> Error {
    log::error!("Stats mirror lookup failed: {}", e);
    error::ErrorInternalServerError("Could not check guild membership.")
}

/// Loads a guide for a mutating route: login first, then existence, then rights.
async fn guide_for_change(
    client: &ClientCtx,
    db: &DatabaseConnection,
    store: &dyn MembershipStore,
    guide_id: i32,
) -> Result<(GuideDetail, GuideAccess), Error> {
    permission::require_user(client)?;
    let detail = guides::load_guide(db, guide_id)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Guide not found."))?;
    let access =
        permission::guide_access(store, client, detail.guide.author_id, &detail.editor_ids())
            .await
            .map_err(lookup_failed)?;
    Ok((detail, access))
}

#[get("/guides/")]
async fn view_guides(
    client: ClientCtx,
    db: Data<DatabaseConnection>,
    stats: Data<Arc<dyn MembershipStore>>,
) -> Result<HttpResponse, Error> {
    let guides = guides::list_guides(&db)
        .await
        .map_err(error::ErrorInternalServerError)?;
    let can_create = permission::is_member(stats.get_ref().as_ref(), &client)
        .await
        .map_err(lookup_failed)?;

    Ok(GuidesTemplate {
        client,
        guides: &guides,
        can_create,
    }
    .to_response())
}

#[get("/guides/{guide_id}")]
async fn view_guide(
    client: ClientCtx,
    db: Data<DatabaseConnection>,
    stats: Data<Arc<dyn MembershipStore>>,
    path: web::Path<i32>,
) -> Result<HttpResponse, Error> {
    let detail = guides::load_guide(&db, path.into_inner())
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Guide not found."))?;
    let access = permission::guide_access(
        stats.get_ref().as_ref(),
        &client,
        detail.guide.author_id,
        &detail.editor_ids(),
    )
    .await
    .map_err(lookup_failed)?;

    Ok(GuideTemplate {
        client,
        detail: &detail,
        access,
    }
    .to_response())
}

#[get("/guides/create")]
async fn create_guide_form(
    client: ClientCtx,
    db: Data<DatabaseConnection>,
    stats: Data<Arc<dyn MembershipStore>>,
) -> Result<HttpResponse, Error> {
    let store = stats.get_ref().as_ref();
    let user_id = permission::require_member(store, &client).await?;
    let eligible = guides::eligible_editors(&db, store, user_id)
        .await
        .map_err(lookup_failed)?;

    Ok(GuideFormTemplate {
        client,
        heading: "New guide",
        action: "/guides/create",
        input: &GuideInput::default(),
        editors: editor_choices(&eligible, &[]),
        show_editors: true,
        error: None,
    }
    .to_response())
}

#[post("/guides/create")]
async fn create_guide(
    client: ClientCtx,
    db: Data<DatabaseConnection>,
    stats: Data<Arc<dyn MembershipStore>>,
    webhook: Data<Webhook>,
    form: web::Form<Vec<(String, String)>>,
) -> Result<HttpResponse, Error> {
    let store = stats.get_ref().as_ref();
    let user_id = permission::require_member(store, &client).await?;
    let eligible = guides::eligible_editors(&db, store, user_id)
        .await
        .map_err(lookup_failed)?;

    let submitted = GuideInput::from_pairs(form.into_inner());
    let input = match submitted.clone().validate() {
        Ok(input) => input,
        Err(message) => {
            let mut res = GuideFormTemplate {
                editors: editor_choices(&eligible, &submitted.editors),
                client,
                heading: "New guide",
                action: "/guides/create",
                input: &submitted,
                show_editors: true,
                error: Some(message),
            }
            .to_response();
            *res.status_mut() = StatusCode::UNPROCESSABLE_ENTITY;
            return Ok(res);
        }
    };

    let editors = guides::filter_editors(&input.editors, &eligible);
    let guide = guides::create_guide(&db, user_id, &input, &editors)
        .await
        .map_err(error::ErrorInternalServerError)?;
    log::info!("User {} published guide {}.", user_id, guide.id);

    if let Some(author) = client.get_user() {
        webhook.notify(GuideEvent::Created, notice(&guide, &author));
    }

    Ok(redirect(&format!("/guides/{}", guide.id)))
}

#[get("/guides/{guide_id}/edit")]
async fn edit_guide(
    client: ClientCtx,
    db: Data<DatabaseConnection>,
    stats: Data<Arc<dyn MembershipStore>>,
    path: web::Path<i32>,
) -> Result<HttpResponse, Error> {
    let store = stats.get_ref().as_ref();
    let (detail, access) = guide_for_change(&client, &db, store, path.into_inner()).await?;
    if !access.can_edit() {
        return Err(error::ErrorForbidden(permission::NOT_PERMITTED));
    }

    let editors = if access.can_manage_editors() {
        let eligible = guides::eligible_editors(&db, store, detail.guide.author_id)
            .await
            .map_err(lookup_failed)?;
        editor_choices(&eligible, &detail.editor_ids())
    } else {
        Vec::new()
    };
    let input = GuideInput {
        title: detail.guide.title.to_owned(),
        overview: detail.guide.overview.to_owned(),
        content: detail.guide.content_raw.to_owned(),
        editors: detail.editor_ids(),
    };
    let action = format!("/guides/{}/edit", detail.guide.id);

    Ok(GuideFormTemplate {
        client,
        heading: "Edit guide",
        action: &action,
        input: &input,
        editors,
        show_editors: access.can_manage_editors(),
        error: None,
    }
    .to_response())
}

#[post("/guides/{guide_id}/edit")]
async fn update_guide(
    client: ClientCtx,
    db: Data<DatabaseConnection>,
    stats: Data<Arc<dyn MembershipStore>>,
    webhook: Data<Webhook>,
    path: web::Path<i32>,
    form: web::Form<Vec<(String, String)>>,
) -> Result<HttpResponse, Error> {
    let store = stats.get_ref().as_ref();
    let (detail, access) = guide_for_change(&client, &db, store, path.into_inner()).await?;
    if !access.can_edit() {
        return Err(error::ErrorForbidden(permission::NOT_PERMITTED));
    }

    let eligible = if access.can_manage_editors() {
        guides::eligible_editors(&db, store, detail.guide.author_id)
            .await
            .map_err(lookup_failed)?
    } else {
        Vec::new()
    };

    let submitted = GuideInput::from_pairs(form.into_inner());
    let input = match submitted.clone().validate() {
        Ok(input) => input,
        Err(message) => {
            let action = format!("/guides/{}/edit", detail.guide.id);
            let mut res = GuideFormTemplate {
                editors: editor_choices(&eligible, &submitted.editors),
                client,
                heading: "Edit guide",
                action: &action,
                input: &submitted,
                show_editors: access.can_manage_editors(),
                error: Some(message),
            }
            .to_response();
            *res.status_mut() = StatusCode::UNPROCESSABLE_ENTITY;
            return Ok(res);
        }
    };

    // Editors may change the text but never the editor list.
    let editors = if access.can_manage_editors() {
        Some(guides::filter_editors(&input.editors, &eligible))
    } else {
        None
    };
    let guide = guides::update_guide(&db, detail.guide, &input, editors.as_deref())
        .await
        .map_err(error::ErrorInternalServerError)?;
    log::info!("User {:?} updated guide {}.", client.get_id(), guide.id);

    webhook.notify(GuideEvent::Updated, notice(&guide, &detail.author));

    Ok(redirect(&format!("/guides/{}", guide.id)))
}

#[get("/guides/{guide_id}/delete")]
async fn delete_guide(
    client: ClientCtx,
    db: Data<DatabaseConnection>,
    stats: Data<Arc<dyn MembershipStore>>,
    path: web::Path<i32>,
) -> Result<HttpResponse, Error> {
    let (detail, access) =
        guide_for_change(&client, &db, stats.get_ref().as_ref(), path.into_inner()).await?;
    if !access.can_delete() {
        return Err(error::ErrorForbidden(permission::NOT_PERMITTED));
    }

    Ok(GuideDeleteTemplate {
        client,
        detail: &detail,
    }
    .to_response())
}

#[route("/guides/{guide_id}/delete", method = "POST", method = "DELETE")]
async fn destroy_guide(
    client: ClientCtx,
    db: Data<DatabaseConnection>,
    stats: Data<Arc<dyn MembershipStore>>,
    webhook: Data<Webhook>,
    path: web::Path<i32>,
) -> Result<HttpResponse, Error> {
    let (detail, access) =
        guide_for_change(&client, &db, stats.get_ref().as_ref(), path.into_inner()).await?;
    if !access.can_delete() {
        return Err(error::ErrorForbidden(permission::NOT_PERMITTED));
    }

    guides::delete_guide(&db, detail.guide.id)
        .await
        .map_err(error::ErrorInternalServerError)?;
    log::info!("User {:?} deleted guide {}.", client.get_id(), detail.guide.id);

    webhook.notify(GuideEvent::Deleted, notice(&detail.guide, &detail.author));

    Ok(redirect("/guides/"))
}
