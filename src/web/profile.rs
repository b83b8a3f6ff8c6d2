use super::redirect;
use crate::group::{get_groups_for_user, GroupType};
use crate::guide::guides_by_author;
use crate::middleware::ClientCtx;
use crate::orm::guides;
use crate::permission;
use crate::stats::{GuildRole, MembershipStore};
use crate::user::{self, UserProfile, BIO_MAX_LEN};
use actix_session::Session;
use actix_web::http::StatusCode;
use actix_web::{error, get, post, route, web, web::Data, Error, HttpResponse};
use askama_actix::{Template, TemplateToResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use std::sync::Arc;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_profile)
        .service(edit_profile)
        .service(update_profile)
        .service(delete_profile)
        .service(destroy_profile);
}

#[derive(Template)]
#[template(path = "profiles/detail.html")]
struct ProfileTemplate<'a> {
    client: ClientCtx,
    profile: &'a UserProfile,
    avatar_url: String,
    guides: &'a [guides::Model],
    roles: &'a [GuildRole],
    groups: &'a [GroupType],
    is_owner: bool,
}

#[derive(Template)]
#[template(path = "profiles/edit.html")]
struct ProfileEditTemplate<'a> {
    client: ClientCtx,
    profile: &'a UserProfile,
    restrict_processing: bool,
    bio: &'a str,
    error: Option<String>,
}

#[derive(Template)]
#[template(path = "profiles/delete.html")]
struct ProfileDeleteTemplate<'a> {
    client: ClientCtx,
    profile: &'a UserProfile,
    guide_count: usize,
}

#[derive(Deserialize)]
struct ProfileFormData {
    /// Checkbox; present only when ticked.
    restrict_processing: Option<String>,
    #[serde(default)]
    bio: String,
}

async fn find_profile(db: &DatabaseConnection, discord_id: i64) -> Result<UserProfile, Error> {
    user::find_profile_by_discord_id(db, discord_id)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Profile not found."))
}

/// Loads a profile for an owner-only route: login first, then existence, then ownership.
async fn owned_profile(
    client: &ClientCtx,
    db: &DatabaseConnection,
    discord_id: i64,
) -> Result<UserProfile, Error> {
    let user_id = permission::require_user(client)?;
    let profile = find_profile(db, discord_id).await?;
    if profile.user.id != user_id {
        return Err(error::ErrorForbidden(permission::NOT_PERMITTED));
    }
    Ok(profile)
}

#[get("/profile/{discord_id}")]
async fn view_profile(
    client: ClientCtx,
    db: Data<DatabaseConnection>,
    stats: Data<Arc<dyn MembershipStore>>,
    path: web::Path<i64>,
) -> Result<HttpResponse, Error> {
    let discord_id = path.into_inner();
    let profile = find_profile(&db, discord_id).await?;
    if !permission::can_view_profile(&client, profile.user.id, profile.profile.as_ref()) {
        return Err(error::ErrorForbidden(permission::PROFILE_HIDDEN));
    }

    let guides = guides_by_author(&db, profile.user.id)
        .await
        .map_err(error::ErrorInternalServerError)?;
    let groups = get_groups_for_user(&db, profile.user.id).await;
    // Roles are decoration; a mirror outage should not hide the profile.
    let roles = stats.roles_for(discord_id).await.unwrap_or_else(|e| {
        log::warn!("Could not load roles for {}: {}", discord_id, e);
        Vec::new()
    });

    Ok(ProfileTemplate {
        is_owner: client.get_id() == Some(profile.user.id),
        client,
        avatar_url: profile.summary().avatar_url,
        profile: &profile,
        guides: &guides,
        roles: &roles,
        groups: &groups,
    }
    .to_response())
}

#[get("/profile/{discord_id}/edit")]
async fn edit_profile(
    client: ClientCtx,
    db: Data<DatabaseConnection>,
    path: web::Path<i64>,
) -> Result<HttpResponse, Error> {
    let profile = owned_profile(&client, &db, path.into_inner()).await?;

    Ok(ProfileEditTemplate {
        client,
        restrict_processing: profile.is_restricted(),
        bio: profile.bio().unwrap_or_default(),
        profile: &profile,
        error: None,
    }
    .to_response())
}

#[post("/profile/{discord_id}/edit")]
async fn update_profile(
    client: ClientCtx,
    db: Data<DatabaseConnection>,
    path: web::Path<i64>,
    form: web::Form<ProfileFormData>,
) -> Result<HttpResponse, Error> {
    let discord_id = path.into_inner();
    let profile = owned_profile(&client, &db, discord_id).await?;
    let form = form.into_inner();
    let restrict_processing = form.restrict_processing.is_some();
    let bio = form.bio.trim().to_owned();

    if bio.chars().count() > BIO_MAX_LEN {
        let mut res = ProfileEditTemplate {
            client,
            profile: &profile,
            restrict_processing,
            bio: &bio,
            error: Some(format!("Bio must be at most {} characters.", BIO_MAX_LEN)),
        }
        .to_response();
        *res.status_mut() = StatusCode::UNPROCESSABLE_ENTITY;
        return Ok(res);
    }

    let bio = if bio.is_empty() { None } else { Some(bio) };
    user::update_profile(&db, profile.user.id, restrict_processing, bio)
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(redirect(&format!("/profile/{}", discord_id)))
}

#[get("/profile/{discord_id}/delete")]
async fn delete_profile(
    client: ClientCtx,
    db: Data<DatabaseConnection>,
    path: web::Path<i64>,
) -> Result<HttpResponse, Error> {
    let profile = owned_profile(&client, &db, path.into_inner()).await?;
    let guide_count = crate::guide::count_by_author(&db, profile.user.id)
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(ProfileDeleteTemplate {
        client,
        profile: &profile,
        guide_count,
    }
    .to_response())
}

#[route("/profile/{discord_id}/delete", method = "POST", method = "DELETE")]
async fn destroy_profile(
    client: ClientCtx,
    session: Session,
    db: Data<DatabaseConnection>,
    path: web::Path<i64>,
) -> Result<HttpResponse, Error> {
    let profile = owned_profile(&client, &db, path.into_inner()).await?;

    user::delete_user(&db, profile.user.id)
        .await
        .map_err(error::ErrorInternalServerError)?;
    log::info!(
        "User {} ({}) deleted their account.",
        profile.user.id,
        profile.account.uid
    );

    if client.get_id() == Some(profile.user.id) {
        session.purge();
    }

    Ok(redirect("/"))
}
