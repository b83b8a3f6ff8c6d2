use super::redirect;
use crate::group::classify_user;
use crate::oauth::DiscordOAuth;
use crate::stats::MembershipStore;
use crate::user::{login_discord_user, SESSION_USER_KEY};
use actix_session::Session;
use actix_web::{error, get, web, web::Data, Error, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Session key holding the anti-forgery state of a pending login.
const STATE_KEY: &str = "oauth_state";

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(begin_login)
        .service(finish_login)
        .service(view_logout);
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

#[get("/accounts/discord/login/")]
async fn begin_login(
    session: Session,
    oauth: Data<Arc<dyn DiscordOAuth>>,
) -> Result<HttpResponse, Error> {
    let state = Uuid::new_v4().simple().to_string();
    session
        .insert(STATE_KEY, &state)
        .map_err(error::ErrorInternalServerError)?;
    Ok(redirect(&oauth.authorize_url(&state)))
}

#[get("/accounts/discord/login/callback/")]
async fn finish_login(
    session: Session,
    query: web::Query<CallbackQuery>,
    db: Data<DatabaseConnection>,
    stats: Data<Arc<dyn MembershipStore>>,
    oauth: Data<Arc<dyn DiscordOAuth>>,
) -> Result<HttpResponse, Error> {
    let expected = session
        .get::<String>(STATE_KEY)
        .map_err(error::ErrorInternalServerError)?;
    session.remove(STATE_KEY);

    if let Some(reason) = &query.error {
        log::info!("Discord login was declined: {}", reason);
        return Err(error::ErrorBadRequest("Discord login was cancelled."));
    }
    match (expected, &query.state) {
        (Some(expected), Some(state)) if expected == *state => {}
        _ => return Err(error::ErrorBadRequest("Login state did not match. Please try again.")),
    }
    let code = query
        .code
        .as_deref()
        .ok_or_else(|| error::ErrorBadRequest("Discord did not return an authorization code."))?;

    let token = oauth.exchange_code(code).await?;
    let login = oauth.fetch_login(&token).await?;
    let discord_id = login.profile.user_id()?;

    let (user, created) = login_discord_user(&db, discord_id, &login)
        .await
        .map_err(error::ErrorInternalServerError)?;
    let group = classify_user(&db, stats.get_ref().as_ref(), user.id, discord_id)
        .await
        .map_err(|e| {
            log::error!("Classifying user {} failed: {}", user.id, e);
            error::ErrorInternalServerError("Could not check guild membership.")
        })?;
    log::info!(
        "{} ({}) logged in as {:?}{}.",
        user.username,
        discord_id,
        group,
        if created { ", new account" } else { "" }
    );

    session.renew();
    session
        .insert(SESSION_USER_KEY, user.id)
        .map_err(error::ErrorInternalServerError)?;

    Ok(redirect("/"))
}

#[get("/accounts/logout/")]
async fn view_logout(session: Session) -> HttpResponse {
    session.purge();
    redirect("/")
}
