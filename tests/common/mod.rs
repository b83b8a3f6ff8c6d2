#![allow(dead_code)]

use actix_web::cookie::Cookie;
use actix_web::dev::ServiceResponse;
use actix_web::http::header;
use actix_web::web::Data;
use async_trait::async_trait;
use guildsite::config::Config;
use guildsite::group::{get_groups_for_user, GroupType};
use guildsite::oauth::{DiscordLogin, DiscordOAuth, OAuthError};
use guildsite::orm::{guides, social_accounts, users};
use guildsite::stats::{guild_membership, role_membership, MembershipStore, StatsDatabase};
use guildsite::webhook::Webhook;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, Set};
use serde_json::json;
use std::sync::Arc;

pub const GUILD_ID: i64 = 181866934353133570;
pub const ADMIN_ROLE_ID: i64 = 1000;

/// Discord stand-in. The authorization code is the Discord id of the user
/// logging in; the code `fail` simulates Discord being unreachable.
pub struct FakeDiscord;

#[async_trait]
impl DiscordOAuth for FakeDiscord {
    fn authorize_url(&self, state: &str) -> String {
        format!("https://discord.test/oauth2/authorize?state={}", state)
    }

    async fn exchange_code(&self, code: &str) -> Result<String, OAuthError> {
        match code {
            "fail" => Err(OAuthError::Http("connection refused".to_owned())),
            code => Ok(format!("token-{}", code)),
        }
    }

    async fn fetch_login(&self, access_token: &str) -> Result<DiscordLogin, OAuthError> {
        let id = access_token.trim_start_matches("token-");
        DiscordLogin::from_parts(
            json!({
                "id": id,
                "username": format!("user{}", id),
                "discriminator": "0042",
                "avatar": null,
            }),
            json!([{ "id": GUILD_ID.to_string(), "name": "Programming" }]),
        )
    }
}

fn test_env(key: &str) -> Option<String> {
    let value = match key {
        "DATABASE_URL" | "STATS_DATABASE_URL" => "sqlite::memory:",
        "DISCORD_ADMIN_ROLE_ID" => "1000",
        "DISCORD_CLIENT_ID" => "client",
        "DISCORD_CLIENT_SECRET" => "secret",
        "DISCORD_REDIRECT_URI" => "http://localhost/accounts/discord/login/callback/",
        "SECRET_KEY" => "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef",
        "ALLOWED_HOSTS" => "localhost",
        "SITE_URL" => "http://localhost",
        _ => return None,
    };
    Some(value.to_owned())
}

pub struct TestContext {
    pub config: Data<Config>,
    pub db: Data<DatabaseConnection>,
    pub stats: Arc<StatsDatabase>,
    pub store: Data<Arc<dyn MembershipStore>>,
    pub oauth: Data<Arc<dyn DiscordOAuth>>,
    pub webhook: Data<Webhook>,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_webhook(None).await
    }

    /// Context whose guide announcements go to `webhook_url`.
    pub async fn with_webhook(webhook_url: Option<&str>) -> Self {
        let config = Config::from_lookup(test_env).expect("test config");

        // Each pool gets its own in-memory database.
        let db = guildsite::db::connect(&config.database_url, 1)
            .await
            .expect("site database");
        guildsite::db::create_site_tables(&db)
            .await
            .expect("site tables");
        let stats_db = guildsite::db::connect(&config.stats_database_url, 1)
            .await
            .expect("stats database");
        guildsite::db::create_stats_tables(&stats_db)
            .await
            .expect("stats tables");

        let stats = Arc::new(StatsDatabase::new(stats_db, config.guild.clone()));
        let store: Arc<dyn MembershipStore> = stats.clone();
        let oauth: Arc<dyn DiscordOAuth> = Arc::new(FakeDiscord);
        let webhook = Webhook::new(webhook_url.map(str::to_owned), config.site_url.clone()).expect("webhook");

        Self {
            config: Data::new(config),
            db: Data::new(db),
            stats,
            store: Data::new(store),
            oauth: Data::new(oauth),
            webhook: Data::new(webhook),
        }
    }

    pub fn stats_db(&self) -> &DatabaseConnection {
        self.stats.connection()
    }

    /// Mirrors a Discord user as a current member of the guild.
    pub async fn add_member(&self, discord_id: i64) {
        guild_membership::Entity::insert(guild_membership::ActiveModel {
            user_id: Set(discord_id),
            guild_id: Set(GUILD_ID),
            is_member: Set(true),
            joined_at: Set(None),
            nick: Set(None),
        })
        .exec(self.stats_db())
        .await
        .expect("seed member");
    }

    /// Flags a mirrored member as having left the guild.
    pub async fn remove_member(&self, discord_id: i64) {
        guild_membership::Entity::update_many()
            .col_expr(guild_membership::Column::IsMember, Expr::value(false))
            .filter(guild_membership::Column::UserId.eq(discord_id))
            .exec(self.stats_db())
            .await
            .expect("remove member");
    }

    /// Grants the configured admin role.
    pub async fn add_admin(&self, discord_id: i64) {
        role_membership::Entity::insert(role_membership::ActiveModel {
            role_id: Set(ADMIN_ROLE_ID),
            user_id: Set(discord_id),
            guild_id: Set(GUILD_ID),
        })
        .exec(self.stats_db())
        .await
        .expect("seed admin");
    }

    /// Local user id linked to a Discord id.
    pub async fn user_id(&self, discord_id: i64) -> i32 {
        social_accounts::Entity::find()
            .filter(social_accounts::Column::Uid.eq(discord_id))
            .one(self.db.get_ref())
            .await
            .expect("social account query")
            .expect("linked social account")
            .user_id
    }

    pub async fn user(&self, user_id: i32) -> Option<users::Model> {
        users::Entity::find_by_id(user_id)
            .one(self.db.get_ref())
            .await
            .expect("user query")
    }

    pub async fn groups(&self, user_id: i32) -> Vec<GroupType> {
        get_groups_for_user(self.db.get_ref(), user_id).await
    }

    pub async fn guide(&self, guide_id: i32) -> Option<guides::Model> {
        guides::Entity::find_by_id(guide_id)
            .one(self.db.get_ref())
            .await
            .expect("guide query")
    }

    pub async fn guide_count(&self) -> usize {
        guides::Entity::find()
            .count(self.db.get_ref())
            .await
            .expect("guide count")
    }

    pub async fn user_count(&self) -> usize {
        users::Entity::find()
            .count(self.db.get_ref())
            .await
            .expect("user count")
    }
}

/// Builds the application the way the binary does, minus the access log.
macro_rules! test_app {
    ($ctx:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($ctx.db.clone())
                .app_data($ctx.store.clone())
                .app_data($ctx.oauth.clone())
                .app_data($ctx.webhook.clone())
                .app_data($ctx.config.clone())
                .app_data(
                    actix_web::web::FormConfig::default().limit(guildsite::guide::FORM_LIMIT),
                )
                .wrap(guildsite::web::error_handlers())
                .wrap(guildsite::middleware::ClientCtx::default())
                .wrap(guildsite::middleware::session_middleware(&$ctx.config))
                .wrap(guildsite::middleware::AllowedHosts::new(
                    $ctx.config.allowed_hosts.clone(),
                ))
                .configure(guildsite::web::configure),
        )
        .await
    };
}

/// Runs the Discord login round trip and evaluates to the session cookie.
macro_rules! login {
    ($app:expr, $discord_id:expr) => {{
        let req = actix_web::test::TestRequest::get()
            .uri("/accounts/discord/login/")
            .to_request();
        let resp = actix_web::test::call_service(&$app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::FOUND);
        let state = common::query_param(&common::location(&resp), "state").expect("state param");
        let cookie = common::session_cookie(&resp).expect("pending login cookie");

        let req = actix_web::test::TestRequest::get()
            .uri(&format!(
                "/accounts/discord/login/callback/?code={}&state={}",
                $discord_id, state
            ))
            .cookie(cookie)
            .to_request();
        let resp = actix_web::test::call_service(&$app, req).await;
        assert_eq!(
            resp.status(),
            actix_web::http::StatusCode::FOUND,
            "login callback"
        );
        common::session_cookie(&resp).expect("session cookie")
    }};
}

pub fn session_cookie<B>(resp: &ServiceResponse<B>) -> Option<Cookie<'static>> {
    resp.response()
        .cookies()
        .find(|cookie| cookie.name() == "id")
        .map(|cookie| cookie.into_owned())
}

pub fn location<B>(resp: &ServiceResponse<B>) -> String {
    resp.headers()
        .get(header::LOCATION)
        .expect("Location header")
        .to_str()
        .expect("ascii Location")
        .to_owned()
}

pub fn query_param(location: &str, name: &str) -> Option<String> {
    let url = url::Url::parse(location).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

pub fn text(body: actix_web::web::Bytes) -> String {
    String::from_utf8(body.to_vec()).expect("utf-8 body")
}
