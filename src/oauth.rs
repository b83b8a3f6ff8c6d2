//! Discord OAuth2 login.

use crate::config::OAuthConfig;
use actix_web::http::StatusCode;
use actix_web::ResponseError;
use async_trait::async_trait;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const AUTHORIZE_URL: &str = "https://discord.com/api/oauth2/authorize";
pub const TOKEN_URL: &str = "https://discord.com/api/oauth2/token";
pub const PROFILE_URL: &str = "https://discord.com/api/users/@me";
pub const GUILDS_URL: &str = "https://discord.com/api/users/@me/guilds";
pub const SCOPE: &str = "identify guilds";

#[derive(Debug, Display)]
pub enum OAuthError {
    #[display(fmt = "Discord could not be reached: {}", _0)]
    Http(String),
    #[display(fmt = "Discord returned an unexpected response: {}", _0)]
    Decode(String),
}

impl std::error::Error for OAuthError {}

impl ResponseError for OAuthError {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_GATEWAY
    }
}

impl From<reqwest::Error> for OAuthError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Http(e.to_string())
        }
    }
}

/// The subset of Discord's user object we keep on the local user.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DiscordProfile {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl DiscordProfile {
    /// Discord ids are snowflakes serialized as strings.
    pub fn user_id(&self) -> Result<i64, OAuthError> {
        self.id
            .parse()
            .map_err(|_| OAuthError::Decode(format!("invalid user id {:?}", self.id)))
    }

    /// Legacy four digit tag; zero for migrated usernames.
    pub fn discriminator(&self) -> i32 {
        self.discriminator
            .as_deref()
            .and_then(|d| d.parse().ok())
            .unwrap_or(0)
    }
}

/// Everything fetched from Discord after a successful authorization.
#[derive(Clone, Debug)]
pub struct DiscordLogin {
    pub profile: DiscordProfile,
    /// Raw profile object with the guild list under `guilds`.
    pub extra_data: Value,
}

impl DiscordLogin {
    pub fn from_parts(profile: Value, guilds: Value) -> Result<Self, OAuthError> {
        let parsed: DiscordProfile = serde_json::from_value(profile.clone())
            .map_err(|e| OAuthError::Decode(e.to_string()))?;
        let mut extra_data = profile;
        if let Value::Object(ref mut map) = extra_data {
            map.insert("guilds".to_owned(), guilds);
        }
        Ok(Self {
            profile: parsed,
            extra_data,
        })
    }
}

#[async_trait]
pub trait DiscordOAuth: Send + Sync {
    /// Location of Discord's consent page for this login attempt.
    fn authorize_url(&self, state: &str) -> String;

    /// Trades an authorization code for an access token.
    async fn exchange_code(&self, code: &str) -> Result<String, OAuthError>;

    /// Fetches the user's profile and guild list.
    async fn fetch_login(&self, access_token: &str) -> Result<DiscordLogin, OAuthError>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// DiscordOAuth talking to discord.com.
pub struct DiscordClient {
    http: reqwest::Client,
    config: OAuthConfig,
}

impl DiscordClient {
    pub fn new(config: OAuthConfig) -> Result<Self, OAuthError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http, config })
    }

    async fn get_json(&self, url: &str, access_token: &str) -> Result<Value, OAuthError> {
        Ok(self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }
}

#[async_trait]
impl DiscordOAuth for DiscordClient {
    fn authorize_url(&self, state: &str) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", SCOPE)
            .append_pair("state", state)
            .finish();
        format!("{}?{}", AUTHORIZE_URL, query)
    }

    async fn exchange_code(&self, code: &str) -> Result<String, OAuthError> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("scope", SCOPE),
        ];
        let token: TokenResponse = self
            .http
            .post(TOKEN_URL)
            .form(&params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(token.access_token)
    }

    async fn fetch_login(&self, access_token: &str) -> Result<DiscordLogin, OAuthError> {
        let profile = self.get_json(PROFILE_URL, access_token).await?;
        let guilds = self.get_json(GUILDS_URL, access_token).await?;
        DiscordLogin::from_parts(profile, guilds)
    }
}
