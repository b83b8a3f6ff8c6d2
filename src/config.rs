use actix_web::cookie::Key;
use derive_more::Display;
use std::env;
use std::str::FromStr;

/// Guild whose members may publish guides unless overridden.
pub const DEFAULT_GUILD_ID: i64 = 181866934353133570;

/// Minimum length of SECRET_KEY; the cookie key is derived from it.
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Display)]
pub enum ConfigError {
    #[display(fmt = "{} must be set", _0)]
    Missing(&'static str),
    #[display(fmt = "{} is invalid: {}", _0, _1)]
    Invalid(&'static str, String),
}

impl std::error::Error for ConfigError {}

/// Identifies the Discord guild and its administrator role.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuildConfig {
    pub guild_id: i64,
    pub admin_role_id: i64,
}

/// Registered Discord application credentials.
#[derive(Clone, Debug)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub stats_database_url: String,
    pub guild: GuildConfig,
    pub webhook_url: Option<String>,
    pub oauth: OAuthConfig,
    pub secret_key: String,
    pub allowed_hosts: Vec<String>,
    pub site_url: String,
    pub stats_url: String,
    pub bind_address: String,
}

impl Config {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads configuration through an arbitrary lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let secret_key = require("SECRET_KEY")?;
        if secret_key.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid(
                "SECRET_KEY",
                format!("must be at least {} bytes", MIN_SECRET_LEN),
            ));
        }

        let guild_id = match get("DISCORD_GUILD_ID") {
            Some(value) => parse("DISCORD_GUILD_ID", &value)?,
            None => DEFAULT_GUILD_ID,
        };
        let admin_role_id = parse("DISCORD_ADMIN_ROLE_ID", &require("DISCORD_ADMIN_ROLE_ID")?)?;

        let allowed_hosts = get("ALLOWED_HOSTS")
            .unwrap_or_else(|| "127.0.0.1".to_owned())
            .split(',')
            .map(|host| host.trim().to_lowercase())
            .filter(|host| !host.is_empty())
            .collect();

        let site_url = get("SITE_URL")
            .unwrap_or_else(|| "http://127.0.0.1:8080".to_owned())
            .trim_end_matches('/')
            .to_owned();
        url::Url::parse(&site_url)
            .map_err(|e| ConfigError::Invalid("SITE_URL", e.to_string()))?;

        Ok(Self {
            database_url: require("DATABASE_URL")?,
            stats_database_url: require("STATS_DATABASE_URL")?,
            guild: GuildConfig {
                guild_id,
                admin_role_id,
            },
            webhook_url: get("DISCORD_WEBHOOK_URL"),
            oauth: OAuthConfig {
                client_id: require("DISCORD_CLIENT_ID")?,
                client_secret: require("DISCORD_CLIENT_SECRET")?,
                redirect_uri: require("DISCORD_REDIRECT_URI")?,
            },
            secret_key,
            allowed_hosts,
            site_url,
            stats_url: get("STATS_URL").unwrap_or_else(|| "https://ddd.raylu.net".to_owned()),
            bind_address: get("BIND_ADDRESS").unwrap_or_else(|| "127.0.0.1:8080".to_owned()),
        })
    }

    /// Session cookie signing key.
    pub fn cookie_key(&self) -> Key {
        Key::derive_from(self.secret_key.as_bytes())
    }

    /// Absolute URL for a site path.
    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}{}", self.site_url, path)
    }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid(key, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("DATABASE_URL", "sqlite::memory:"),
            ("STATS_DATABASE_URL", "sqlite::memory:"),
            ("DISCORD_ADMIN_ROLE_ID", "42"),
            ("DISCORD_CLIENT_ID", "client"),
            ("DISCORD_CLIENT_SECRET", "secret"),
            ("DISCORD_REDIRECT_URI", "http://localhost/accounts/discord/login/callback/"),
            ("SECRET_KEY", "0123456789abcdef0123456789abcdef0123456789abcdef"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        Config::from_lookup(|key| env.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn defaults_apply() {
        let config = load(&base_env()).expect("config");
        assert_eq!(config.guild.guild_id, DEFAULT_GUILD_ID);
        assert_eq!(config.guild.admin_role_id, 42);
        assert_eq!(config.allowed_hosts, vec!["127.0.0.1".to_owned()]);
        assert_eq!(config.stats_url, "https://ddd.raylu.net");
        assert_eq!(config.bind_address, "127.0.0.1:8080");
        assert!(config.webhook_url.is_none());
    }

    #[test]
    fn missing_required_value() {
        let mut env = base_env();
        env.remove("STATS_DATABASE_URL");
        assert!(matches!(
            load(&env),
            Err(ConfigError::Missing("STATS_DATABASE_URL"))
        ));
    }

    #[test]
    fn empty_value_is_unset() {
        let mut env = base_env();
        env.insert("DISCORD_WEBHOOK_URL", "  ");
        env.insert("DISCORD_GUILD_ID", "");
        let config = load(&env).expect("config");
        assert!(config.webhook_url.is_none());
        assert_eq!(config.guild.guild_id, DEFAULT_GUILD_ID);
    }

    #[test]
    fn invalid_guild_id() {
        let mut env = base_env();
        env.insert("DISCORD_GUILD_ID", "not-a-number");
        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid("DISCORD_GUILD_ID", _))
        ));
    }

    #[test]
    fn short_secret_rejected() {
        let mut env = base_env();
        env.insert("SECRET_KEY", "short");
        assert!(matches!(load(&env), Err(ConfigError::Invalid("SECRET_KEY", _))));
    }

    #[test]
    fn hosts_and_site_url_are_normalized() {
        let mut env = base_env();
        env.insert("ALLOWED_HOSTS", "Example.com, localhost ,");
        env.insert("SITE_URL", "https://example.com/");
        let config = load(&env).expect("config");
        assert_eq!(config.allowed_hosts, vec!["example.com", "localhost"]);
        assert_eq!(config.absolute_url("/guides/1"), "https://example.com/guides/1");
    }
}
