mod allowed_hosts;
mod client_ctx;

pub use allowed_hosts::AllowedHosts;
pub use client_ctx::ClientCtx;

use crate::config::Config;
use actix_session::{storage::CookieSessionStore, SessionMiddleware};

/// Signed cookie sessions keyed from SECRET_KEY.
pub fn session_middleware(config: &Config) -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), config.cookie_key())
        .cookie_secure(config.site_url.starts_with("https://"))
        .build()
}
