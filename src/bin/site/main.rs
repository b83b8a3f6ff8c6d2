use actix_web::middleware::Logger;
use actix_web::web::{Data, FormConfig};
use actix_web::{App, HttpServer};
use env_logger::Env;
use guildsite::config::Config;
use guildsite::middleware::{session_middleware, AllowedHosts, ClientCtx};
use guildsite::oauth::{DiscordClient, DiscordOAuth};
use guildsite::stats::{MembershipStore, StatsDatabase};
use guildsite::webhook::Webhook;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_lib_mods();

    let config = Config::from_env()?;
    let db = guildsite::db::connect(&config.database_url, 20).await?;
    guildsite::db::create_site_tables(&db).await?;
    let stats_db = guildsite::db::connect(&config.stats_database_url, 10).await?;

    let store: Arc<dyn MembershipStore> =
        Arc::new(StatsDatabase::new(stats_db, config.guild.clone()));
    let oauth: Arc<dyn DiscordOAuth> = Arc::new(DiscordClient::new(config.oauth.clone())?);
    let webhook = Webhook::new(config.webhook_url.clone(), config.site_url.clone())?;
    if !webhook.is_enabled() {
        log::info!("DISCORD_WEBHOOK_URL is not set; guide announcements are disabled.");
    }

    let bind_address = config.bind_address.clone();
    let db = Data::new(db);
    let store = Data::new(store);
    let oauth = Data::new(oauth);
    let webhook = Data::new(webhook);
    let config = Data::new(config);

    log::info!("Listening on {}", bind_address);

    HttpServer::new(move || {
        // Order of middleware IS IMPORTANT and is in REVERSE EXECUTION ORDER.
        App::new()
            .app_data(db.clone())
            .app_data(store.clone())
            .app_data(oauth.clone())
            .app_data(webhook.clone())
            .app_data(config.clone())
            .app_data(FormConfig::default().limit(guildsite::guide::FORM_LIMIT))
            .wrap(guildsite::web::error_handlers())
            .wrap(ClientCtx::default())
            .wrap(session_middleware(&config))
            .wrap(AllowedHosts::new(config.allowed_hosts.clone()))
            .wrap(Logger::new("%a %{User-Agent}i"))
            .configure(guildsite::web::configure)
    })
    .bind(bind_address)?
    .run()
    .await?;

    Ok(())
}

/// Initialize third party crates we rely on but don't have control over.
pub fn init_lib_mods() {
    // A missing .env is fine; the environment may already be populated.
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}
