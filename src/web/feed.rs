use crate::config::Config;
use crate::guide::{latest_guides, GuideListItem, LATEST_LIMIT};
use actix_web::{error, get, web::Data, Error, HttpResponse};
use askama_actix::Template;
use chrono::{NaiveDateTime, TimeZone, Utc};
use sea_orm::DatabaseConnection;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_rss).service(view_atom);
}

const FEED_TITLE: &str = "Latest Programming Guides";
const FEED_DESCRIPTION: &str = "Newest programming guides created by our Members.";

/// One guide as it appears in a feed.
struct FeedItem {
    title: String,
    description: String,
    link: String,
    author_name: String,
    author_link: Option<String>,
    /// RFC 2822, for RSS.
    pub_date: String,
    /// RFC 3339, for Atom.
    published: String,
    updated: String,
}

#[derive(Template)]
#[template(path = "feeds/rss.xml")]
struct RssTemplate<'a> {
    title: &'a str,
    description: &'a str,
    link: &'a str,
    items: &'a [FeedItem],
}

#[derive(Template)]
#[template(path = "feeds/atom.xml")]
struct AtomTemplate<'a> {
    title: &'a str,
    description: &'a str,
    link: &'a str,
    self_link: &'a str,
    updated: &'a str,
    items: &'a [FeedItem],
}

fn as_utc(naive: &NaiveDateTime) -> chrono::DateTime<Utc> {
    Utc.from_utc_datetime(naive)
}

fn feed_items(config: &Config, guides: &[GuideListItem]) -> Vec<FeedItem> {
    guides
        .iter()
        .map(|item| FeedItem {
            title: item.guide.title.to_owned(),
            description: item.guide.overview.to_owned(),
            link: config.absolute_url(&format!("/guides/{}", item.guide.id)),
            author_name: item.author_name(),
            author_link: item
                .author
                .as_ref()
                .and_then(|author| author.profile_url())
                .map(|path| config.absolute_url(&path)),
            pub_date: as_utc(&item.guide.pub_datetime).to_rfc2822(),
            published: as_utc(&item.guide.pub_datetime).to_rfc3339(),
            updated: as_utc(&item.guide.edit_datetime).to_rfc3339(),
        })
        .collect()
}

async fn load_items(db: &DatabaseConnection, config: &Config) -> Result<Vec<FeedItem>, Error> {
    let guides = latest_guides(db, LATEST_LIMIT)
        .await
        .map_err(error::ErrorInternalServerError)?;
    Ok(feed_items(config, &guides))
}

#[get("/guides/feed/rss")]
async fn view_rss(db: Data<DatabaseConnection>, config: Data<Config>) -> Result<HttpResponse, Error> {
    let items = load_items(&db, &config).await?;
    let link = config.absolute_url("/guides/");
    let body = RssTemplate {
        title: FEED_TITLE,
        description: FEED_DESCRIPTION,
        link: &link,
        items: &items,
    }
    .render()
    .map_err(error::ErrorInternalServerError)?;

    Ok(HttpResponse::Ok()
        .content_type("application/rss+xml; charset=utf-8")
        .body(body))
}

#[get("/guides/feed/atom")]
async fn view_atom(db: Data<DatabaseConnection>, config: Data<Config>) -> Result<HttpResponse, Error> {
    let items = load_items(&db, &config).await?;
    let link = config.absolute_url("/guides/");
    let self_link = config.absolute_url("/guides/feed/atom");
    let updated = items
        .iter()
        .map(|item| item.updated.to_owned())
        .max()
        .unwrap_or_else(|| Utc::now().to_rfc3339());
    let body = AtomTemplate {
        title: FEED_TITLE,
        description: FEED_DESCRIPTION,
        link: &link,
        self_link: &self_link,
        updated: &updated,
        items: &items,
    }
    .render()
    .map_err(error::ErrorInternalServerError)?;

    Ok(HttpResponse::Ok()
        .content_type("application/atom+xml; charset=utf-8")
        .body(body))
}
