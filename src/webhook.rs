//! Discord webhook announcements for guide changes.

use serde::Serialize;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuideEvent {
    Created,
    Updated,
    Deleted,
}

impl GuideEvent {
    pub fn color(self) -> u32 {
        match self {
            Self::Created => 0x2ecc71,
            Self::Updated => 0x3498db,
            Self::Deleted => 0xe74c3c,
        }
    }

    fn title_prefix(self) -> &'static str {
        match self {
            Self::Created => "New guide",
            Self::Updated => "Guide updated",
            Self::Deleted => "Guide deleted",
        }
    }
}

/// What the announcement says about a guide.
#[derive(Clone, Debug)]
pub struct GuideNotice {
    pub guide_id: i32,
    pub title: String,
    pub overview: String,
    pub author_name: String,
    pub author_avatar: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookPayload {
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub color: u32,
    pub author: EmbedAuthor,
}

#[derive(Debug, Serialize)]
pub struct EmbedAuthor {
    pub name: String,
    pub icon_url: String,
}

/// Posts guide announcements to a Discord webhook, when one is configured.
#[derive(Clone)]
pub struct Webhook {
    client: reqwest::Client,
    url: Option<String>,
    site_url: String,
}

impl Webhook {
    pub fn new(url: Option<String>, site_url: String) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url,
            site_url,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    pub fn payload(&self, event: GuideEvent, notice: &GuideNotice) -> WebhookPayload {
        let url = match event {
            GuideEvent::Deleted => None,
            _ => Some(format!("{}/guides/{}", self.site_url, notice.guide_id)),
        };

        WebhookPayload {
            embeds: vec![Embed {
                title: format!("{}: {}", event.title_prefix(), notice.title),
                description: notice.overview.to_owned(),
                url,
                color: event.color(),
                author: EmbedAuthor {
                    name: notice.author_name.to_owned(),
                    icon_url: notice.author_avatar.to_owned(),
                },
            }],
        }
    }

    /// Sends the announcement in the background. Failures are logged and dropped.
    pub fn notify(&self, event: GuideEvent, notice: GuideNotice) {
        let url = match &self.url {
            Some(url) => url.to_owned(),
            None => return,
        };
        let payload = self.payload(event, &notice);
        let client = self.client.clone();

        actix_web::rt::spawn(async move {
            let result = client
                .post(&url)
                .json(&payload)
                .send()
                .await
                .and_then(|res| res.error_for_status());
            match result {
                Ok(_) => log::debug!("Announced {:?} of guide {}.", event, notice.guide_id),
                Err(e) => log::warn!(
                    "Webhook for {:?} of guide {} failed: {}",
                    event,
                    notice.guide_id,
                    e
                ),
            }
        });
    }
}
