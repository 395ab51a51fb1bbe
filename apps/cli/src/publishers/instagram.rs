use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

use crate::{
    config::PublisherSettings,
    error::PublishError,
    http,
    publishers::{Credentials, PublishContent, Publisher, PublisherKind, SessionSlot, compose},
};

const PLATFORM: &str = "Instagram";
pub const ACCESS_TOKEN_ENV: &str = "INSTAGRAM_ACCESS_TOKEN";
pub const ACCOUNT_ID_ENV: &str = "INSTAGRAM_BUSINESS_ACCOUNT_ID";

#[derive(Clone)]
struct Session {
    token: String,
    account_id: String,
}

#[derive(Deserialize)]
struct IdResponse {
    id: String,
}

/// Image posts through the Instagram Graph API. Instagram fetches media by
/// URL, so images must be reachable under `instagram_media_base_url`.
pub struct InstagramPublisher {
    http: Client,
    graph_url: String,
    media_base_url: Option<String>,
    credentials: Credentials,
    session: SessionSlot<Session>,
}

impl InstagramPublisher {
    pub fn new(settings: &PublisherSettings, credentials: Credentials) -> Self {
        Self {
            http: http::client(),
            graph_url: format!("{}{}", settings.graph_base_url, settings.graph_version)
                .trim_end_matches('/')
                .to_string(),
            media_base_url: settings
                .instagram_media_base_url
                .as_ref()
                .map(|u| u.trim_end_matches('/').to_string()),
            credentials,
            session: SessionSlot::new(),
        }
    }
}

#[async_trait]
impl Publisher for InstagramPublisher {
    fn kind(&self) -> PublisherKind {
        PublisherKind::Instagram
    }

    async fn login(&self) -> Result<(), PublishError> {
        let token = self.credentials.require(PLATFORM, ACCESS_TOKEN_ENV)?;
        let account_id = self.credentials.require(PLATFORM, ACCOUNT_ID_ENV)?;
        self.session.set(Session { token, account_id });
        Ok(())
    }

    async fn publish(&self, content: &PublishContent) -> Result<String, PublishError> {
        let session = self.session.get(PLATFORM)?;
        let caption = compose(PublisherKind::Instagram, content)?;

        let media_base = self.media_base_url.as_deref().ok_or_else(|| {
            PublishError::NothingToPublish("no public media URL configured for images".to_string())
        })?;
        let file_name = content
            .images
            .first()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| PublishError::NothingToPublish("no images".to_string()))?;
        let image_url = format!("{media_base}/{file_name}");

        let container: IdResponse = http::send_json(
            "instagram",
            self.http
                .post(format!("{}/{}/media", self.graph_url, session.account_id))
                .query(&[
                    ("image_url", image_url.as_str()),
                    ("caption", caption.as_str()),
                    ("access_token", session.token.as_str()),
                ]),
        )
        .await?;

        let published: IdResponse = http::send_json(
            "instagram",
            self.http
                .post(format!("{}/{}/media_publish", self.graph_url, session.account_id))
                .query(&[
                    ("creation_id", container.id.as_str()),
                    ("access_token", session.token.as_str()),
                ]),
        )
        .await?;

        info!(id = %published.id, "instagram post published");
        Ok(published.id)
    }

    async fn logout(&self) -> Result<(), PublishError> {
        self.session.clear();
        Ok(())
    }
}
