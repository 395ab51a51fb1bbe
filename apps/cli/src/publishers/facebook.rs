use async_trait::async_trait;
use reqwest::{
    Client,
    multipart::{Form, Part},
};
use serde::Deserialize;
use tracing::info;

use crate::{
    config::PublisherSettings,
    error::PublishError,
    http,
    publishers::{Credentials, PublishContent, Publisher, PublisherKind, SessionSlot, compose},
};

const PLATFORM: &str = "Facebook";
pub const ACCESS_TOKEN_ENV: &str = "FBIG_ACCESS_TOKEN";

#[derive(Deserialize)]
struct PhotoResponse {
    id: String,
}

/// Uploads the first story image with a caption to a Facebook page.
pub struct FacebookPublisher {
    http: Client,
    photos_url: String,
    credentials: Credentials,
    token: SessionSlot<String>,
}

impl FacebookPublisher {
    pub fn new(settings: &PublisherSettings, page_id: &str, credentials: Credentials) -> Self {
        Self {
            http: http::client(),
            photos_url: format!(
                "{}{}{}/photos",
                settings.graph_base_url, settings.graph_version, page_id
            ),
            credentials,
            token: SessionSlot::new(),
        }
    }

    pub fn photos_url(&self) -> &str {
        &self.photos_url
    }
}

#[async_trait]
impl Publisher for FacebookPublisher {
    fn kind(&self) -> PublisherKind {
        PublisherKind::Facebook
    }

    async fn login(&self) -> Result<(), PublishError> {
        let token = self.credentials.require(PLATFORM, ACCESS_TOKEN_ENV)?;
        self.token.set(token);
        Ok(())
    }

    async fn publish(&self, content: &PublishContent) -> Result<String, PublishError> {
        let token = self.token.get(PLATFORM)?;
        let caption = compose(PublisherKind::Facebook, content)?;
        let image = content
            .images
            .first()
            .ok_or_else(|| PublishError::NothingToPublish("no images".to_string()))?;

        let bytes = tokio::fs::read(image).await.map_err(|source| PublishError::Io {
            path: image.clone(),
            source,
        })?;
        let file_name = image
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "image.png".to_string());
        let form = Form::new()
            .text("caption", caption)
            .part("source", Part::bytes(bytes).file_name(file_name));

        let response: PhotoResponse = http::send_json(
            "facebook",
            self.http
                .post(&self.photos_url)
                .bearer_auth(token)
                .multipart(form),
        )
        .await?;

        info!(id = %response.id, "facebook photo posted");
        Ok(response.id)
    }

    async fn logout(&self) -> Result<(), PublishError> {
        self.token.clear();
        Ok(())
    }
}
