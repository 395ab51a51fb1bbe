use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::{
    error::PublishError,
    http,
    publishers::{Credentials, PublishContent, Publisher, PublisherKind, SessionSlot, compose},
};

const PLATFORM: &str = "Twitter";
pub const ACCESS_TOKEN_ENV: &str = "TWITTER_ACCESS_TOKEN";

#[derive(Deserialize)]
struct TweetResponse {
    data: TweetData,
}

#[derive(Deserialize)]
struct TweetData {
    id: String,
}

pub struct TwitterPublisher {
    http: Client,
    api_url: String,
    credentials: Credentials,
    token: SessionSlot<String>,
}

impl TwitterPublisher {
    pub fn new(api_url: &str, credentials: Credentials) -> Self {
        Self {
            http: http::client(),
            api_url: api_url.trim_end_matches('/').to_string(),
            credentials,
            token: SessionSlot::new(),
        }
    }
}

#[async_trait]
impl Publisher for TwitterPublisher {
    fn kind(&self) -> PublisherKind {
        PublisherKind::Twitter
    }

    async fn login(&self) -> Result<(), PublishError> {
        let token = self.credentials.require(PLATFORM, ACCESS_TOKEN_ENV)?;
        self.token.set(token);
        Ok(())
    }

    async fn publish(&self, content: &PublishContent) -> Result<String, PublishError> {
        let token = self.token.get(PLATFORM)?;
        let message = compose(PublisherKind::Twitter, content)?;

        let response: TweetResponse = http::send_json(
            "twitter",
            self.http
                .post(format!("{}/tweets", self.api_url))
                .bearer_auth(token)
                .json(&json!({ "text": message })),
        )
        .await?;

        info!(id = %response.data.id, "tweet posted");
        Ok(response.data.id)
    }

    async fn logout(&self) -> Result<(), PublishError> {
        self.token.clear();
        Ok(())
    }
}
