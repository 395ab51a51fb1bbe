use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

use crate::{
    error::PublishError,
    http,
    publishers::{Credentials, PublishContent, Publisher, PublisherKind, SessionSlot, compose},
};

const PLATFORM: &str = "Threads";
pub const ACCESS_TOKEN_ENV: &str = "THREADS_ACCESS_TOKEN";
pub const USER_ID_ENV: &str = "THREADS_USER_ID";

#[derive(Clone)]
struct Session {
    token: String,
    user_id: String,
}

#[derive(Deserialize)]
struct IdResponse {
    id: String,
}

/// Text posts through the Threads Graph API: create a container, then publish it.
pub struct ThreadsPublisher {
    http: Client,
    api_url: String,
    credentials: Credentials,
    session: SessionSlot<Session>,
}

impl ThreadsPublisher {
    pub fn new(api_url: &str, credentials: Credentials) -> Self {
        Self {
            http: http::client(),
            api_url: api_url.trim_end_matches('/').to_string(),
            credentials,
            session: SessionSlot::new(),
        }
    }
}

#[async_trait]
impl Publisher for ThreadsPublisher {
    fn kind(&self) -> PublisherKind {
        PublisherKind::Threads
    }

    async fn login(&self) -> Result<(), PublishError> {
        let token = self.credentials.require(PLATFORM, ACCESS_TOKEN_ENV)?;
        let user_id = self.credentials.require(PLATFORM, USER_ID_ENV)?;
        self.session.set(Session { token, user_id });
        Ok(())
    }

    async fn publish(&self, content: &PublishContent) -> Result<String, PublishError> {
        let session = self.session.get(PLATFORM)?;
        let message = compose(PublisherKind::Threads, content)?;

        let container: IdResponse = http::send_json(
            "threads",
            self.http
                .post(format!("{}/{}/threads", self.api_url, session.user_id))
                .query(&[
                    ("media_type", "TEXT"),
                    ("text", message.as_str()),
                    ("access_token", session.token.as_str()),
                ]),
        )
        .await?;

        let published: IdResponse = http::send_json(
            "threads",
            self.http
                .post(format!("{}/{}/threads_publish", self.api_url, session.user_id))
                .query(&[
                    ("creation_id", container.id.as_str()),
                    ("access_token", session.token.as_str()),
                ]),
        )
        .await?;

        info!(id = %published.id, "thread posted");
        Ok(published.id)
    }

    async fn logout(&self) -> Result<(), PublishError> {
        self.session.clear();
        Ok(())
    }
}
