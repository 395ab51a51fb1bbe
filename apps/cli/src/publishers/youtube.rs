use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::{
    config::PublisherSettings,
    error::{HttpError, PublishError},
    http,
    publishers::{Credentials, PublishContent, Publisher, PublisherKind, SessionSlot, compose},
};

const PLATFORM: &str = "YouTube";
pub const ACCESS_TOKEN_ENV: &str = "YOUTUBE_ACCESS_TOKEN";
pub const REFRESH_TOKEN_ENV: &str = "YOUTUBE_REFRESH_TOKEN";
const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
/// YouTube "Film & Animation".
const CATEGORY_ID: &str = "1";

#[derive(Deserialize)]
struct VideoResponse {
    id: String,
}

/// Google's downloaded `client_secret.json`: one of the two client kinds.
#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: Option<OAuthClient>,
    web: Option<OAuthClient>,
}

#[derive(Deserialize)]
struct OAuthClient {
    client_id: String,
    client_secret: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

async fn load_client(path: &Path) -> Result<OAuthClient, PublishError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| PublishError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let file: ClientSecretsFile =
        serde_json::from_str(&raw).map_err(|e| PublishError::NotConfigured {
            platform: PLATFORM,
            reason: format!("{}: {e}", path.display()),
        })?;
    file.installed
        .or(file.web)
        .ok_or_else(|| PublishError::NotConfigured {
            platform: PLATFORM,
            reason: format!("{} has no installed or web client", path.display()),
        })
}

/// Resumable upload of the story video.
///
/// `login` uses `YOUTUBE_ACCESS_TOKEN` when set. Otherwise it trades
/// `YOUTUBE_REFRESH_TOKEN` for an access token using the OAuth client in the
/// configured client secrets file.
pub struct YoutubePublisher {
    http: Client,
    upload_url: String,
    privacy: String,
    client_secrets: Option<PathBuf>,
    credentials: Credentials,
    token: SessionSlot<String>,
}

impl YoutubePublisher {
    pub fn new(settings: &PublisherSettings, credentials: Credentials) -> Self {
        Self {
            http: http::client(),
            upload_url: settings.youtube_upload_url.clone(),
            privacy: settings.youtube_privacy.clone(),
            client_secrets: settings.youtube_client_secrets.clone(),
            credentials,
            token: SessionSlot::new(),
        }
    }

    async fn refresh_access_token(&self) -> Result<String, PublishError> {
        let Some(path) = &self.client_secrets else {
            return Err(PublishError::MissingCredential {
                platform: PLATFORM,
                env_var: ACCESS_TOKEN_ENV,
            });
        };
        let refresh_token = self.credentials.require(PLATFORM, REFRESH_TOKEN_ENV)?;
        let client = load_client(path).await?;

        let token: TokenResponse = http::send_json(
            "youtube",
            self.http.post(&client.token_uri).form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
                ("client_id", client.client_id.as_str()),
                ("client_secret", client.client_secret.as_str()),
            ]),
        )
        .await?;

        info!("access token refreshed");
        Ok(token.access_token)
    }
}

#[async_trait]
impl Publisher for YoutubePublisher {
    fn kind(&self) -> PublisherKind {
        PublisherKind::Youtube
    }

    async fn login(&self) -> Result<(), PublishError> {
        let token = match self.credentials.get(ACCESS_TOKEN_ENV) {
            Some(token) => token,
            None => self.refresh_access_token().await?,
        };
        self.token.set(token);
        Ok(())
    }

    async fn publish(&self, content: &PublishContent) -> Result<String, PublishError> {
        let token = self.token.get(PLATFORM)?;
        let description = compose(PublisherKind::Youtube, content)?;
        let video = content
            .video
            .as_ref()
            .ok_or_else(|| PublishError::NothingToPublish("no video".to_string()))?;

        let bytes = tokio::fs::read(video).await.map_err(|source| PublishError::Io {
            path: video.clone(),
            source,
        })?;

        let metadata = json!({
            "snippet": {
                "title": content.title,
                "description": description,
                "categoryId": CATEGORY_ID,
            },
            "status": {
                "privacyStatus": self.privacy,
                "selfDeclaredMadeForKids": true,
            },
        });

        let session = http::send(
            "youtube",
            self.http
                .post(&self.upload_url)
                .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
                .bearer_auth(&token)
                .header("X-Upload-Content-Type", "video/mp4")
                .header("X-Upload-Content-Length", bytes.len().to_string())
                .json(&metadata),
        )
        .await?;

        let location = session
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| HttpError::Decode {
                service: "youtube",
                reason: "upload session has no Location header".to_string(),
            })?;

        let uploaded: VideoResponse = http::send_json(
            "youtube",
            self.http
                .put(location)
                .bearer_auth(&token)
                .header(reqwest::header::CONTENT_TYPE, "video/mp4")
                .body(bytes),
        )
        .await?;

        info!(id = %uploaded.id, "video uploaded");
        Ok(uploaded.id)
    }

    async fn logout(&self) -> Result<(), PublishError> {
        self.token.clear();
        Ok(())
    }
}
