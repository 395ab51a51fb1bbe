//! Social platform publishers.
//!
//! Every platform goes through the same three calls: `login`, `publish`,
//! `logout`. Clients are thin wrappers over each platform's HTTP API; what
//! gets posted is decided by [`compose`] so the recording publisher used in
//! mock and dry runs posts exactly what a live run would.

pub mod facebook;
pub mod instagram;
pub mod recording;
pub mod threads;
pub mod twitter;
pub mod youtube;

use std::{
    collections::HashMap,
    fmt,
    path::PathBuf,
    sync::{Mutex, PoisonError},
};

use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::{
    config::{PublisherSettings, env_var},
    error::PublishError,
    text::head,
    types::Story,
};

pub use recording::RecordingPublisher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PublisherKind {
    Twitter,
    Instagram,
    Threads,
    Facebook,
    Youtube,
}

impl PublisherKind {
    pub const ALL: [PublisherKind; 5] = [
        PublisherKind::Twitter,
        PublisherKind::Instagram,
        PublisherKind::Threads,
        PublisherKind::Facebook,
        PublisherKind::Youtube,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PublisherKind::Twitter => "Twitter",
            PublisherKind::Instagram => "Instagram",
            PublisherKind::Threads => "Threads",
            PublisherKind::Facebook => "Facebook",
            PublisherKind::Youtube => "YouTube",
        }
    }
}

impl fmt::Display for PublisherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a run hands to every publisher.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PublishContent {
    pub title: String,
    pub source_text: String,
    pub translated_text: Option<String>,
    pub images: Vec<PathBuf>,
    pub audio: Option<PathBuf>,
    pub video: Option<PathBuf>,
}

impl PublishContent {
    pub fn from_story(story: &Story) -> Self {
        Self {
            title: story.title().to_string(),
            source_text: story
                .source
                .as_ref()
                .map(|s| s.content.clone())
                .unwrap_or_default(),
            translated_text: story
                .translation
                .as_ref()
                .map(|t| t.content.clone())
                .filter(|t| !t.trim().is_empty()),
            images: story.images.iter().map(|i| i.path.clone()).collect(),
            audio: story.audio.clone(),
            video: story.video.clone(),
        }
    }

    /// The translation when there is one, else the source text.
    pub fn text(&self) -> Option<&str> {
        self.translated_text
            .as_deref()
            .or(Some(self.source_text.as_str()))
            .filter(|t| !t.trim().is_empty())
    }
}

#[async_trait]
pub trait Publisher: Send + Sync {
    fn kind(&self) -> PublisherKind;

    /// Checks credentials and opens a session.
    async fn login(&self) -> Result<(), PublishError>;

    /// Posts `content` and returns the platform's id for the post.
    async fn publish(&self, content: &PublishContent) -> Result<String, PublishError>;

    async fn logout(&self) -> Result<(), PublishError>;
}

/// Where publishers read secrets from.
#[derive(Debug, Clone, Default)]
pub enum Credentials {
    #[default]
    Env,
    Fixed(HashMap<String, String>),
}

impl Credentials {
    pub fn fixed<const N: usize>(pairs: [(&str, &str); N]) -> Self {
        Credentials::Fixed(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match self {
            Credentials::Env => env_var(key),
            Credentials::Fixed(map) => map.get(key).filter(|v| !v.trim().is_empty()).cloned(),
        }
    }

    pub fn require(&self, platform: &'static str, key: &'static str) -> Result<String, PublishError> {
        self.get(key).ok_or(PublishError::MissingCredential {
            platform,
            env_var: key,
        })
    }
}

/// Session state set by `login` and cleared by `logout`.
pub(crate) struct SessionSlot<T>(Mutex<Option<T>>);

impl<T: Clone> SessionSlot<T> {
    pub fn new() -> Self {
        Self(Mutex::new(None))
    }

    pub fn set(&self, value: T) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }

    pub fn get(&self, platform: &'static str) -> Result<T, PublishError> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(PublishError::NotLoggedIn { platform })
    }

    pub fn clear(&self) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

pub const TWITTER_TEXT_CHARS: usize = 200;
pub const THREADS_MAX_CHARS: usize = 500;

/// `"{title}: {text}"`, with the text cut to 200 characters plus `...`.
pub fn twitter_message(title: &str, text: &str) -> String {
    if text.chars().count() > TWITTER_TEXT_CHARS {
        format!("{title}: {}...", head(text, TWITTER_TEXT_CHARS))
    } else {
        format!("{title}: {text}")
    }
}

/// `"{title}\n\n{text}"`, capped at 500 characters.
pub fn threads_message(title: &str, text: &str) -> String {
    let message = format!("{title}\n\n{text}");
    if message.chars().count() > THREADS_MAX_CHARS {
        format!("{}...", head(&message, THREADS_MAX_CHARS - 3))
    } else {
        message
    }
}

fn caption(content: &PublishContent) -> String {
    match content.text() {
        Some(text) => format!("{}\n\n{}", content.title, text),
        None => content.title.clone(),
    }
}

/// The text a platform posts for `content`, or why there is nothing to post.
pub fn compose(kind: PublisherKind, content: &PublishContent) -> Result<String, PublishError> {
    match kind {
        PublisherKind::Twitter => content
            .text()
            .map(|text| twitter_message(&content.title, text))
            .ok_or_else(|| PublishError::NothingToPublish("no story text".to_string())),
        PublisherKind::Threads => content
            .text()
            .map(|text| threads_message(&content.title, text))
            .ok_or_else(|| PublishError::NothingToPublish("no story text".to_string())),
        PublisherKind::Facebook | PublisherKind::Instagram => {
            if content.images.is_empty() {
                Err(PublishError::NothingToPublish("no images".to_string()))
            } else {
                Ok(caption(content))
            }
        }
        PublisherKind::Youtube => {
            if content.video.is_none() {
                Err(PublishError::NothingToPublish("no video".to_string()))
            } else {
                Ok(content.text().unwrap_or_default().to_string())
            }
        }
    }
}

/// Builds the live publisher for `kind`, checking the settings it needs up front.
pub fn create_publisher(
    kind: PublisherKind,
    settings: &PublisherSettings,
) -> Result<Box<dyn Publisher>, PublishError> {
    let publisher: Box<dyn Publisher> = match kind {
        PublisherKind::Twitter => Box::new(twitter::TwitterPublisher::new(
            &settings.twitter_api_url,
            Credentials::Env,
        )),
        PublisherKind::Threads => Box::new(threads::ThreadsPublisher::new(
            &settings.threads_api_url,
            Credentials::Env,
        )),
        PublisherKind::Facebook => {
            let page_id = settings.facebook_page_id.as_deref().ok_or_else(|| {
                PublishError::NotConfigured {
                    platform: "Facebook",
                    reason: "page id is required (facebook_page_id or FACEBOOK_PAGE_ID)"
                        .to_string(),
                }
            })?;
            Box::new(facebook::FacebookPublisher::new(
                settings,
                page_id,
                Credentials::Env,
            ))
        }
        PublisherKind::Instagram => Box::new(instagram::InstagramPublisher::new(
            settings,
            Credentials::Env,
        )),
        PublisherKind::Youtube => {
            // only read for token refresh, but a configured path must exist
            if let Some(secrets) = settings
                .youtube_client_secrets
                .as_ref()
                .filter(|path| !path.is_file())
            {
                return Err(PublishError::NotConfigured {
                    platform: "YouTube",
                    reason: format!("client secrets file {} not found", secrets.display()),
                });
            }
            Box::new(youtube::YoutubePublisher::new(settings, Credentials::Env))
        }
    };
    Ok(publisher)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(translated: Option<&str>) -> PublishContent {
        PublishContent {
            title: "प्यासा कौआ".into(),
            source_text: "कौआ प्यासा था।".into(),
            translated_text: translated.map(Into::into),
            ..PublishContent::default()
        }
    }

    #[test]
    fn text_prefers_translation() {
        assert_eq!(content(Some("The crow")).text(), Some("The crow"));
        assert_eq!(content(None).text(), Some("कौआ प्यासा था।"));

        let empty = PublishContent::default();
        assert_eq!(empty.text(), None);
    }

    #[test]
    fn twitter_cuts_long_text() {
        let long = "a".repeat(250);
        let message = twitter_message("T", &long);
        assert_eq!(message, format!("T: {}...", "a".repeat(200)));
        assert_eq!(twitter_message("T", "short"), "T: short");
    }

    #[test]
    fn threads_caps_at_500() {
        let message = threads_message("T", &"b".repeat(600));
        assert_eq!(message.chars().count(), 500);
        assert!(message.ends_with("..."));
        assert!(message.starts_with("T\n\n"));
        assert_eq!(threads_message("T", "x"), "T\n\nx");
    }

    #[test]
    fn compose_skips_missing_media() {
        let c = content(Some("The crow"));
        assert!(matches!(
            compose(PublisherKind::Youtube, &c),
            Err(PublishError::NothingToPublish(_))
        ));
        assert!(matches!(
            compose(PublisherKind::Facebook, &c),
            Err(PublishError::NothingToPublish(_))
        ));
        assert!(matches!(
            compose(PublisherKind::Twitter, &PublishContent::default()),
            Err(PublishError::NothingToPublish(_))
        ));
        assert_eq!(
            compose(PublisherKind::Twitter, &c).unwrap(),
            "प्यासा कौआ: The crow"
        );
    }

    #[test]
    fn facebook_requires_page_id() {
        let err = create_publisher(PublisherKind::Facebook, &PublisherSettings::default())
            .err()
            .unwrap();
        assert!(matches!(err, PublishError::NotConfigured { platform: "Facebook", .. }));
    }

    #[test]
    fn youtube_rejects_missing_secrets_file_only_when_configured() {
        let settings = PublisherSettings {
            youtube_client_secrets: Some("/no/such/client_secret.json".into()),
            ..PublisherSettings::default()
        };
        assert!(create_publisher(PublisherKind::Youtube, &settings).is_err());
        assert!(create_publisher(PublisherKind::Youtube, &PublisherSettings::default()).is_ok());
    }

    #[test]
    fn fixed_credentials_ignore_blank_values() {
        let creds = Credentials::fixed([("A", "1"), ("B", " ")]);
        assert_eq!(creds.get("A").as_deref(), Some("1"));
        assert!(creds.require("X", "B").is_err());
    }
}
