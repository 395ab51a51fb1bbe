use std::path::{Path, PathBuf};

use kahani_core::RetryPolicy;
use serde::Deserialize;
use tracing::{debug, info};

use crate::{error::ConfigError, provider::Provider};

pub const CONFIG_FILE_NAME: &str = "kahani.toml";

/// Runtime settings. Loaded from `kahani.toml` when present, then overridden
/// by command line flags. Secrets never live here; they come from the
/// environment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub output_dir: PathBuf,
    pub mock: bool,
    #[serde(skip)]
    pub dry_run: bool,
    pub source_language: String,
    pub target_language: String,
    pub provider: Provider,
    pub model: Option<String>,
    /// `gtts` or `espeak`.
    pub tts: String,
    pub max_images: Option<usize>,
    pub images: ImageSettings,
    pub audio: AudioSettings,
    pub retry: StageRetries,
    pub publishers: PublisherSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            mock: false,
            dry_run: false,
            source_language: "Hindi".to_string(),
            target_language: "English".to_string(),
            provider: Provider::default(),
            model: None,
            tts: "gtts".to_string(),
            max_images: None,
            images: ImageSettings::default(),
            audio: AudioSettings::default(),
            retry: StageRetries::default(),
            publishers: PublisherSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    pub base_url: String,
    pub max_polls: u32,
    /// Upper bound on the server-suggested wait between polls.
    pub max_wait_secs: u64,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            base_url: "https://aihorde.net/api/v2".to_string(),
            max_polls: 60,
            max_wait_secs: 30,
            width: 512,
            height: 512,
            steps: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub gtts_url: String,
    /// Language code passed to the TTS engines.
    pub voice_language: String,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            gtts_url: "https://translate.google.com/translate_tts".to_string(),
            voice_language: "hi".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StageRetries {
    pub fetch: RetryPolicy,
    pub translate: RetryPolicy,
    pub scenery: RetryPolicy,
    pub images: RetryPolicy,
    pub audio: RetryPolicy,
    pub video: RetryPolicy,
    pub publish: RetryPolicy,
}

impl Default for StageRetries {
    fn default() -> Self {
        Self {
            fetch: RetryPolicy::new(3, 500),
            translate: RetryPolicy::new(3, 1000),
            scenery: RetryPolicy::new(3, 1000),
            images: RetryPolicy::new(2, 2000),
            audio: RetryPolicy::new(2, 1000),
            video: RetryPolicy::none(),
            publish: RetryPolicy::new(2, 2000),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublisherSettings {
    pub twitter_api_url: String,
    pub threads_api_url: String,
    /// Graph API root, e.g. `https://graph.facebook.com/`. `FBIG_BASE_URL` overrides it.
    pub graph_base_url: String,
    /// Graph API version segment, e.g. `v19.0/`. `FBIG_BASE_VER` overrides it.
    pub graph_version: String,
    pub facebook_page_id: Option<String>,
    /// Public URL prefix under which `images/` is served; Instagram fetches media by URL.
    pub instagram_media_base_url: Option<String>,
    pub youtube_client_secrets: Option<PathBuf>,
    pub youtube_upload_url: String,
    pub youtube_privacy: String,
}

impl Default for PublisherSettings {
    fn default() -> Self {
        Self {
            twitter_api_url: "https://api.twitter.com/2".to_string(),
            threads_api_url: "https://graph.threads.net/v1.0".to_string(),
            graph_base_url: "https://graph.facebook.com/".to_string(),
            graph_version: "v19.0/".to_string(),
            facebook_page_id: None,
            instagram_media_base_url: None,
            youtube_client_secrets: None,
            youtube_upload_url: "https://www.googleapis.com/upload/youtube/v3/videos".to_string(),
            youtube_privacy: "private".to_string(),
        }
    }
}

impl PublisherSettings {
    /// Applies the environment overrides used by the Graph API publishers.
    pub fn apply_env(&mut self) {
        if let Some(url) = env_var("FBIG_BASE_URL") {
            self.graph_base_url = url;
        }
        if let Some(ver) = env_var("FBIG_BASE_VER") {
            self.graph_version = ver;
        }
        if let Some(page) = env_var("FACEBOOK_PAGE_ID") {
            self.facebook_page_id = Some(page);
        }
        if let Some(path) = env_var("YOUTUBE_CLIENT_SECRETS") {
            self.youtube_client_secrets = Some(PathBuf::from(path));
        }
    }
}

/// Reads a non-empty environment variable.
pub fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

pub fn require_env(name: &str) -> Result<String, ConfigError> {
    env_var(name).ok_or_else(|| ConfigError::MissingEnv {
        env_var: name.to_string(),
    })
}

impl Settings {
    /// Loads settings from `explicit`, or from `./kahani.toml`, or from the
    /// user config directory. Missing optional files yield defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match default_locations().into_iter().find(|p| p.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => {
                    debug!("no config file found, using defaults");
                    Self::default()
                }
            },
        };
        settings.publishers.apply_env();
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "loaded config");
        Ok(settings)
    }

    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.images.max_polls == 0 {
            return Err(ConfigError::Invalid {
                field: "images.max_polls",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_images == Some(0) {
            return Err(ConfigError::Invalid {
                field: "max_images",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.source_language.trim().is_empty() || self.target_language.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "source_language/target_language",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn default_locations() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("kahani").join(CONFIG_FILE_NAME));
    }
    paths
}

/// A story URL is required outside mock mode and must be http(s).
pub fn validate_url(url: Option<&str>, mock: bool) -> Result<Option<String>, ConfigError> {
    match url.map(str::trim).filter(|u| !u.is_empty()) {
        Some(u) if u.starts_with("http://") || u.starts_with("https://") => Ok(Some(u.to_string())),
        Some(u) => Err(ConfigError::InvalidUrl { url: u.to_string() }),
        None if mock => Ok(None),
        None => Err(ConfigError::Invalid {
            field: "url",
            reason: "a story URL is required unless --mock is set".to_string(),
        }),
    }
}
