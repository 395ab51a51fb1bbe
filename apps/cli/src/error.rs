use std::path::PathBuf;

use kahani_core::Retryable;
use thiserror::Error;

use crate::provider::ProviderError;

/// Failure talking to a remote HTTP service.
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("{service} request failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} returned a malformed response: {reason}")]
    Decode {
        service: &'static str,
        reason: String,
    },
}

impl Retryable for HttpError {
    fn is_retryable(&self) -> bool {
        match self {
            HttpError::Transport { source, .. } => !source.is_builder(),
            HttpError::Status { status, .. } => {
                matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
            }
            HttpError::Decode { .. } => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing setting: {env_var} environment variable is not set")]
    MissingEnv { env_var: String },

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Invalid story URL {url:?}: must start with http:// or https://")]
    InvalidUrl { url: String },

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Error raised by one pipeline stage.
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Story page has no usable content: {reason}")]
    EmptyStory { reason: String },

    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Model output could not be parsed: {reason}")]
    UnparseableOutput { reason: String },

    #[error("Image job {job_id} failed: {reason}")]
    ImageJob { job_id: String, reason: String },

    #[error("Image job {job_id} still pending after {polls} polls")]
    PollLimit { job_id: String, polls: u32 },

    #[error("Unknown TTS engine {0:?} (expected gtts or espeak)")]
    UnknownEngine(String),

    #[error("{tool} failed: {reason}")]
    Process { tool: &'static str, reason: String },

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

impl StageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StageError::Io {
            path: path.into(),
            source,
        }
    }
}

impl Retryable for StageError {
    fn is_retryable(&self) -> bool {
        match self {
            StageError::Http(e) => e.is_retryable(),
            StageError::UnparseableOutput { .. } | StageError::PollLimit { .. } => true,
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("{platform} is not configured: {reason}")]
    NotConfigured {
        platform: &'static str,
        reason: String,
    },

    #[error("{platform} credential missing: {env_var} is not set")]
    MissingCredential {
        platform: &'static str,
        env_var: &'static str,
    },

    #[error("{platform} publish called before login")]
    NotLoggedIn { platform: &'static str },

    #[error("nothing to publish: {0}")]
    NothingToPublish(String),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Retryable for PublishError {
    fn is_retryable(&self) -> bool {
        matches!(self, PublishError::Http(e) if e.is_retryable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> HttpError {
        HttpError::Status {
            service: "test",
            status: code,
            body: String::new(),
        }
    }

    #[test]
    fn transient_statuses_are_retryable() {
        for code in [408, 429, 500, 502, 503, 504] {
            assert!(status(code).is_retryable(), "{code}");
        }
        for code in [400, 401, 403, 404, 422, 501] {
            assert!(!status(code).is_retryable(), "{code}");
        }
    }

    #[test]
    fn stage_errors_classify() {
        assert!(StageError::from(status(503)).is_retryable());
        assert!(
            StageError::UnparseableOutput {
                reason: "x".into()
            }
            .is_retryable()
        );
        assert!(!StageError::MissingInput("text".into()).is_retryable());
        assert!(
            !StageError::from(ConfigError::MissingEnv {
                env_var: "AIHORDE_API_KEY".into()
            })
            .is_retryable()
        );
    }

    #[test]
    fn publish_errors_classify() {
        assert!(PublishError::from(status(429)).is_retryable());
        assert!(
            !PublishError::MissingCredential {
                platform: "Twitter",
                env_var: "TWITTER_ACCESS_TOKEN"
            }
            .is_retryable()
        );
    }
}
