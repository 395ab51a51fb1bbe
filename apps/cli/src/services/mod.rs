//! External collaborators of the pipeline, one trait per stage.
//!
//! Live implementations talk to the network or spawn local tools; the
//! `mock` module provides offline stand-ins with the same interface.

pub mod audio;
pub mod fetcher;
pub mod image;
pub mod mock;
pub mod narration;
pub mod scenery;
pub mod translator;
pub mod video;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use tracing::warn;

use crate::{
    config::Settings,
    error::StageError,
    provider::{ChatClient, ProviderError},
    types::{Scenery, StoryText},
};

#[async_trait]
pub trait StorySource: Send + Sync {
    async fn fetch(&self, url: Option<&str>) -> Result<StoryText, StageError>;
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &StoryText, to_language: &str)
    -> Result<StoryText, StageError>;
}

#[async_trait]
pub trait SceneryExtractor: Send + Sync {
    async fn extract(&self, text: &StoryText) -> Result<Vec<Scenery>, StageError>;
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Renders one scenery and returns the saved image path.
    async fn generate(&self, scenery: &Scenery, output_dir: &Path) -> Result<PathBuf, StageError>;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Engine name used in output file names.
    fn engine(&self) -> &'static str;
    fn extension(&self) -> &'static str;
    async fn synthesize(&self, text: &str, path: &Path) -> Result<PathBuf, StageError>;
}

#[async_trait]
pub trait VideoAssembler: Send + Sync {
    async fn assemble(
        &self,
        images: &[PathBuf],
        audio: Option<&Path>,
        video_path: &Path,
    ) -> Result<PathBuf, StageError>;
}

/// The collaborators one run uses.
#[derive(Clone)]
pub struct Services {
    pub source: Arc<dyn StorySource>,
    pub translator: Arc<dyn Translator>,
    pub scenery: Arc<dyn SceneryExtractor>,
    pub images: Arc<dyn ImageGenerator>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub video: Arc<dyn VideoAssembler>,
}

impl Services {
    /// Network-backed services. Fails early when the LLM key is missing.
    pub fn live(settings: &Settings) -> Result<Self, ProviderError> {
        let chat = ChatClient::for_provider(settings.provider, settings.model.as_deref())?;

        Ok(Self {
            source: Arc::new(fetcher::WebStorySource::new(&settings.source_language)),
            translator: Arc::new(translator::LlmTranslator::new(
                chat.clone(),
                settings.retry.translate,
            )),
            scenery: Arc::new(scenery::LlmSceneryExtractor::new(chat)),
            images: Arc::new(image::HordeImageGenerator::new(settings.images.clone())),
            speech: speech_for(settings),
            video: Arc::new(video::FfmpegVideoAssembler),
        })
    }

    pub fn mock(settings: &Settings) -> Self {
        Self {
            source: Arc::new(mock::MockStorySource::new(&settings.source_language)),
            translator: Arc::new(mock::MockTranslator),
            scenery: Arc::new(mock::MockSceneryExtractor),
            images: Arc::new(mock::MockImageGenerator::new()),
            speech: Arc::new(audio::SilentSynthesizer),
            video: Arc::new(video::ManifestVideoAssembler),
        }
    }
}

fn speech_for(settings: &Settings) -> Arc<dyn SpeechSynthesizer> {
    match audio::synthesizer_for(&settings.tts, &settings.audio) {
        Ok(speech) => speech,
        Err(e) => {
            warn!(error = %e, "audio stage will fail");
            Arc::new(audio::UnavailableSynthesizer {
                engine: settings.tts.clone(),
            })
        }
    }
}
