//! Offline stand-ins for every network-bound service.

use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::{
    error::StageError,
    output::{find_images_in_dir, get_images_dir},
    services::{ImageGenerator, SceneryExtractor, StorySource, Translator},
    types::{Scenery, StoryText},
};

pub const MOCK_TITLE_HINDI: &str = "प्यासा कौआ: पंचतंत्र की कहानी";
pub const MOCK_TITLE_ENGLISH: &str = "The Thirsty Crow";

pub const MOCK_TEXT_HINDI: &str = "गर्मी के दिन थे और दोपहर की धूप बहुत तेज़ थी। \
एक कौआ पानी की तलाश में दूर-दूर तक उड़ता रहा, पर उसे कहीं पानी नहीं मिला।\n\
थक कर वह एक बगीचे में पहुँचा जहाँ पेड़ के नीचे एक घड़ा रखा था। \
घड़े में पानी तो था, पर इतना नीचे कि उसकी चोंच वहाँ तक नहीं पहुँच सकती थी।\n\
कौए ने हिम्मत नहीं हारी। उसने आस-पास से छोटे-छोटे कंकड़ उठाए और एक-एक करके घड़े में डालने लगा। \
धीरे-धीरे पानी ऊपर आ गया और कौए ने जी भर कर पानी पिया।\n\
सीख: मेहनत और सूझ-बूझ से हर मुश्किल आसान हो जाती है।";

pub const MOCK_TEXT_ENGLISH: &str = "It was a hot summer afternoon and the sun blazed overhead. \
A crow flew far and wide looking for water, but found none anywhere.\n\
Tired, it reached a garden where a clay pot stood under a tree. \
There was water in the pot, but so low that its beak could not reach it.\n\
The crow did not give up. It picked up small pebbles and dropped them into the pot one by one. \
Slowly the water rose, and the crow drank to its heart's content.\n\
Moral: with effort and wit, every difficulty becomes easy.";

pub fn mock_sceneries() -> Vec<Scenery> {
    let scene = |title: &str, description: &str, sentiments: &[&str]| Scenery {
        title: title.to_string(),
        description: description.to_string(),
        sentiments: sentiments.iter().map(|s| s.to_string()).collect(),
    };

    vec![
        scene(
            "Scorching Summer Sky",
            "A crow gliding over dry fields under a blazing afternoon sun, heat shimmering above cracked earth.",
            &["Heat", "Longing", "Vastness"],
        ),
        scene(
            "Garden Pot Under Tree",
            "A shady garden with a clay pot resting beneath a leafy mango tree, sparrows and squirrels nearby.",
            &["Relief", "Calm", "Curiosity"],
        ),
        scene(
            "Pebbles and Patience",
            "A crow dropping small pebbles into a clay pot while a few birds watch from the branches.",
            &["Determination", "Cleverness", "Patience"],
        ),
        scene(
            "Water Rising",
            "Water rising to the brim of the pot in the golden evening light as the crow drinks happily.",
            &["Joy", "Triumph", "Warmth"],
        ),
    ]
}

pub struct MockStorySource {
    language: String,
}

impl MockStorySource {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }
}

#[async_trait]
impl StorySource for MockStorySource {
    async fn fetch(&self, _url: Option<&str>) -> Result<StoryText, StageError> {
        let title = MOCK_TITLE_HINDI.split(':').next().unwrap_or_default().trim();
        Ok(StoryText {
            language: self.language.clone(),
            title: title.to_string(),
            content: MOCK_TEXT_HINDI.to_string(),
        })
    }
}

pub struct MockTranslator;

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, text: &StoryText, to_language: &str) -> Result<StoryText, StageError> {
        if text.content.trim().is_empty() {
            return Err(StageError::MissingInput("story content to translate".to_string()));
        }
        Ok(StoryText {
            language: to_language.to_string(),
            title: MOCK_TITLE_ENGLISH.to_string(),
            content: MOCK_TEXT_ENGLISH.to_string(),
        })
    }
}

pub struct MockSceneryExtractor;

#[async_trait]
impl SceneryExtractor for MockSceneryExtractor {
    async fn extract(&self, _text: &StoryText) -> Result<Vec<Scenery>, StageError> {
        Ok(mock_sceneries())
    }
}

/// Hands out image files already present in `{output}/images`, cycling
/// through them when there are more sceneries than images.
#[derive(Default)]
pub struct MockImageGenerator {
    next: AtomicUsize,
}

impl MockImageGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ImageGenerator for MockImageGenerator {
    async fn generate(&self, scenery: &Scenery, output_dir: &Path) -> Result<PathBuf, StageError> {
        let dir = get_images_dir(output_dir);
        let available = find_images_in_dir(&dir);

        if available.is_empty() {
            warn!(dir = %dir.display(), scenery = %scenery.title, "no images available for mock scenery");
            return Err(StageError::MissingInput(format!(
                "no image files in {}",
                dir.display()
            )));
        }

        let idx = self.next.fetch_add(1, Ordering::Relaxed) % available.len();
        let path = available[idx].clone();
        info!(scenery = %scenery.title, path = %path.display(), "reusing image");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cycles_through_available_images() {
        let out = tempfile::tempdir().unwrap();
        let images = get_images_dir(out.path());
        std::fs::create_dir_all(&images).unwrap();
        std::fs::write(images.join("a.png"), b"a").unwrap();
        std::fs::write(images.join("b.png"), b"b").unwrap();

        let generator = MockImageGenerator::new();
        let mut picked = Vec::new();
        for scenery in mock_sceneries() {
            picked.push(generator.generate(&scenery, out.path()).await.unwrap());
        }

        assert_eq!(
            picked,
            vec![
                images.join("a.png"),
                images.join("b.png"),
                images.join("a.png"),
                images.join("b.png"),
            ]
        );
    }

    #[tokio::test]
    async fn empty_image_dir_fails_per_scenery() {
        let out = tempfile::tempdir().unwrap();
        let err = MockImageGenerator::new()
            .generate(&mock_sceneries()[0], out.path())
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::MissingInput(_)));
    }

    #[tokio::test]
    async fn mock_source_strips_title_suffix() {
        let story = MockStorySource::new("Hindi").fetch(None).await.unwrap();
        assert_eq!(story.title, "प्यासा कौआ");
        assert!(story.content.contains("कंकड़"));
    }
}
