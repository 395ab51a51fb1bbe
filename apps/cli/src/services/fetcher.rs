use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info};

use crate::{
    error::StageError,
    http,
    services::StorySource,
    types::StoryText,
};

/// Paragraph that starts the site footer; nothing after it is story text.
const FOOTER_MARKER: &str = "मुख्य पृष्ठ :";

/// Fetches a story page over HTTP and extracts its title and paragraphs.
pub struct WebStorySource {
    http: Client,
    language: String,
}

impl WebStorySource {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            http: http::client(),
            language: language.into(),
        }
    }
}

#[async_trait]
impl StorySource for WebStorySource {
    async fn fetch(&self, url: Option<&str>) -> Result<StoryText, StageError> {
        let url = url.ok_or_else(|| StageError::MissingInput("story URL".to_string()))?;
        info!(url, "fetching story page");

        let body = http::text("story page", self.http.get(url)).await?;
        let (title, content) = parse_story_page(&body)?;
        debug!(title = %title, chars = content.chars().count(), "parsed story page");

        Ok(StoryText {
            language: self.language.clone(),
            title,
            content,
        })
    }
}

fn selector(css: &'static str) -> Result<Selector, StageError> {
    Selector::parse(css).map_err(|e| StageError::EmptyStory {
        reason: format!("bad selector {css}: {e}"),
    })
}

/// Returns `(title, content)` for a story page.
pub fn parse_story_page(html: &str) -> Result<(String, String), StageError> {
    let document = Html::parse_document(html);

    let title = document
        .select(&selector("h1")?)
        .next()
        .map(|h| h.text().collect::<String>())
        .map(|t| t.split(':').next().unwrap_or_default().trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| StageError::EmptyStory {
            reason: "no <h1> title".to_string(),
        })?;

    let mut paragraphs = Vec::new();
    for p in document.select(&selector("p")?) {
        let text = p.text().collect::<String>();
        if text.contains(FOOTER_MARKER) {
            break;
        }
        let cleaned = clean_paragraph(&text);
        if !cleaned.is_empty() {
            paragraphs.push(cleaned);
        }
    }

    if paragraphs.is_empty() {
        return Err(StageError::EmptyStory {
            reason: "no story paragraphs".to_string(),
        });
    }

    Ok((title, paragraphs.join(" ")))
}

/// Normalises colons the site uses as visarga and turns a trailing colon on
/// a line into a dash.
fn clean_paragraph(text: &str) -> String {
    let text = text.replace("दु:", "दु").replace("छ:", "छह");
    text.lines()
        .map(|line| {
            let trimmed = line.trim_end();
            match trimmed.strip_suffix(':') {
                Some(rest) if trimmed.len() < line.len() => format!("{rest}-"),
                _ => trimmed.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
