use async_trait::async_trait;
use kahani_core::{RetryPolicy, retry};
use tracing::{debug, info};

use crate::{
    error::StageError,
    provider::ChatClient,
    services::Translator,
    text::{TRANSLATE_CHUNK_CHARS, TRANSLATE_CHUNK_OVERLAP, TRANSLATE_SEPARATORS, split_text},
    types::StoryText,
};

fn system_prompt(from: &str, to: &str) -> String {
    format!(
        "You translate children's stories from {from} to {to}. \
         Keep the tone warm and lively for listeners aged 5 to 14. \
         Reply with the {to} translation only, without tags, notes or quotes."
    )
}

/// Translates a story chunk by chunk through a chat model. Each chat call
/// is retried on its own, so a transient failure never resends chunks that
/// already came back.
pub struct LlmTranslator {
    chat: ChatClient,
    policy: RetryPolicy,
}

impl LlmTranslator {
    pub fn new(chat: ChatClient, policy: RetryPolicy) -> Self {
        Self { chat, policy }
    }

    async fn complete(&self, system: &str, text: &str) -> Result<String, StageError> {
        retry(&self.policy, "translate", || self.chat.complete(system, text))
            .await
            .result
    }
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate(&self, text: &StoryText, to_language: &str) -> Result<StoryText, StageError> {
        if text.content.trim().is_empty() {
            return Err(StageError::MissingInput("story content to translate".to_string()));
        }

        let system = system_prompt(&text.language, to_language);
        let chunks = split_text(
            &text.content,
            TRANSLATE_CHUNK_CHARS,
            TRANSLATE_CHUNK_OVERLAP,
            &TRANSLATE_SEPARATORS,
        );
        info!(chunks = chunks.len(), from = %text.language, to = to_language, "translating story");

        let mut translated = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            debug!(chunk = i, chars = chunk.chars().count(), "translating chunk");
            translated.push(self.complete(&system, chunk).await?);
        }

        let title = if text.title.trim().is_empty() {
            String::new()
        } else {
            self.complete(&system, &text.title).await?
        };

        Ok(StoryText {
            language: to_language.to_string(),
            title,
            content: translated.join(" "),
        })
    }
}

#[cfg(test)]
mod tests {
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_string_contains, method},
    };

    use super::*;

    fn reply(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content": content}}]
        }))
    }

    fn hindi(title: &str, content: &str) -> StoryText {
        StoryText {
            language: "Hindi".into(),
            title: title.into(),
            content: content.into(),
        }
    }

    #[tokio::test]
    async fn translates_content_and_title() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("कौआ प्यासा था"))
            .respond_with(reply("The crow was thirsty."))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("प्यासा कौआ"))
            .respond_with(reply("The Thirsty Crow"))
            .mount(&server)
            .await;

        let translator =
            LlmTranslator::new(ChatClient::new(server.uri(), "m", "k"), RetryPolicy::none());
        let out = translator
            .translate(&hindi("प्यासा कौआ", "कौआ प्यासा था।"), "English")
            .await
            .unwrap();

        assert_eq!(out.language, "English");
        assert_eq!(out.title, "The Thirsty Crow");
        assert_eq!(out.content, "The crow was thirsty.");
    }

    #[tokio::test]
    async fn long_story_is_sent_in_chunks_and_joined() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(reply("part"))
            .mount(&server)
            .await;

        let content = "एक राजा था।\n".repeat(600);
        let translator =
            LlmTranslator::new(ChatClient::new(server.uri(), "m", "k"), RetryPolicy::none());
        let out = translator
            .translate(&hindi("राजा", &content), "English")
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let chunk_calls = requests.len() - 1;
        assert!(chunk_calls >= 2);
        assert_eq!(out.content, vec!["part"; chunk_calls].join(" "));
    }

    #[tokio::test]
    async fn empty_content_is_missing_input() {
        let translator = LlmTranslator::new(
            ChatClient::new("http://127.0.0.1:9", "m", "k"),
            RetryPolicy::none(),
        );
        let err = translator
            .translate(&hindi("t", "   "), "English")
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::MissingInput(_)));
    }

    #[tokio::test]
    async fn transient_failure_retries_only_that_chunk() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("ब".repeat(50)))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(reply("part"))
            .mount(&server)
            .await;

        let content = ["अ", "ब", "स"].map(|c| c.repeat(3000)).join("\n");
        let translator = LlmTranslator::new(
            ChatClient::new(server.uri(), "m", "k"),
            RetryPolicy::new(2, 0).with_jitter(false),
        );
        let out = translator
            .translate(&hindi("कहानी", &content), "English")
            .await
            .unwrap();

        // three chunks, one resend of the second, one title call
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 5);
        let first_chunk_calls = requests
            .iter()
            .filter(|r| String::from_utf8_lossy(&r.body).contains(&"अ".repeat(50)))
            .count();
        assert_eq!(first_chunk_calls, 1);
        assert_eq!(out.content, "part part part");
    }

    #[tokio::test]
    async fn failing_chunk_fails_translation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let translator =
            LlmTranslator::new(ChatClient::new(server.uri(), "m", "k"), RetryPolicy::none());
        assert!(
            translator
                .translate(&hindi("t", "कुछ"), "English")
                .await
                .is_err()
        );
    }
}
