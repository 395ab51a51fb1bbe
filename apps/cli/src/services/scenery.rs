use std::fmt;

use async_trait::async_trait;
use serde::{
    Deserialize, Deserializer,
    de::{MapAccess, Visitor},
};
use tracing::info;

use crate::{
    error::StageError,
    provider::ChatClient,
    services::SceneryExtractor,
    types::{Scenery, StoryText},
};

const SYSTEM_PROMPT: &str = "You are an illustrator who picks visual scenes out of children's stories. \
Favour natural surroundings, season, weather, time of day and colours. \
Do not use names of characters or places. \
Answer with a single JSON object only. Each key is a short scene title; each value is an object \
with a \"description\" string and a \"sentiments\" array of adjectives describing the mood.";

/// Asks a chat model for scenery descriptions.
pub struct LlmSceneryExtractor {
    chat: ChatClient,
}

impl LlmSceneryExtractor {
    pub fn new(chat: ChatClient) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl SceneryExtractor for LlmSceneryExtractor {
    async fn extract(&self, text: &StoryText) -> Result<Vec<Scenery>, StageError> {
        if text.content.trim().is_empty() {
            return Err(StageError::MissingInput("story text for scenery extraction".to_string()));
        }

        let reply = self.chat.complete(SYSTEM_PROMPT, &text.content).await?;
        let sceneries = parse_sceneries(&reply)?;
        info!(count = sceneries.len(), language = %text.language, "extracted sceneries");
        Ok(sceneries)
    }
}

#[derive(Deserialize)]
struct SceneryBody {
    description: String,
    #[serde(default, alias = "adjectives")]
    sentiments: Vec<String>,
}

/// A JSON object of title to scenery, in document order.
struct OrderedSceneries(Vec<Scenery>);

impl<'de> Deserialize<'de> for OrderedSceneries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SceneryMap;

        impl<'de> Visitor<'de> for SceneryMap {
            type Value = OrderedSceneries;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of scenery title to description")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut out = Vec::new();
                while let Some((title, body)) = map.next_entry::<String, SceneryBody>()? {
                    out.push(Scenery {
                        title,
                        description: body.description,
                        sentiments: body.sentiments,
                    });
                }
                Ok(OrderedSceneries(out))
            }
        }

        deserializer.deserialize_map(SceneryMap)
    }
}

/// Parses model output, tolerating markdown fences and chatter around the
/// JSON object.
pub fn parse_sceneries(reply: &str) -> Result<Vec<Scenery>, StageError> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if s < e => &reply[s..=e],
        _ => {
            return Err(StageError::UnparseableOutput {
                reason: "no JSON object in scenery reply".to_string(),
            });
        }
    };

    let OrderedSceneries(sceneries) =
        serde_json::from_str(json).map_err(|e| StageError::UnparseableOutput {
            reason: format!("scenery JSON: {e}"),
        })?;

    if sceneries.is_empty() {
        return Err(StageError::UnparseableOutput {
            reason: "scenery object is empty".to_string(),
        });
    }
    Ok(sceneries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_document_order_and_alias() {
        let reply = r#"```json
        {
          "River Bank": {"description": "Calm water at dawn", "sentiments": ["Calm"]},
          "Old Banyan": {"description": "A huge tree", "adjectives": ["Ancient", "Shady"]}
        }
        ```"#;

        let sceneries = parse_sceneries(reply).unwrap();
        assert_eq!(sceneries.len(), 2);
        assert_eq!(sceneries[0].title, "River Bank");
        assert_eq!(sceneries[1].title, "Old Banyan");
        assert_eq!(sceneries[1].sentiments, vec!["Ancient", "Shady"]);
    }

    #[test]
    fn missing_sentiments_default_to_empty() {
        let sceneries = parse_sceneries(r#"{"Hut": {"description": "A hut"}}"#).unwrap();
        assert!(sceneries[0].sentiments.is_empty());
    }

    #[test]
    fn garbage_is_unparseable() {
        assert!(matches!(
            parse_sceneries("I cannot help with that."),
            Err(StageError::UnparseableOutput { .. })
        ));
        assert!(matches!(
            parse_sceneries(r#"{"Hut": "not an object"}"#),
            Err(StageError::UnparseableOutput { .. })
        ));
    }

    #[test]
    fn empty_object_is_an_error() {
        assert!(parse_sceneries("{}").is_err());
    }
}
