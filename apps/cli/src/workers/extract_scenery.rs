use std::sync::Arc;

use async_trait::async_trait;
use kahani_core::{
    EnrichedEvent, EventBus, RetryPolicy,
    events::expect,
    retry,
    workers::{InputSpec, SubscriptionSpec, Worker},
};
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::{
    error::StageError,
    services::SceneryExtractor,
    types::{Stage, StageStatus},
    workers::{
        STAGE_QUEUE, failed, finished,
        events::{SceneriesExtracted, StoryTranslated},
        report_progress,
    },
};

/// Extracts sceneries from the translation, or from the source text when
/// translation failed.
pub struct ExtractSceneryWorker {
    extractor: Arc<dyn SceneryExtractor>,
    policy: RetryPolicy,
}

impl ExtractSceneryWorker {
    pub fn new(extractor: Arc<dyn SceneryExtractor>, policy: RetryPolicy) -> Self {
        Self { extractor, policy }
    }
}

#[async_trait]
impl Worker for ExtractSceneryWorker {
    const SUBSCRIBER_ID: &'static str = "story.extract_scenery";

    fn subscription() -> SubscriptionSpec {
        SubscriptionSpec {
            subscriber_id: Self::SUBSCRIBER_ID,
            inputs: vec![InputSpec::new(StoryTranslated::EVENT_TYPE, STAGE_QUEUE)],
        }
    }

    #[instrument(name = "extract_scenery", skip_all)]
    async fn handle(&mut self, event: Arc<EnrichedEvent>, bus: &EventBus) -> anyhow::Result<()> {
        let req = expect::<StoryTranslated>(&event.event, StoryTranslated::EVENT_TYPE)?;
        let parent = event.event.event_id();
        let mut run = req.run.clone();
        let started = Instant::now();

        report_progress(
            bus,
            parent,
            Some(run.story.id),
            Stage::ExtractScenery,
            "extracting sceneries",
        );

        let fallback = run.story.translation.is_none();
        let (status, attempts) = match run.story.best_text().cloned() {
            None => (
                failed(&StageError::MissingInput("story text".to_string())),
                0,
            ),
            Some(text) => {
                let attempted = retry(&self.policy, Stage::ExtractScenery.name(), || {
                    self.extractor.extract(&text)
                })
                .await;
                match attempted.result {
                    Ok(sceneries) => {
                        info!(story = %run.story.id, count = sceneries.len(), "sceneries extracted");
                        run.story.sceneries = sceneries;
                        let status = if fallback {
                            StageStatus::Degraded {
                                reason: format!("no translation, used {} source text", text.language),
                            }
                        } else {
                            StageStatus::Completed
                        };
                        (status, attempted.attempts)
                    }
                    Err(e) => {
                        warn!(story = %run.story.id, error = %e, "scenery extraction failed");
                        (failed(&e), attempted.attempts)
                    }
                }
            }
        };

        run.record(finished(Stage::ExtractScenery, status, attempts, started));
        bus.publish(Arc::new(SceneriesExtracted::new(parent, run)));
        Ok(())
    }
}
