use std::sync::Arc;

use async_trait::async_trait;
use kahani_core::{
    EnrichedEvent, EventBus,
    events::expect,
    workers::{InputSpec, SubscriptionSpec, Worker},
};
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::{
    error::StageError,
    services::Translator,
    types::{Stage, StageStatus},
    workers::{
        STAGE_QUEUE, failed, finished,
        events::{StoryFetched, StoryTranslated},
        report_progress,
    },
};

/// Runs the translator once; retries happen per chunk inside the translator.
pub struct TranslateStoryWorker {
    translator: Arc<dyn Translator>,
}

impl TranslateStoryWorker {
    pub fn new(translator: Arc<dyn Translator>) -> Self {
        Self { translator }
    }
}

#[async_trait]
impl Worker for TranslateStoryWorker {
    const SUBSCRIBER_ID: &'static str = "story.translate";

    fn subscription() -> SubscriptionSpec {
        SubscriptionSpec {
            subscriber_id: Self::SUBSCRIBER_ID,
            inputs: vec![InputSpec::new(StoryFetched::EVENT_TYPE, STAGE_QUEUE)],
        }
    }

    #[instrument(name = "translate", skip_all)]
    async fn handle(&mut self, event: Arc<EnrichedEvent>, bus: &EventBus) -> anyhow::Result<()> {
        let req = expect::<StoryFetched>(&event.event, StoryFetched::EVENT_TYPE)?;
        let parent = event.event.event_id();
        let mut run = req.run.clone();
        let started = Instant::now();

        let to = run.job.target_language.clone();
        report_progress(
            bus,
            parent,
            Some(run.story.id),
            Stage::Translate,
            format!("translating to {to}"),
        );

        let (status, attempts) = match run.story.source.clone() {
            None => (
                failed(&StageError::MissingInput("source text".to_string())),
                0,
            ),
            Some(source) => match self.translator.translate(&source, &to).await {
                Ok(translation) => {
                    info!(story = %run.story.id, title = %translation.title, "translated");
                    run.story.translation = Some(translation);
                    (StageStatus::Completed, 1)
                }
                Err(e) => {
                    warn!(story = %run.story.id, error = %e, "translation failed, continuing with source text");
                    (failed(&e), 1)
                }
            },
        };

        run.record(finished(Stage::Translate, status, attempts, started));
        bus.publish(Arc::new(StoryTranslated::new(parent, run)));
        Ok(())
    }
}
