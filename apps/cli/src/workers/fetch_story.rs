use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use kahani_core::{
    EnrichedEvent, EventBus, RetryPolicy,
    events::expect,
    retry,
    workers::{InputSpec, SubscriptionSpec, Worker},
};
use tokio::time::Instant;
use tracing::{info, instrument};

use crate::{
    services::StorySource,
    text::story_name,
    types::{Stage, StageStatus, Story},
    workers::{
        STAGE_QUEUE, finished,
        events::{RunState, StoryFetched, StoryRequested},
        report_progress,
    },
};

/// Downloads and cleans the story. The only stage whose failure ends the run.
pub struct FetchStoryWorker {
    source: Arc<dyn StorySource>,
    policy: RetryPolicy,
}

impl FetchStoryWorker {
    pub fn new(source: Arc<dyn StorySource>, policy: RetryPolicy) -> Self {
        Self { source, policy }
    }
}

#[async_trait]
impl Worker for FetchStoryWorker {
    const SUBSCRIBER_ID: &'static str = "story.fetch";

    fn subscription() -> SubscriptionSpec {
        SubscriptionSpec {
            subscriber_id: Self::SUBSCRIBER_ID,
            inputs: vec![InputSpec::new(StoryRequested::EVENT_TYPE, STAGE_QUEUE)],
        }
    }

    #[instrument(name = "fetch", skip_all)]
    async fn handle(&mut self, event: Arc<EnrichedEvent>, bus: &EventBus) -> anyhow::Result<()> {
        let req = expect::<StoryRequested>(&event.event, StoryRequested::EVENT_TYPE)?;
        let parent = event.event.event_id();
        let started = Instant::now();

        report_progress(bus, parent, None, Stage::Fetch, "fetching story");

        let url = req.job.url.as_deref();
        let attempted = retry(&self.policy, Stage::Fetch.name(), || self.source.fetch(url)).await;
        let text = attempted
            .result
            .with_context(|| format!("fetching story from {}", url.unwrap_or("mock source")))?;

        let mut story = Story::new(req.job.url.clone());
        story.name = story_name(&text.title);
        info!(story = %story.id, name = %story.name, chars = text.content.chars().count(), "story fetched");
        story.source = Some(text);

        let mut run = RunState {
            job: req.job.clone(),
            story,
            stages: Vec::new(),
        };
        run.record(finished(
            Stage::Fetch,
            StageStatus::Completed,
            attempted.attempts,
            started,
        ));

        bus.publish(Arc::new(StoryFetched::new(parent, run)));
        Ok(())
    }
}
