use std::sync::Arc;

use async_trait::async_trait;
use indicatif::ProgressBar;
use kahani_core::{
    EnrichedEvent, EventBus,
    events::expect,
    queues::QueueKind,
    workers::{InputSpec, SubscriptionSpec, Worker},
};

use crate::workers::events::StageProgress;

/// Mirrors the newest progress event on a terminal spinner. Older updates
/// are dropped by the `Latest1` queue.
pub struct ProgressReporterWorker {
    bar: ProgressBar,
}

impl ProgressReporterWorker {
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

#[async_trait]
impl Worker for ProgressReporterWorker {
    const SUBSCRIBER_ID: &'static str = "cli.progress";

    fn subscription() -> SubscriptionSpec {
        SubscriptionSpec {
            subscriber_id: Self::SUBSCRIBER_ID,
            inputs: vec![InputSpec::new(StageProgress::EVENT_TYPE, QueueKind::Latest1)],
        }
    }

    async fn handle(&mut self, event: Arc<EnrichedEvent>, _bus: &EventBus) -> anyhow::Result<()> {
        let progress = expect::<StageProgress>(&event.event, StageProgress::EVENT_TYPE)?;
        self.bar
            .set_message(format!("{}: {}", progress.stage, progress.message));
        Ok(())
    }
}
