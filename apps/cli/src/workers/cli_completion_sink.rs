use std::sync::Arc;

use async_trait::async_trait;
use kahani_core::{
    EnrichedEvent, EventBus,
    events::downcast_ref,
    queues::QueueKind,
    workers::{InputSpec, PipelineFailed, SubscriptionSpec, Worker},
};
use tokio::sync::oneshot;
use tracing::debug;

use crate::{types::RunReport, workers::events::StoryPublished};

pub type RunOutcome = Result<RunReport, PipelineFailed>;

/// Hands the first terminal event of the run back to the caller.
pub struct CliCompletionSinkWorker {
    done: Option<oneshot::Sender<RunOutcome>>,
}

impl CliCompletionSinkWorker {
    pub fn new(done: oneshot::Sender<RunOutcome>) -> Self {
        Self { done: Some(done) }
    }

    fn finish(&mut self, outcome: RunOutcome) {
        match self.done.take() {
            Some(done) => {
                if done.send(outcome).is_err() {
                    debug!("run result dropped, caller is gone");
                }
            }
            None => debug!("run already finished, ignoring late event"),
        }
    }
}

#[async_trait]
impl Worker for CliCompletionSinkWorker {
    const SUBSCRIBER_ID: &'static str = "cli.completion_sink";

    fn subscription() -> SubscriptionSpec {
        SubscriptionSpec {
            subscriber_id: Self::SUBSCRIBER_ID,
            inputs: vec![
                InputSpec::new(
                    StoryPublished::EVENT_TYPE,
                    QueueKind::Isolated { output_buffer: 4 },
                ),
                InputSpec::new(
                    PipelineFailed::EVENT_TYPE,
                    QueueKind::FifoDropOldest { capacity: 4 },
                ),
            ],
        }
    }

    async fn handle(&mut self, event: Arc<EnrichedEvent>, _bus: &EventBus) -> anyhow::Result<()> {
        if let Some(published) = downcast_ref::<StoryPublished>(&event.event) {
            self.finish(Ok(published.report.clone()));
        } else if let Some(failed) = downcast_ref::<PipelineFailed>(&event.event) {
            self.finish(Err(failed.clone()));
        }
        Ok(())
    }
}
