use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, error};

use crate::{
    events::{EnrichedEvent, EventBus},
    workers::{PipelineFailed, SubscriptionSpec, WorkerBatch, WorkerInputs},
};

/// A bus subscriber. Each worker owns its inputs and runs on its own task.
#[async_trait]
pub trait Worker: Send + Sized + 'static {
    const SUBSCRIBER_ID: &'static str;

    fn subscription() -> SubscriptionSpec;

    async fn handle(&mut self, event: Arc<EnrichedEvent>, bus: &EventBus) -> Result<()>;

    /// Called for events arriving on `Latest1` inputs.
    async fn handle_snapshot(&mut self, event: Arc<EnrichedEvent>, bus: &EventBus) -> Result<()> {
        self.handle(event, bus).await
    }

    async fn run(
        mut self,
        mut inputs: WorkerInputs,
        bus: Arc<EventBus>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    debug!(worker = Self::SUBSCRIBER_ID, "shutting down");
                    return Ok(());
                }
                batch = inputs.next() => match batch {
                    WorkerBatch::Snapshots(updates) => {
                        for update in updates {
                            if let Err(e) = self.handle_snapshot(update.event, &bus).await {
                                error!(worker = Self::SUBSCRIBER_ID, error = %e, "snapshot handler failed");
                            }
                        }
                    }
                    WorkerBatch::FifoItem { event_type, event } => {
                        let parent = Arc::clone(&event.event);
                        if let Err(e) = self.handle(event, &bus).await {
                            error!(worker = Self::SUBSCRIBER_ID, event_type, error = %e, "handler failed");
                            bus.publish(Arc::new(PipelineFailed::new(
                                parent.as_ref(),
                                Self::SUBSCRIBER_ID,
                                format!("{e:#}"),
                            )));
                        }
                    }
                }
            }
        }
    }
}
