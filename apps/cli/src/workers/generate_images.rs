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
    services::ImageGenerator,
    types::{GeneratedImage, Stage, StageReport, StageStatus},
    workers::{
        STAGE_QUEUE, finished,
        events::{ImagesGenerated, SceneriesExtracted},
        report_progress,
    },
};

/// Renders one image per scenery. Each scenery is retried on its own, and a
/// failed scenery does not stop the rest.
pub struct GenerateImagesWorker {
    generator: Arc<dyn ImageGenerator>,
    policy: RetryPolicy,
}

impl GenerateImagesWorker {
    pub fn new(generator: Arc<dyn ImageGenerator>, policy: RetryPolicy) -> Self {
        Self { generator, policy }
    }
}

/// Completed when every scenery rendered, degraded when some did, failed
/// when none did.
pub fn images_status(requested: usize, rendered: usize, last_error: Option<String>) -> StageStatus {
    if rendered == requested {
        StageStatus::Completed
    } else if rendered > 0 {
        StageStatus::Degraded {
            reason: format!("{} of {requested} images failed", requested - rendered),
        }
    } else {
        StageStatus::Failed {
            error: last_error.unwrap_or_else(|| "no image generated".to_string()),
        }
    }
}

#[async_trait]
impl Worker for GenerateImagesWorker {
    const SUBSCRIBER_ID: &'static str = "story.generate_images";

    fn subscription() -> SubscriptionSpec {
        SubscriptionSpec {
            subscriber_id: Self::SUBSCRIBER_ID,
            inputs: vec![InputSpec::new(SceneriesExtracted::EVENT_TYPE, STAGE_QUEUE)],
        }
    }

    #[instrument(name = "generate_images", skip_all)]
    async fn handle(&mut self, event: Arc<EnrichedEvent>, bus: &EventBus) -> anyhow::Result<()> {
        let req = expect::<SceneriesExtracted>(&event.event, SceneriesExtracted::EVENT_TYPE)?;
        let parent = event.event.event_id();
        let mut run = req.run.clone();
        let started = Instant::now();

        if run.story.sceneries.is_empty() {
            run.record(StageReport::skipped(
                Stage::GenerateImages,
                "no sceneries to render",
            ));
            bus.publish(Arc::new(ImagesGenerated::new(parent, run)));
            return Ok(());
        }

        let limit = run.job.max_images.unwrap_or(usize::MAX);
        let sceneries: Vec<_> = run.story.sceneries.iter().take(limit).cloned().collect();
        let output_dir = run.job.output_dir.clone();
        let total = sceneries.len();

        let mut attempts = 0;
        let mut last_error = None;
        for (idx, scenery) in sceneries.iter().enumerate() {
            report_progress(
                bus,
                parent,
                Some(run.story.id),
                Stage::GenerateImages,
                format!("image {}/{total}: {}", idx + 1, scenery.title),
            );

            let attempted = retry(&self.policy, Stage::GenerateImages.name(), || {
                self.generator.generate(scenery, &output_dir)
            })
            .await;
            attempts += attempted.attempts;

            match attempted.result {
                Ok(path) => {
                    info!(scenery = %scenery.title, path = %path.display(), "image ready");
                    run.story.images.push(GeneratedImage {
                        scenery_title: scenery.title.clone(),
                        path,
                    });
                }
                Err(e) => {
                    warn!(scenery = %scenery.title, error = %e, "image failed");
                    last_error = Some(format!("{}: {e}", scenery.title));
                }
            }
        }

        let status = images_status(total, run.story.images.len(), last_error);
        run.record(finished(Stage::GenerateImages, status, attempts, started));
        bus.publish(Arc::new(ImagesGenerated::new(parent, run)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_rendered_count() {
        assert_eq!(images_status(3, 3, None), StageStatus::Completed);
        assert_eq!(
            images_status(4, 1, Some("x".into())),
            StageStatus::Degraded {
                reason: "3 of 4 images failed".into()
            }
        );
        assert_eq!(
            images_status(2, 0, Some("Pond: faulted".into())),
            StageStatus::Failed {
                error: "Pond: faulted".into()
            }
        );
    }
}
